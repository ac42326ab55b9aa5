//! Thin wrappers over the Linux primitives the reactor is built on.
//!
//! Raw `libc` calls wrapped into `io::Result`, with fd ownership expressed
//! through [`OwnedFd`]. Everything here is non-blocking and close-on-exec;
//! callers distinguish would-block from fatal errors via
//! [`io::ErrorKind::WouldBlock`].

use std::io;
use std::os::unix::io::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Create an epoll instance.
pub(crate) fn epoll_create() -> io::Result<OwnedFd> {
    let fd = check(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Add, modify, or delete one descriptor's registration.
pub(crate) fn epoll_ctl(
    epoll: BorrowedFd<'_>,
    op: libc::c_int,
    fd: RawFd,
    events: u32,
    data: u64,
) -> io::Result<()> {
    let mut event = libc::epoll_event { events, u64: data };
    check(unsafe { libc::epoll_ctl(epoll.as_raw_fd(), op, fd, &mut event) })?;
    Ok(())
}

/// Wait for events; retries on `EINTR`. A negative timeout blocks.
pub(crate) fn epoll_wait(
    epoll: BorrowedFd<'_>,
    events: &mut [libc::epoll_event],
    timeout_ms: libc::c_int,
) -> io::Result<usize> {
    loop {
        let ret = unsafe {
            libc::epoll_wait(
                epoll.as_raw_fd(),
                events.as_mut_ptr(),
                events.len() as libc::c_int,
                timeout_ms,
            )
        };
        if ret >= 0 {
            return Ok(ret as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Create a non-blocking monotonic timer descriptor.
pub(crate) fn timerfd_create() -> io::Result<OwnedFd> {
    let fd = check(unsafe {
        libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
    })?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn to_timespec(interval: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: interval.as_secs() as libc::time_t,
        tv_nsec: libc::c_long::from(interval.subsec_nanos() as i32),
    }
}

/// Arm a periodic timer with the given interval, first firing one
/// interval from now.
pub(crate) fn timerfd_set_interval(timer: BorrowedFd<'_>, interval: Duration) -> io::Result<()> {
    let spec = libc::itimerspec {
        it_interval: to_timespec(interval),
        it_value: to_timespec(interval),
    };
    check(unsafe { libc::timerfd_settime(timer.as_raw_fd(), 0, &spec, std::ptr::null_mut()) })?;
    Ok(())
}

/// Read back the timer's current interval.
pub(crate) fn timerfd_interval(timer: BorrowedFd<'_>) -> io::Result<Duration> {
    let mut spec = libc::itimerspec {
        it_interval: to_timespec(Duration::ZERO),
        it_value: to_timespec(Duration::ZERO),
    };
    check(unsafe { libc::timerfd_gettime(timer.as_raw_fd(), &mut spec) })?;
    Ok(Duration::new(
        spec.it_interval.tv_sec as u64,
        spec.it_interval.tv_nsec as u32,
    ))
}

/// Create a non-blocking event counter descriptor.
pub(crate) fn eventfd() -> io::Result<OwnedFd> {
    let fd = check(unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) })?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Non-blocking read. `Ok(0)` is end-of-stream.
pub(crate) fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let ret = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Non-blocking write. `Ok(0)` means the peer is gone.
pub(crate) fn write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let ret = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Zero-copy transfer from `src` at `offset` into the socket.
///
/// On success the kernel advances `offset` by the bytes sent.
pub(crate) fn sendfile(
    out_fd: RawFd,
    src: RawFd,
    offset: &mut libc::off64_t,
    count: usize,
) -> io::Result<usize> {
    let ret = unsafe { libc::sendfile64(out_fd, src, offset, count) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Whether an I/O error simply means "try again once writable/readable".
pub(crate) fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsFd;

    #[test]
    fn test_eventfd_counter() {
        let fd = eventfd().unwrap();
        // Empty counter reads would-block.
        let mut buf = [0u8; 8];
        let err = read(fd.as_raw_fd(), &mut buf).unwrap_err();
        assert!(is_would_block(&err));

        write(fd.as_raw_fd(), &1u64.to_ne_bytes()).unwrap();
        write(fd.as_raw_fd(), &2u64.to_ne_bytes()).unwrap();
        assert_eq!(read(fd.as_raw_fd(), &mut buf).unwrap(), 8);
        assert_eq!(u64::from_ne_bytes(buf), 3);
    }

    #[test]
    fn test_timerfd_interval_roundtrip() {
        let timer = timerfd_create().unwrap();
        timerfd_set_interval(timer.as_fd(), Duration::from_millis(50)).unwrap();
        let got = timerfd_interval(timer.as_fd()).unwrap();
        assert_eq!(got, Duration::from_millis(50));
    }

    #[test]
    fn test_epoll_reports_readable() {
        let epoll = epoll_create().unwrap();
        let event = eventfd().unwrap();
        epoll_ctl(
            epoll.as_fd(),
            libc::EPOLL_CTL_ADD,
            event.as_raw_fd(),
            (libc::EPOLLIN | libc::EPOLLET | libc::EPOLLONESHOT) as u32,
            7,
        )
        .unwrap();

        let mut events = [libc::epoll_event { events: 0, u64: 0 }; 4];
        assert_eq!(epoll_wait(epoll.as_fd(), &mut events, 0).unwrap(), 0);

        write(event.as_raw_fd(), &1u64.to_ne_bytes()).unwrap();
        assert_eq!(epoll_wait(epoll.as_fd(), &mut events, 100).unwrap(), 1);
        let data = events[0].u64;
        assert_eq!(data, 7);

        // One-shot: no further delivery until re-armed.
        assert_eq!(epoll_wait(epoll.as_fd(), &mut events, 0).unwrap(), 0);
    }
}
