//! The single-threaded event reactor.
//!
//! One [`Reactor`] owns an edge-triggered, one-shot epoll instance, a
//! periodic tick timer, and every registered descriptor. Descriptors are
//! registered by moving an [`OwnedFd`] plus an [`EventHandler`] in; the
//! reactor closes the handle when the descriptor is erased, on every exit
//! path.
//!
//! # Scheduling
//!
//! [`Reactor::execute`] runs one tick's worth of I/O: it waits for
//! readiness (not at all while work is queued), moves ready descriptors
//! onto the active queue, and walks that queue invoking handlers. A
//! handler returns [`NextStatus::Poll`] to re-arm and sleep,
//! [`NextStatus::More`] to run again within the same pass, or
//! [`NextStatus::Final`] to be erased; an error from a handler counts as
//! `Final`. The call returns once the tick timer has fired and the queue
//! walk completed.
//!
//! Handlers may register new descriptors and remove any descriptor,
//! themselves included. Removal of a descriptor whose handler is on the
//! stack is deferred and applied the moment that handler returns; this is
//! the `in_handle`/`marked_removal` pair, and it is what makes
//! self-removal and cross-removal safe in a world without reference
//! counting.
//!
//! Nothing here is thread-safe by design: the reactor, its descriptors,
//! and all buffers belong to the thread that runs `execute`.

pub mod connection;
pub mod idle;
pub(crate) mod sys;
pub mod writable;

use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::{debug, warn};

/// Errors surfaced by the reactor itself.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("multiplexer failure: {0}")]
    Multiplexer(#[source] io::Error),

    #[error("tick timer failure: {0}")]
    Timer(#[source] io::Error),

    #[error("descriptor registration failed: {0}")]
    RegisterFailed(#[source] io::Error),
}

/// The default tick interval.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Intervals at or below this would disable the kernel timer.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Readiness interest and readiness report, as a two-bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSet(u8);

impl EventSet {
    pub const NONE: EventSet = EventSet(0);
    pub const IN: EventSet = EventSet(1);
    pub const OUT: EventSet = EventSet(2);

    /// Union with `other`.
    pub fn with(self, other: EventSet) -> EventSet {
        EventSet(self.0 | other.0)
    }

    /// Difference: `self` minus `other`.
    pub fn without(self, other: EventSet) -> EventSet {
        EventSet(self.0 & !other.0)
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: EventSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn to_epoll(self) -> u32 {
        let mut bits = (libc::EPOLLET | libc::EPOLLONESHOT) as u32;
        if self.contains(EventSet::IN) {
            bits |= libc::EPOLLIN as u32;
        }
        if self.contains(EventSet::OUT) {
            bits |= libc::EPOLLOUT as u32;
        }
        bits
    }

    fn from_epoll(bits: u32) -> EventSet {
        let mut set = EventSet::NONE;
        if bits & libc::EPOLLIN as u32 != 0 {
            set = set.with(EventSet::IN);
        }
        if bits & libc::EPOLLOUT as u32 != 0 {
            set = set.with(EventSet::OUT);
        }
        set
    }
}

/// What a handler wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStatus {
    /// Re-arm with the current interest and wait for readiness.
    Poll,
    /// Run again within the same `execute` pass.
    More,
    /// Erase the descriptor; its handle is closed.
    Final,
}

/// Logic attached to a registered descriptor.
pub trait EventHandler {
    /// Invoked when the descriptor was reported ready.
    ///
    /// The descriptor is out of the wake set while this runs (one-shot
    /// notification); returning [`NextStatus::Poll`] puts it back. An
    /// `Err` tears the descriptor down exactly like [`NextStatus::Final`].
    fn ready(&mut self, ctx: &mut Context<'_>) -> io::Result<NextStatus>;
}

struct Entry {
    token: u64,
    fd: OwnedFd,
    handler: Option<Box<dyn EventHandler>>,
    listening: EventSet,
    active: EventSet,
    in_handle: bool,
    marked_removal: bool,
    queued: bool,
}

const TIMER_TOKEN: u64 = u64::MAX;
const EVENT_BATCH: usize = 16;

/// The reactor: multiplexer, tick timer, and descriptor table.
pub struct Reactor {
    epoll: OwnedFd,
    timer: OwnedFd,
    entries: HashMap<RawFd, Entry>,
    /// Descriptors awaiting a handler run, as (fd, registration token);
    /// the token guards against fd reuse across an erase.
    active: VecDeque<(RawFd, u64)>,
    next_token: u64,
}

impl Reactor {
    /// Create a reactor with the default 50 ms tick.
    pub fn new() -> Result<Reactor, ReactorError> {
        Self::with_tick(DEFAULT_TICK)
    }

    /// Create a reactor with a custom tick interval.
    pub fn with_tick(tick: Duration) -> Result<Reactor, ReactorError> {
        let epoll = sys::epoll_create().map_err(ReactorError::Multiplexer)?;
        let timer = sys::timerfd_create().map_err(ReactorError::Timer)?;
        let reactor = Reactor {
            epoll,
            timer,
            entries: HashMap::new(),
            active: VecDeque::new(),
            next_token: 0,
        };
        reactor.set_tick(tick)?;
        sys::epoll_ctl(
            reactor.epoll.as_fd(),
            libc::EPOLL_CTL_ADD,
            reactor.timer.as_raw_fd(),
            EventSet::IN.to_epoll(),
            TIMER_TOKEN,
        )
        .map_err(ReactorError::Timer)?;
        Ok(reactor)
    }

    /// The current tick interval.
    pub fn tick(&self) -> Result<Duration, ReactorError> {
        sys::timerfd_interval(self.timer.as_fd()).map_err(ReactorError::Timer)
    }

    /// Change the tick interval. Must exceed one millisecond.
    pub fn set_tick(&self, tick: Duration) -> Result<(), ReactorError> {
        if tick <= MIN_TICK {
            return Err(ReactorError::Timer(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tick interval must exceed one millisecond",
            )));
        }
        debug!(target: "craftwire::reactor", tick_ms = tick.as_millis() as u64, "tick updated");
        sys::timerfd_set_interval(self.timer.as_fd(), tick).map_err(ReactorError::Timer)
    }

    /// Move a descriptor into the reactor.
    ///
    /// `interest` must be nonempty. On success the reactor owns the
    /// handle; the fd doubles as the descriptor's identifier.
    pub fn register(
        &mut self,
        fd: OwnedFd,
        interest: EventSet,
        handler: Box<dyn EventHandler>,
    ) -> Result<RawFd, ReactorError> {
        debug_assert!(!interest.is_empty());
        let raw = fd.as_raw_fd();
        sys::epoll_ctl(
            self.epoll.as_fd(),
            libc::EPOLL_CTL_ADD,
            raw,
            interest.to_epoll(),
            raw as u64,
        )
        .map_err(ReactorError::RegisterFailed)?;
        let token = self.next_token;
        self.next_token += 1;
        self.entries.insert(
            raw,
            Entry {
                token,
                fd,
                handler: Some(handler),
                listening: interest,
                active: EventSet::NONE,
                in_handle: false,
                marked_removal: false,
                queued: false,
            },
        );
        debug!(target: "craftwire::reactor", fd = raw, "descriptor registered");
        Ok(raw)
    }

    /// Remove a descriptor, closing its handle.
    ///
    /// Removal of a descriptor whose handler is currently running is
    /// deferred until that handler returns.
    pub fn erase(&mut self, fd: RawFd) {
        if let Some(entry) = self.entries.get_mut(&fd) {
            if entry.in_handle {
                entry.marked_removal = true;
            } else {
                self.entries.remove(&fd);
                debug!(target: "craftwire::reactor", fd, "descriptor erased");
            }
        }
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no descriptors are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the polling loop until the tick deadline passes.
    pub fn execute(&mut self) -> Result<(), ReactorError> {
        let mut events = [libc::epoll_event { events: 0, u64: 0 }; EVENT_BATCH];
        let mut running = true;
        while running {
            let timeout = if self.active.is_empty() { -1 } else { 0 };
            let count = sys::epoll_wait(self.epoll.as_fd(), &mut events, timeout)
                .map_err(ReactorError::Multiplexer)?;

            for event in &events[..count] {
                let bits = event.events;
                let data = event.u64;
                if data == TIMER_TOKEN {
                    if bits & libc::EPOLLERR as u32 != 0 {
                        return Err(ReactorError::Timer(io::Error::other(
                            "tick timer reported an error condition",
                        )));
                    }
                    self.drain_timer()?;
                    running = false;
                } else {
                    let fd = data as RawFd;
                    if bits & libc::EPOLLERR as u32 != 0 {
                        if self.entries.remove(&fd).is_some() {
                            debug!(target: "craftwire::reactor", fd, "descriptor errored, erased");
                        }
                    } else if let Some(entry) = self.entries.get_mut(&fd) {
                        entry.active = EventSet::from_epoll(bits);
                        if !entry.queued {
                            entry.queued = true;
                            self.active.push_back((fd, entry.token));
                        }
                    }
                }
            }

            self.run_active_queue();
        }
        Ok(())
    }

    /// Read the timer down and put it back into the wake set.
    fn drain_timer(&mut self) -> Result<(), ReactorError> {
        let mut expirations = [0u8; 8];
        loop {
            match sys::read(self.timer.as_raw_fd(), &mut expirations) {
                Ok(8) => continue,
                Ok(_) => {
                    return Err(ReactorError::Timer(io::Error::other(
                        "short read from the tick timer",
                    )))
                }
                Err(err) if sys::is_would_block(&err) => break,
                Err(err) => return Err(ReactorError::Timer(err)),
            }
        }
        sys::epoll_ctl(
            self.epoll.as_fd(),
            libc::EPOLL_CTL_MOD,
            self.timer.as_raw_fd(),
            EventSet::IN.to_epoll(),
            TIMER_TOKEN,
        )
        .map_err(ReactorError::Timer)
    }

    /// Walk the active queue once, visiting each queued descriptor.
    fn run_active_queue(&mut self) {
        for _ in 0..self.active.len() {
            let Some((fd, token)) = self.active.pop_front() else {
                break;
            };
            let mut handler = match self.entries.get_mut(&fd) {
                Some(entry) if entry.token == token => {
                    entry.queued = false;
                    entry.in_handle = true;
                    match entry.handler.take() {
                        Some(handler) => handler,
                        None => continue,
                    }
                }
                // Erased (or the fd was reused) since it was queued.
                _ => continue,
            };

            let mut ctx = Context { fd, reactor: self };
            let status = match handler.ready(&mut ctx) {
                Ok(status) => status,
                Err(err) => {
                    warn!(target: "craftwire::reactor", fd, error = %err, "handler failed, tearing down");
                    NextStatus::Final
                }
            };

            let Some(entry) = self.entries.get_mut(&fd) else {
                continue;
            };
            entry.in_handle = false;
            entry.handler = Some(handler);
            let listening = entry.listening;
            let entry_token = entry.token;
            let status = if entry.marked_removal {
                NextStatus::Final
            } else {
                status
            };

            match status {
                NextStatus::Final => {
                    self.entries.remove(&fd);
                    debug!(target: "craftwire::reactor", fd, "descriptor finished");
                }
                NextStatus::Poll => {
                    let rearm = sys::epoll_ctl(
                        self.epoll.as_fd(),
                        libc::EPOLL_CTL_MOD,
                        fd,
                        listening.to_epoll(),
                        fd as u64,
                    );
                    if let Err(err) = rearm {
                        warn!(target: "craftwire::reactor", fd, error = %err, "re-arm failed, erasing");
                        self.entries.remove(&fd);
                    }
                }
                NextStatus::More => {
                    if let Some(entry) = self.entries.get_mut(&fd) {
                        entry.queued = true;
                    }
                    self.active.push_back((fd, entry_token));
                }
            }
        }
    }
}

/// Handler-side view of the reactor, scoped to one `ready` invocation.
pub struct Context<'a> {
    fd: RawFd,
    reactor: &'a mut Reactor,
}

impl Context<'_> {
    /// The descriptor's raw handle, for non-blocking I/O calls.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    fn entry(&self) -> &Entry {
        &self.reactor.entries[&self.fd]
    }

    fn entry_mut(&mut self) -> &mut Entry {
        self.reactor
            .entries
            .get_mut(&self.fd)
            .expect("context outlived its entry")
    }

    /// The readiness bits still pending for this invocation.
    pub fn active(&self) -> EventSet {
        self.entry().active
    }

    /// Drop bits from the pending readiness set.
    pub fn clear_active(&mut self, events: EventSet) {
        let entry = self.entry_mut();
        entry.active = entry.active.without(events);
    }

    /// The interest mask the descriptor will re-arm with.
    pub fn interest(&self) -> EventSet {
        self.entry().listening
    }

    /// Replace the interest mask.
    ///
    /// Takes effect at the next re-arm, i.e. when the handler returns
    /// [`NextStatus::Poll`].
    pub fn set_interest(&mut self, events: EventSet) -> io::Result<()> {
        self.entry_mut().listening = events;
        Ok(())
    }

    /// Register a new descriptor from inside a handler.
    pub fn register(
        &mut self,
        fd: OwnedFd,
        interest: EventSet,
        handler: Box<dyn EventHandler>,
    ) -> Result<RawFd, ReactorError> {
        self.reactor.register(fd, interest, handler)
    }

    /// Remove a descriptor; self-removal is deferred until this handler
    /// returns.
    pub fn remove(&mut self, fd: RawFd) {
        self.reactor.erase(fd);
    }

    /// The reactor's tick interval.
    pub fn tick(&self) -> Result<Duration, ReactorError> {
        self.reactor.tick()
    }

    /// Change the reactor's tick interval.
    pub fn set_tick(&mut self, tick: Duration) -> Result<(), ReactorError> {
        self.reactor.set_tick(tick)
    }
}
