//! Packet framing over a non-blocking stream socket.
//!
//! # Frame Format
//!
//! ```text
//! +----------------+-----------+
//! | length (var32) |   body    |
//! |   1-5 bytes    | len bytes |
//! +----------------+-----------+
//! ```
//!
//! [`PacketFramer`] is the state machine that peels one frame at a time
//! off the socket, resuming across partial reads: it walks the length
//! bytes one by one, then accumulates the body, preferring a stack buffer
//! and falling back to an owned overflow buffer for large packets or
//! bodies split across readiness events.
//!
//! [`Connection`] mounts a framer and a [`Writable`] queue behind one
//! [`EventHandler`], handing each completed frame to a [`PacketHandler`]
//! together with a [`Link`] for writing responses.

use std::io;
use std::os::unix::io::RawFd;

use tracing::trace;

use crate::protocol::ByteReader;

use super::writable::Writable;
use super::{sys, Context, EventHandler, EventSet, NextStatus};

/// Errors produced by the framing layer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("packet of {size} bytes exceeds the {max} byte limit")]
    PacketTooLarge { size: usize, max: usize },

    #[error("zero-length packet")]
    ZeroLengthPacket,

    #[error("peer closed the stream")]
    PeerClosed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(inner) => inner,
            FrameError::PeerClosed => io::Error::new(io::ErrorKind::ConnectionReset, err),
            _ => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

/// Body bytes held on the stack before the overflow buffer takes over.
const STACK_BODY: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Reading length byte `n` (0..=4).
    Len(u8),
    /// Reading the body.
    Body,
}

/// The frame-decoding state machine.
pub struct PacketFramer {
    phase: Phase,
    declared: usize,
    read: usize,
    overflow: Vec<u8>,
    disconnect_indicated: bool,
    max_packet: usize,
}

impl PacketFramer {
    /// A framer with no packet size limit.
    pub fn new() -> Self {
        Self {
            phase: Phase::Len(0),
            declared: 0,
            read: 0,
            overflow: Vec::new(),
            disconnect_indicated: false,
            max_packet: 0,
        }
    }

    /// Cap the declared packet size; 0 disables the cap.
    ///
    /// A cap bounds what a hostile peer can make the framer allocate.
    pub fn set_max_packet_size(&mut self, max: usize) {
        self.max_packet = max;
    }

    /// The current packet size cap.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet
    }

    /// Stop reading; the next readiness pass reports `Final`.
    pub fn indicate_disconnect(&mut self) {
        self.disconnect_indicated = true;
    }

    /// Whether a disconnect was requested.
    pub fn disconnect_indicated(&self) -> bool {
        self.disconnect_indicated
    }

    /// Pump the socket while readable, handing each completed frame to
    /// `sink` as a [`ByteReader`] over the body.
    ///
    /// Returns `More` after a completed frame (call again for the next),
    /// `Poll` when the socket ran dry mid-frame, `Final` after a
    /// requested disconnect. Protocol violations raise the matching
    /// [`FrameError`] ([`ZeroLengthPacket`](FrameError::ZeroLengthPacket),
    /// [`PacketTooLarge`](FrameError::PacketTooLarge)), and EOF or I/O
    /// failures raise as well, for the reactor to tear the descriptor
    /// down.
    pub fn handle_read(
        &mut self,
        fd: RawFd,
        active: &mut EventSet,
        mut sink: impl FnMut(&mut ByteReader<'_>) -> io::Result<()>,
    ) -> io::Result<NextStatus> {
        if self.disconnect_indicated {
            *active = active.without(EventSet::IN);
            return Ok(NextStatus::Final);
        }
        if !active.contains(EventSet::IN) {
            return Ok(NextStatus::Poll);
        }

        while let Phase::Len(index) = self.phase {
            let mut byte = [0u8; 1];
            match sys::read(fd, &mut byte) {
                Ok(1) => {}
                Ok(0) => return Err(FrameError::PeerClosed.into()),
                Ok(_) => unreachable!(),
                Err(err) if sys::is_would_block(&err) => {
                    *active = active.without(EventSet::IN);
                    return Ok(NextStatus::Poll);
                }
                Err(err) => return Err(err),
            }
            self.declared |= usize::from(byte[0] & 0x7f) << (u32::from(index) * 7);
            if byte[0] & 0x80 == 0 {
                if self.declared == 0 {
                    *active = active.without(EventSet::IN);
                    return Err(FrameError::ZeroLengthPacket.into());
                }
                if self.max_packet > 0 && self.declared > self.max_packet {
                    *active = active.without(EventSet::IN);
                    return Err(FrameError::PacketTooLarge {
                        size: self.declared,
                        max: self.max_packet,
                    }
                    .into());
                }
                self.phase = Phase::Body;
            } else if index == 4 {
                // A fifth continuation bit would need a sixth length byte.
                *active = active.without(EventSet::IN);
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "packet length prefix exceeds five bytes",
                ));
            } else {
                self.phase = Phase::Len(index + 1);
            }
        }

        // Body. Small packets accumulate on the stack; a packet larger
        // than the stack buffer, or one resumed from an earlier partial
        // read, lives in the overflow buffer.
        let mut stack = [0u8; STACK_BODY];
        let use_overflow = !self.overflow.is_empty() || self.declared > STACK_BODY;
        if use_overflow && self.overflow.is_empty() {
            self.overflow.resize(self.declared, 0);
        }
        let target: &mut [u8] = if use_overflow {
            &mut self.overflow
        } else {
            &mut stack[..self.declared]
        };

        let wanted = self.declared - self.read;
        match sys::read(fd, &mut target[self.read..self.read + wanted]) {
            Ok(0) => Err(FrameError::PeerClosed.into()),
            Ok(got) => {
                self.read += got;
                if self.read == self.declared {
                    let mut payload = ByteReader::new(&target[..self.declared]);
                    trace!(
                        target: "craftwire::connection",
                        fd,
                        size = self.declared,
                        "frame complete"
                    );
                    sink(&mut payload)?;
                    self.declared = 0;
                    self.read = 0;
                    self.phase = Phase::Len(0);
                    self.overflow = Vec::new();
                    Ok(NextStatus::More)
                } else {
                    if !use_overflow {
                        self.overflow.resize(self.declared, 0);
                        self.overflow[..self.read].copy_from_slice(&stack[..self.read]);
                    }
                    *active = active.without(EventSet::IN);
                    Ok(NextStatus::Poll)
                }
            }
            Err(err) if sys::is_would_block(&err) => {
                *active = active.without(EventSet::IN);
                Ok(NextStatus::Poll)
            }
            Err(err) => Err(err),
        }
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler-facing access to a connection while a packet is processed.
pub struct Link<'a, 'b> {
    ctx: &'a mut Context<'b>,
    writer: &'a mut Writable,
    disconnect: &'a mut bool,
}

impl Link<'_, '_> {
    /// The connection's raw descriptor.
    pub fn fd(&self) -> RawFd {
        self.ctx.fd()
    }

    /// Queue raw bytes.
    pub fn write(&mut self, bytes: &[u8]) {
        self.writer.write(self.ctx, bytes);
    }

    /// Queue a shared buffer range.
    pub fn write_shared(&mut self, data: std::sync::Arc<[u8]>, offset: usize, len: usize) {
        self.writer.write_shared(self.ctx, data, offset, len);
    }

    /// Queue a zero-copy file send.
    pub fn send_file(&mut self, src: RawFd, offset: i64, len: usize) {
        self.writer.send_file(self.ctx, src, offset, len);
    }

    /// Frame `body` with its var32 length and queue it.
    pub fn write_frame(&mut self, body: &[u8]) -> io::Result<()> {
        let mut framed = crate::protocol::ByteWriter::new();
        framed
            .put(body)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let bytes = framed
            .length_prefixed()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        self.writer.write(self.ctx, bytes);
        Ok(())
    }

    /// Gracefully shut the connection down: pending writes still drain,
    /// reads stop, then the descriptor is erased.
    pub fn disconnect(&mut self) {
        *self.disconnect = true;
        self.writer.indicate_close();
    }
}

/// Per-packet logic mounted on a [`Connection`].
pub trait PacketHandler {
    /// Invoked once per completed frame with the body positioned at
    /// offset zero. Errors tear the connection down.
    fn packet(&mut self, payload: &mut ByteReader<'_>, link: &mut Link<'_, '_>)
        -> io::Result<()>;
}

/// A framed stream descriptor: packet framer in, write queue out.
pub struct Connection<H> {
    framer: PacketFramer,
    writer: Writable,
    handler: H,
}

impl<H: PacketHandler> Connection<H> {
    /// Wrap a packet handler. Register the result with interest
    /// [`EventSet::IN`].
    pub fn new(handler: H) -> Self {
        Self {
            framer: PacketFramer::new(),
            writer: Writable::new(),
            handler,
        }
    }

    /// Cap inbound packet sizes; 0 disables the cap.
    pub fn set_max_packet_size(&mut self, max: usize) {
        self.framer.set_max_packet_size(max);
    }

    /// The mounted handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The mounted handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

impl<H: PacketHandler> EventHandler for Connection<H> {
    fn ready(&mut self, ctx: &mut Context<'_>) -> io::Result<NextStatus> {
        let fd = ctx.fd();
        let mut active = ctx.active();
        let Connection {
            framer,
            writer,
            handler,
        } = self;

        let mut disconnect = framer.disconnect_indicated();
        let read_next = framer.handle_read(fd, &mut active, |payload| {
            let mut link = Link {
                ctx: &mut *ctx,
                writer: &mut *writer,
                disconnect: &mut disconnect,
            };
            handler.packet(payload, &mut link)
        })?;
        if disconnect {
            framer.indicate_disconnect();
        }
        if read_next == NextStatus::Final {
            // The stream is read-closed by a disconnect request. Pending
            // writes still flush; the write side then reports Final and
            // the reactor erases the descriptor.
            framer.indicate_disconnect();
            writer.indicate_close();
        }

        // Propagate the bits the read path consumed, then let the write
        // side drain against the same view.
        let consumed = ctx.active().without(active);
        ctx.clear_active(consumed);
        let write_next = writer.handle_write(ctx)?;

        // Combine: a read that wants another pass wins; otherwise the
        // write side decides (it reports Final only once drained after a
        // close, or on a dead peer).
        Ok(match read_next {
            NextStatus::More => NextStatus::More,
            _ => write_next,
        })
    }
}
