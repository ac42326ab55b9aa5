//! The residual write queue.
//!
//! A descriptor that writes through [`Writable`] never blocks and never
//! reorders: each submission tries the kernel once while the queue is
//! empty, and whatever the kernel does not take immediately is queued as
//! a node. Nodes come in two kinds, an owned byte range and a zero-copy
//! file send, drained strictly FIFO so the bytes on the wire always equal
//! the submission order across both kinds.
//!
//! `OUT` interest follows the queue: requested when the first residual is
//! queued, dropped when the queue drains. After [`Writable::indicate_close`]
//! no new data is accepted; once the queue empties the drain path reports
//! [`NextStatus::Final`] so the reactor tears the descriptor down.

use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use tracing::trace;

use super::connection::FrameError;
use super::sys;
use super::{Context, EventSet, NextStatus};

/// One queued write operation.
enum Node {
    /// An owned byte range; `offset` advances as the kernel accepts data.
    Buffer {
        data: Arc<[u8]>,
        offset: usize,
        end: usize,
    },
    /// A zero-copy transfer out of another descriptor.
    File {
        src: RawFd,
        offset: libc::off64_t,
        remaining: usize,
    },
}

enum Attempt {
    /// The node is exhausted.
    Done,
    /// The kernel took some or none; try again when writable.
    Partial,
    /// The descriptor is beyond use.
    Fatal,
}

impl Node {
    /// Push the head of this node into the kernel once.
    fn transmit(&mut self, fd: RawFd) -> Attempt {
        match self {
            Node::Buffer { data, offset, end } => {
                match sys::write(fd, &data[*offset..*end]) {
                    Ok(0) => Attempt::Fatal,
                    Ok(written) => {
                        *offset += written;
                        if offset == end {
                            Attempt::Done
                        } else {
                            Attempt::Partial
                        }
                    }
                    Err(err) if sys::is_would_block(&err) => Attempt::Partial,
                    Err(_) => Attempt::Fatal,
                }
            }
            Node::File {
                src,
                offset,
                remaining,
            } => match sys::sendfile(fd, *src, offset, *remaining) {
                Ok(0) => Attempt::Fatal,
                Ok(sent) => {
                    *remaining -= sent;
                    if *remaining == 0 {
                        Attempt::Done
                    } else {
                        Attempt::Partial
                    }
                }
                Err(err) if sys::is_would_block(&err) => Attempt::Partial,
                Err(_) => Attempt::Fatal,
            },
        }
    }
}

/// The per-descriptor write queue.
#[derive(Default)]
pub struct Writable {
    queue: VecDeque<Node>,
    close_indicated: bool,
}

impl Writable {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`indicate_close`](Self::indicate_close) was called.
    pub fn close_indicated(&self) -> bool {
        self.close_indicated
    }

    /// Whether any residual data is queued.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Refuse new data; existing residuals still drain, and the drain
    /// path reports `Final` once they have.
    pub fn indicate_close(&mut self) {
        self.close_indicated = true;
    }

    /// Write owned bytes, queueing whatever the kernel does not take.
    pub fn write(&mut self, ctx: &mut Context<'_>, bytes: &[u8]) {
        if bytes.is_empty() || self.close_indicated {
            return;
        }
        if !self.queue.is_empty() {
            self.queue.push_back(Node::Buffer {
                data: Arc::from(bytes),
                offset: 0,
                end: bytes.len(),
            });
            return;
        }
        match sys::write(ctx.fd(), bytes) {
            Ok(written) if written == bytes.len() => {}
            Ok(0) => {
                // The stream already closed; the data can never be sent.
            }
            Ok(written) => {
                self.enqueue_residual(
                    ctx,
                    Node::Buffer {
                        data: Arc::from(&bytes[written..]),
                        offset: 0,
                        end: bytes.len() - written,
                    },
                );
            }
            Err(err) if sys::is_would_block(&err) => {
                self.enqueue_residual(
                    ctx,
                    Node::Buffer {
                        data: Arc::from(bytes),
                        offset: 0,
                        end: bytes.len(),
                    },
                );
            }
            Err(_) => {
                // Fatal: drop silently, the read path will observe it.
            }
        }
    }

    /// Write a shared buffer range without copying it.
    ///
    /// Useful for broadcasting one message to many descriptors; each
    /// queue holds the same allocation.
    pub fn write_shared(
        &mut self,
        ctx: &mut Context<'_>,
        data: Arc<[u8]>,
        offset: usize,
        len: usize,
    ) {
        if len == 0 || self.close_indicated {
            return;
        }
        let end = offset + len;
        debug_assert!(end <= data.len());
        if !self.queue.is_empty() {
            self.queue.push_back(Node::Buffer { data, offset, end });
            return;
        }
        match sys::write(ctx.fd(), &data[offset..end]) {
            Ok(written) if written == len => {}
            Ok(0) => {}
            Ok(written) => {
                self.enqueue_residual(
                    ctx,
                    Node::Buffer {
                        data,
                        offset: offset + written,
                        end,
                    },
                );
            }
            Err(err) if sys::is_would_block(&err) => {
                self.enqueue_residual(ctx, Node::Buffer { data, offset, end });
            }
            Err(_) => {}
        }
    }

    /// Transfer a byte range out of `src` with zero-copy file send.
    ///
    /// The caller keeps ownership of `src` and must keep it open until
    /// the queue drains.
    pub fn send_file(&mut self, ctx: &mut Context<'_>, src: RawFd, offset: i64, len: usize) {
        if len == 0 || self.close_indicated {
            return;
        }
        let mut offset: libc::off64_t = offset;
        if !self.queue.is_empty() {
            self.queue.push_back(Node::File {
                src,
                offset,
                remaining: len,
            });
            return;
        }
        match sys::sendfile(ctx.fd(), src, &mut offset, len) {
            Ok(sent) if sent == len => {}
            Ok(0) => {}
            Ok(sent) => {
                self.enqueue_residual(
                    ctx,
                    Node::File {
                        src,
                        offset,
                        remaining: len - sent,
                    },
                );
            }
            Err(err) if sys::is_would_block(&err) => {
                self.enqueue_residual(
                    ctx,
                    Node::File {
                        src,
                        offset,
                        remaining: len,
                    },
                );
            }
            Err(_) => {}
        }
    }

    fn enqueue_residual(&mut self, ctx: &mut Context<'_>, node: Node) {
        self.queue.push_back(node);
        let interest = ctx.interest().with(EventSet::OUT);
        if ctx.set_interest(interest).is_err() {
            // The residual can never be flushed; forget it.
            self.queue.clear();
        }
    }

    /// Drain the queue while the descriptor reports writable.
    ///
    /// Call from the owning handler's `ready`; the return value feeds the
    /// handler's combined status.
    pub fn handle_write(&mut self, ctx: &mut Context<'_>) -> io::Result<NextStatus> {
        if !ctx.active().contains(EventSet::OUT) {
            if self.close_indicated && self.queue.is_empty() {
                return Ok(NextStatus::Final);
            }
            return Ok(NextStatus::Poll);
        }

        while let Some(head) = self.queue.front_mut() {
            match head.transmit(ctx.fd()) {
                Attempt::Done => {
                    self.queue.pop_front();
                }
                Attempt::Partial => break,
                Attempt::Fatal => {
                    return Err(FrameError::PeerClosed.into());
                }
            }
        }

        if self.queue.is_empty() {
            trace!(target: "craftwire::writable", fd = ctx.fd(), "write queue drained");
            ctx.clear_active(EventSet::OUT);
            let interest = ctx.interest().without(EventSet::OUT);
            let _ = ctx.set_interest(interest);
            if self.close_indicated {
                Ok(NextStatus::Final)
            } else {
                Ok(NextStatus::Poll)
            }
        } else {
            Ok(NextStatus::Poll)
        }
    }
}
