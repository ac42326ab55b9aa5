//! Deferred task execution in reactor idle time.
//!
//! An [`IdleExecutor`] is a descriptor wrapped around an event counter.
//! Producers enqueue tasks through an [`IdleHandle`]; the first enqueue
//! bumps the counter, which wakes the reactor, which then advances tasks
//! a bounded slice at a time between I/O batches. Tasks are cooperative:
//! [`IdleTask::advance`] runs one increment of work and says whether more
//! remains. A task that errors is dropped.
//!
//! Everything is single-threaded; the handle and the executor share the
//! queue through `Rc<RefCell<..>>` on the reactor thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::rc::Rc;

use tracing::warn;

use super::{sys, Context, EventHandler, EventSet, NextStatus, Reactor, ReactorError};

/// `advance` calls per `ready` invocation, keeping the executor from
/// starving socket descriptors.
const ADVANCE_SLICE: usize = 16;

/// A unit of deferred work.
pub trait IdleTask {
    /// Run one increment. Return `true` while more work remains.
    fn advance(&mut self) -> io::Result<bool>;
}

type TaskQueue = Rc<RefCell<VecDeque<Box<dyn IdleTask>>>>;

/// Producer-side handle for enqueueing tasks.
#[derive(Clone)]
pub struct IdleHandle {
    queue: TaskQueue,
    kick_fd: RawFd,
}

impl IdleHandle {
    /// Enqueue a task, waking the reactor if the queue was empty.
    pub fn enqueue(&self, task: Box<dyn IdleTask>) -> io::Result<()> {
        let mut queue = self.queue.borrow_mut();
        if queue.is_empty() {
            sys::write(self.kick_fd, &1u64.to_ne_bytes())?;
        }
        queue.push_back(task);
        Ok(())
    }

    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

/// The executor half; an [`EventHandler`] over the event counter.
pub struct IdleExecutor {
    queue: TaskQueue,
}

impl IdleExecutor {
    /// Create the executor and register it with `reactor`.
    ///
    /// Returns the handle producers enqueue through.
    pub fn register(reactor: &mut Reactor) -> Result<IdleHandle, ReactorError> {
        let event = sys::eventfd().map_err(ReactorError::RegisterFailed)?;
        Self::register_fd(reactor, event)
    }

    fn register_fd(reactor: &mut Reactor, event: OwnedFd) -> Result<IdleHandle, ReactorError> {
        let queue: TaskQueue = Rc::new(RefCell::new(VecDeque::new()));
        let handle = IdleHandle {
            queue: Rc::clone(&queue),
            kick_fd: event.as_raw_fd(),
        };
        let executor = IdleExecutor { queue };
        reactor.register(event, EventSet::IN, Box::new(executor))?;
        Ok(handle)
    }
}

impl EventHandler for IdleExecutor {
    fn ready(&mut self, ctx: &mut Context<'_>) -> io::Result<NextStatus> {
        if !ctx.active().contains(EventSet::IN) {
            return Ok(NextStatus::Poll);
        }

        for _ in 0..ADVANCE_SLICE {
            // The borrow is released around `advance` so a task may
            // enqueue further work through a handle.
            let Some(mut task) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            match task.advance() {
                Ok(true) => self.queue.borrow_mut().push_front(task),
                Ok(false) => {}
                Err(err) => {
                    warn!(target: "craftwire::idle", error = %err, "idle task failed, dropped");
                }
            }
        }

        if self.queue.borrow().is_empty() {
            // Read the counter down so the next enqueue re-arms the wake.
            let mut counter = [0u8; 8];
            match sys::read(ctx.fd(), &mut counter) {
                Ok(8) => {}
                Ok(_) => {
                    return Err(io::Error::other("short read from the idle event counter"));
                }
                Err(err) if sys::is_would_block(&err) => {}
                Err(err) => return Err(err),
            }
            Ok(NextStatus::Poll)
        } else {
            Ok(NextStatus::More)
        }
    }
}
