//! The origin context: the single thread results are handed back to.
//!
//! A [`Threader`][crate::Threader] asks its [`Origin`] whether [`start`] is being called on the
//! origin thread. If so, the outcome is posted back there once the task has run; otherwise it is
//! delivered directly on the worker thread.
//!
//! GUI toolkits typically already have such a context (their main thread and its event queue).
//! [`MainLoop`] is a minimal one for programs that don't: a cooperative, single-threaded event
//! loop that runs posted events one at a time, in the order they were posted, whenever its owner
//! pumps it.
//!
//! [`start`]: crate::Threader::start

use std::{
    marker::PhantomData,
    sync::Arc,
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::executor::Job;

/// A single-threaded context that side effects can be posted to.
pub trait Origin: Send + Sync {
    /// Returns `true` if the calling thread is the origin thread.
    fn is_current(&self) -> bool;

    /// Schedules `event` to run on the origin thread, after every event posted before it.
    ///
    /// This must not block waiting for `event` to run.
    fn post(&self, event: Job);
}

impl<O: Origin + ?Sized> Origin for Arc<O> {
    fn is_current(&self) -> bool {
        (**self).is_current()
    }

    fn post(&self, event: Job) {
        (**self).post(event)
    }
}

/// A cooperative event loop bound to the thread that created it.
///
/// Events are posted through a [`LoopHandle`] and run when the owning thread calls one of the
/// `run_*` methods. [`MainLoop`] is not [`Send`], so events can never run anywhere but on its
/// thread.
pub struct MainLoop {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl MainLoop {
    /// Creates an event loop owned by the calling thread.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            thread: thread::current().id(),
            _not_send: PhantomData,
        }
    }

    /// Returns a [`LoopHandle`] that posts events to this loop.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
            thread: self.thread,
        }
    }

    /// Runs every event that is already queued, without waiting for new ones.
    ///
    /// Events posted by the events being run are run too. Returns the number of events run.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            event();
            count += 1;
        }
        count
    }

    /// Waits up to `timeout` for an event and runs it.
    ///
    /// Returns `false` if no event arrived in time.
    pub fn run_once(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => {
                event();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            // We hold a sender ourselves, so the channel can't disconnect.
            Err(RecvTimeoutError::Disconnected) => unreachable!(),
        }
    }

    /// Runs events as they arrive until `cond` returns `true` or `timeout` elapses.
    ///
    /// `cond` is checked before waiting and after every event. Returns its last result.
    pub fn run_until(&self, timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if cond() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.run_once(deadline - now);
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable handle that posts events to a [`MainLoop`].
///
/// This is the [`Origin`] implementation for [`MainLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Job>,
    thread: ThreadId,
}

impl Origin for LoopHandle {
    fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    fn post(&self, event: Job) {
        if self.sender.send(event).is_err() {
            log::warn!("main loop was dropped, discarding posted event");
        }
    }
}
