use std::{
    io, mem,
    num::NonZeroUsize,
    panic::{self, resume_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;

use crate::{
    executor::{Executor, Job},
    sync::Mutex,
};

/// A builder object that can be used to configure and spawn a [`ThreadPool`].
#[derive(Clone, Default)]
pub struct ThreadPoolBuilder {
    name: Option<String>,
    threads: Option<usize>,
}

impl ThreadPoolBuilder {
    /// Sets the base name of the [`ThreadPool`] threads.
    ///
    /// Each thread spawned will be named according to this base name and its index.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the number of threads in the pool.
    ///
    /// By default, the pool spawns as many threads as [`thread::available_parallelism`] reports,
    /// or 1 if that information is unavailable.
    #[inline]
    pub fn threads(self, threads: usize) -> Self {
        Self {
            threads: Some(threads),
            ..self
        }
    }

    /// Spawns the [`ThreadPool`].
    pub fn spawn(self) -> io::Result<ThreadPool> {
        let count = self.threads.unwrap_or_else(|| {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        });
        assert_ne!(count, 0, "a thread pool needs at least 1 thread");

        let panic_flag = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(count);
        let (sender, recv) = crossbeam_channel::unbounded::<Job>();
        for i in 0..count {
            let mut builder = thread::Builder::new();
            let name = self.name.as_ref().map(|name| format!("{name}-{i}"));
            if let Some(name) = &name {
                builder = builder.name(name.clone());
            }
            let recv = recv.clone();
            let panic_flag = panic_flag.clone();
            let handle = builder.spawn(move || {
                if let Some(name) = &name {
                    log::trace!("pool thread '{name}' starting");
                }
                let res = panic::catch_unwind(AssertUnwindSafe(|| {
                    for job in recv {
                        job();
                    }
                }));
                if let Some(name) = &name {
                    log::trace!("pool thread '{name}' exiting");
                }
                if let Err(payload) = res {
                    panic_flag.store(true, Ordering::Relaxed);
                    resume_unwind(payload);
                }
            })?;
            handles.push(handle);
        }

        Ok(ThreadPool {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            panic_flag,
            threads: count,
        })
    }
}

/// An owned set of threads running submitted [`Job`]s.
///
/// Jobs are queued without bound, so [`ThreadPool::submit`] never blocks.
///
/// The pool enforces structured concurrency: when it is dropped, the queue is closed, the
/// remaining jobs are run and all threads are joined. If a job has panicked, the panic is
/// forwarded to the thread dropping the pool, or to the next caller of [`ThreadPool::submit`].
/// This is how a task that fails without an exception handler tears down its owner.
pub struct ThreadPool {
    sender: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// Set to `true` when any thread panics.
    panic_flag: Arc<AtomicBool>,
    threads: usize,
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait_for_exit();
    }
}

impl ThreadPool {
    /// Returns a builder that can be used to configure and spawn a [`ThreadPool`].
    #[inline]
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::default()
    }

    /// Spawns an unnamed [`ThreadPool`] with `threads` threads.
    pub fn new(threads: usize) -> io::Result<Self> {
        Self::builder().threads(threads).spawn()
    }

    /// Returns the number of threads this pool was spawned with.
    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn wait_for_exit(&self) {
        // Close the queue to signal the threads to exit once it is drained.
        drop(self.sender.lock().take());

        // Joined without holding the lock: a job still running on one of these threads may
        // submit to this pool and end up here too.
        let handles = mem::take(&mut *self.handles.lock());
        let mut payload = None;
        for handle in handles {
            if handle.thread().id() == thread::current().id() {
                // A pool thread can't join itself; it exits once its current job returns.
                continue;
            }
            if let Err(pl) = handle.join() {
                payload = Some(pl);
            }
        }
        if let Some(payload) = payload {
            if !thread::panicking() {
                resume_unwind(payload);
            }
        }
    }

    /// Queues `job` to run on one of the pool's threads.
    ///
    /// If a pool thread has panicked, this shuts the pool down and propagates the panic to the
    /// calling thread instead.
    pub fn submit(&self, job: Job) {
        if !self.panic_flag.load(Ordering::Relaxed) {
            if let Some(sender) = &*self.sender.lock() {
                if sender.send(job).is_ok() {
                    return;
                }
            }
        }

        // A thread has panicked, or all of them have exited, which only happens when they
        // panicked. If another caller is already joining the threads, that caller forwards the
        // original panic.
        self.wait_for_exit();
        panic!("job submitted to a thread pool that has shut down");
    }
}

impl Executor for ThreadPool {
    fn submit(&self, job: Job) {
        ThreadPool::submit(self, job)
    }
}
