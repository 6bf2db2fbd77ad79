use std::sync::Arc;

/// A unit of work handed to an [`Executor`] or posted to an [`Origin`][crate::Origin].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A worker execution context: something that accepts jobs and runs them later, off the calling
/// thread.
///
/// [`ThreadPool`][crate::ThreadPool] is the implementation shipped with this crate. Other
/// implementations must not block in [`Executor::submit`] beyond what it takes to enqueue the
/// job, since [`Threader::start`][crate::Threader::start] is expected to return immediately.
///
/// If an implementation cannot accept a job, it should panic; there is no way to report a
/// rejected submission to the caller.
pub trait Executor: Send + Sync {
    /// Schedules `job` for asynchronous execution.
    fn submit(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn submit(&self, job: Job) {
        (**self).submit(job)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn submit(&self, job: Job) {
        (**self).submit(job)
    }
}
