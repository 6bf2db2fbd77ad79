use std::{error::Error, fmt, sync::Arc};

use crate::{
    executor::Executor,
    lifecycle::Lifecycle,
    origin::Origin,
    task::{
        DeliveryProcedure, EmptyListener, ExceptionHandler, ResultListener, TaskError, TaskFn,
        TaskKind,
    },
    threader::Threader,
};

/// Configures and starts a [`Threader`].
///
/// Every setter replaces whatever was configured for the same concern before. [`Builder::task`]
/// and [`Builder::action`] share one slot, so the last one called wins.
///
/// [`Builder::start`] validates the configuration, creates the [`Threader`] and starts it. The
/// builder is not consumed and can be started again, which creates and starts a new, independent
/// [`Threader`].
///
/// # Listeners
///
/// A value-producing task delivers its value to the [`Builder::on_result`] listener. If none is
/// set, the [`Builder::on_complete`] listener is called instead. An action only ever calls the
/// [`Builder::on_complete`] listener. At most one listener is called per outcome.
pub struct Builder<T> {
    task: Option<TaskKind<T>>,
    on_result: Option<ResultListener<T>>,
    on_complete: Option<EmptyListener>,
    on_error: Option<ExceptionHandler>,
    executor: Option<Arc<dyn Executor>>,
    origin: Option<Arc<dyn Origin>>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
}

impl<T: Send + 'static> Builder<T> {
    /// Creates a builder with nothing configured.
    pub fn new() -> Self {
        Self {
            task: None,
            on_result: None,
            on_complete: None,
            on_error: None,
            executor: None,
            origin: None,
            lifecycle: None,
        }
    }

    /// Sets a value-producing task, replacing any previously configured task or action.
    pub fn task<F>(self, task: F) -> Self
    where
        F: Fn() -> Result<T, TaskError> + Send + Sync + 'static,
    {
        Self {
            task: Some(TaskKind::Value(Arc::new(task))),
            ..self
        }
    }

    /// Sets an action, a task that produces no value, replacing any previously configured task or
    /// action.
    pub fn action<F>(self, action: F) -> Self
    where
        F: Fn() -> Result<(), TaskError> + Send + Sync + 'static,
    {
        Self {
            task: Some(TaskKind::Action(Arc::new(action))),
            ..self
        }
    }

    /// Sets the listener receiving the value of a value-producing task.
    pub fn on_result<F>(self, listener: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            on_result: Some(Arc::new(listener)),
            ..self
        }
    }

    /// Sets the listener notified when the task completes, without its value.
    pub fn on_complete<F>(self, listener: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            on_complete: Some(Arc::new(listener)),
            ..self
        }
    }

    /// Sets the handler receiving the error of a failed task.
    ///
    /// Without a handler, a failing task panics the worker thread it ran on.
    pub fn on_error<F>(self, handler: F) -> Self
    where
        F: Fn(TaskError) + Send + Sync + 'static,
    {
        Self {
            on_error: Some(Arc::new(handler)),
            ..self
        }
    }

    /// Sets the [`Executor`] the task runs on. Required.
    ///
    /// The executor is shared, not owned: the caller keeps its own handle and decides when the
    /// executor goes away. Dropping the builder or its threaders never shuts the executor down,
    /// so [`Builder::start`] returns as soon as the task is queued.
    ///
    /// A [`ThreadPool`][crate::ThreadPool] joins its threads when dropped, so it has to be passed
    /// as an [`Arc`] that outlives the statement starting the task:
    ///
    /// ```compile_fail
    /// use handoff::{Builder, ThreadPool};
    ///
    /// Builder::new()
    ///     .executor(ThreadPool::new(1).unwrap())
    ///     .task(|| Ok(1))
    ///     .start()
    ///     .unwrap();
    /// ```
    ///
    /// ```
    /// use std::sync::Arc;
    /// use handoff::{Builder, ThreadPool};
    ///
    /// let pool = Arc::new(ThreadPool::new(1).unwrap());
    /// Builder::new()
    ///     .executor(pool.clone())
    ///     .task(|| Ok(1))
    ///     .start()
    ///     .unwrap();
    /// ```
    pub fn executor(self, executor: Arc<dyn Executor>) -> Self {
        Self {
            executor: Some(executor),
            ..self
        }
    }

    /// Sets the [`Origin`] outcomes are handed back to when the threader is started on it.
    ///
    /// Without an origin, outcomes are always delivered on the worker thread.
    pub fn origin<O: Origin + 'static>(self, origin: O) -> Self {
        Self {
            origin: Some(Arc::new(origin)),
            ..self
        }
    }

    /// Observes `lifecycle`, dropping the outcome if it is stopped when the task finishes.
    pub fn observe<L: Lifecycle + 'static>(self, lifecycle: L) -> Self {
        Self {
            lifecycle: Some(Arc::new(lifecycle)),
            ..self
        }
    }

    /// Creates a [`Threader`] from the current configuration and starts it.
    ///
    /// Returns an error, without submitting anything, if no task or no executor is configured.
    pub fn start(&self) -> Result<(), BuildError> {
        let task = self.task.clone().ok_or(BuildError::MissingTask)?;
        let executor = self.executor.clone().ok_or(BuildError::MissingExecutor)?;

        match task {
            TaskKind::Value(task) => {
                let deliver: DeliveryProcedure<T> = match (&self.on_result, &self.on_complete) {
                    (Some(listener), _) => listener.clone(),
                    (None, Some(listener)) => {
                        let listener = listener.clone();
                        Arc::new(move |_: T| listener())
                    }
                    (None, None) => {
                        Arc::new(|_: T| log::debug!("no listener configured for task"))
                    }
                };
                self.threader(executor, task, deliver).start();
            }
            TaskKind::Action(action) => {
                let deliver: DeliveryProcedure<()> = match &self.on_complete {
                    Some(listener) => {
                        let listener = listener.clone();
                        Arc::new(move |()| listener())
                    }
                    None => Arc::new(|()| log::debug!("no listener configured for action")),
                };
                self.threader(executor, action, deliver).start();
            }
        }
        Ok(())
    }

    fn threader<U: Send + 'static>(
        &self,
        executor: Arc<dyn Executor>,
        task: TaskFn<U>,
        deliver: DeliveryProcedure<U>,
    ) -> Threader<U> {
        Threader::new(
            executor,
            task,
            deliver,
            self.on_error.clone(),
            self.lifecycle.clone(),
            self.origin.clone(),
        )
    }
}

impl<T: Send + 'static> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Builder<T> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            on_result: self.on_result.clone(),
            on_complete: self.on_complete.clone(),
            on_error: self.on_error.clone(),
            executor: self.executor.clone(),
            origin: self.origin.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<T> fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("task", &self.task)
            .field("on_result", &self.on_result.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("executor", &self.executor.is_some())
            .field("origin", &self.origin.is_some())
            .field("lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}

/// An error returned by [`Builder::start`] when the configuration is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// Neither [`Builder::task`] nor [`Builder::action`] was called.
    MissingTask,
    /// [`Builder::executor`] was not called.
    MissingExecutor,
}

impl Error for BuildError {}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildError::MissingTask => "a threader cannot be started without a task",
            BuildError::MissingExecutor => "a threader cannot be started without an executor",
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        thread,
        time::{Duration, Instant},
    };

    use crossbeam_channel::unbounded;

    use crate::{
        lifecycle::{LifecycleRegistry, State},
        origin::MainLoop,
        pool::ThreadPool,
        test::{wait_for, Counting, Inline},
    };

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn missing_task() {
        let executor = Arc::new(Counting::new(Inline));
        let err = Builder::<()>::new()
            .executor(executor.clone())
            .on_complete(|| panic!("must not run"))
            .start()
            .unwrap_err();
        assert_eq!(err, BuildError::MissingTask);
        assert_eq!(err.to_string(), "a threader cannot be started without a task");
        assert_eq!(executor.submitted(), 0);
    }

    #[test]
    fn missing_executor() {
        let err = Builder::new().task(|| Ok(1)).start().unwrap_err();
        assert_eq!(err, BuildError::MissingExecutor);
    }

    #[test]
    fn task_is_checked_before_executor() {
        assert_eq!(
            Builder::<()>::new().start().unwrap_err(),
            BuildError::MissingTask
        );
    }

    #[test]
    fn value_is_delivered_unchanged() {
        let (tx, rx) = unbounded();
        let payload = Arc::new(String::from("payload"));
        let expected = payload.clone();
        Builder::new()
            .executor(Arc::new(Inline))
            .task(move || Ok(payload.clone()))
            .on_result(move |v| tx.send(v).unwrap())
            .start()
            .unwrap();

        let got = rx.try_recv().unwrap();
        assert!(Arc::ptr_eq(&got, &expected));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn action_calls_empty_listener_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        Builder::<()>::new()
            .executor(Arc::new(Inline))
            .action(|| Ok(()))
            .on_complete(move || {
                calls2.fetch_add(1, Ordering::SeqCst);
            })
            .start()
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn result_listener_wins_over_empty_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (seen1, seen2) = (seen.clone(), seen.clone());
        Builder::new()
            .executor(Arc::new(Inline))
            .task(|| Ok(3))
            .on_result(move |v| seen1.lock().unwrap().push(Some(v)))
            .on_complete(move || seen2.lock().unwrap().push(None))
            .start()
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), [Some(3)]);
    }

    #[test]
    fn empty_listener_stands_in_for_missing_result_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        Builder::new()
            .executor(Arc::new(Inline))
            .task(|| Ok("ignored"))
            .on_complete(move || {
                calls2.fetch_add(1, Ordering::SeqCst);
            })
            .start()
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_task_wins() {
        let (tx, rx) = unbounded();
        let (tx1, tx2) = (tx.clone(), tx);
        let builder = Builder::<i32>::new()
            .executor(Arc::new(Inline))
            .action(|| panic!("replaced action must not run"))
            .task(|| Ok(2))
            .on_result(move |v| tx1.send(v).unwrap())
            .on_complete(move || tx2.send(-1).unwrap());
        builder.start().unwrap();
        assert_eq!(rx.try_recv(), Ok(2));

        builder
            .clone()
            .task(|| panic!("replaced task must not run"))
            .action(|| Ok(()))
            .start()
            .unwrap();
        assert_eq!(rx.try_recv(), Ok(-1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn builder_can_be_started_repeatedly() {
        let executor = Arc::new(Counting::new(Inline));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let builder = Builder::new()
            .executor(executor.clone())
            .task(|| Ok(1))
            .on_result(move |v| {
                calls2.fetch_add(v, Ordering::SeqCst);
            });
        builder.start().unwrap();
        builder.start().unwrap();

        assert_eq!(executor.submitted(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_returns_while_the_task_runs() {
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let (tx, rx) = unbounded();
        let started = Instant::now();
        Builder::new()
            .executor(pool.clone())
            .task(|| {
                thread::sleep(Duration::from_millis(400));
                Ok(1)
            })
            .on_result(move |v| tx.send(v).unwrap())
            .start()
            .unwrap();

        // The builder is gone, but the pool (and the task) is still running.
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(rx.try_recv().is_err());
        assert_eq!(rx.recv_timeout(TIMEOUT), Ok(1));
    }

    #[test]
    fn failure_reaches_handler_on_origin() {
        let main = MainLoop::new();
        let pool = Arc::new(ThreadPool::new(2).unwrap());
        let (tx, rx) = unbounded();
        Builder::<u8>::new()
            .executor(pool.clone())
            .origin(main.handle())
            .task(|| Err("E".into()))
            .on_result(|_| panic!("must not deliver"))
            .on_error(move |e| tx.send((e.to_string(), thread::current().id())).unwrap())
            .start()
            .unwrap();

        assert!(main.run_until(TIMEOUT, || !rx.is_empty()));
        assert_eq!(rx.try_recv(), Ok(("E".to_string(), thread::current().id())));
    }

    #[test]
    fn reactivated_lifecycle_delivers() {
        let registry = Arc::new(LifecycleRegistry::new(State::Resumed));
        let main = MainLoop::new();
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let (tx, rx) = unbounded();
        Builder::new()
            .executor(pool.clone())
            .origin(main.handle())
            .observe(registry.clone())
            .task(|| {
                thread::sleep(Duration::from_millis(200));
                Ok('X')
            })
            .on_result(move |v| tx.send(v).unwrap())
            .start()
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        registry.move_to(State::Created);
        thread::sleep(Duration::from_millis(50));
        registry.move_to(State::Resumed);

        assert!(main.run_until(TIMEOUT, || !rx.is_empty()));
        assert_eq!(rx.try_recv(), Ok('X'));
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn stopped_lifecycle_suppresses_delivery() {
        let registry = Arc::new(LifecycleRegistry::new(State::Resumed));
        let main = MainLoop::new();
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let finished = Arc::new(AtomicUsize::new(0));
        let finished2 = finished.clone();
        Builder::new()
            .executor(pool.clone())
            .origin(main.handle())
            .observe(registry.clone())
            .task(move || {
                thread::sleep(Duration::from_millis(200));
                finished2.fetch_add(1, Ordering::SeqCst);
                Ok('X')
            })
            .on_result(|_| panic!("must not deliver"))
            .start()
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        registry.move_to(State::Created);

        assert!(wait_for(TIMEOUT, || registry.observer_count() == 0));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(main.run_pending(), 0);
    }
}
