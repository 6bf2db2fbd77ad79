use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    executor::{Executor, Job},
    lifecycle::{Lifecycle, LifecycleObserver},
    origin::Origin,
    task::{DeliveryProcedure, ExceptionHandler, TaskFn},
};

/// Runs a task on an [`Executor`] and delivers its outcome back to where it was started.
///
/// Calling [`Threader::start`] submits the task. Once the task has returned:
///
/// - If an [`Origin`] is configured and `start` was called on the origin thread, the outcome is
///   posted to the origin and delivered there. Otherwise it is delivered on the worker thread
///   that ran the task.
/// - A successful value goes to the delivery procedure. An error goes to the exception handler.
///   If there is no exception handler, the error is fatal and the worker thread panics; the
///   executor is then responsible for forwarding that panic (see
///   [`ThreadPool`][crate::ThreadPool]).
/// - If a [`Lifecycle`] is observed and it has been stopped (and not started again) by the time
///   the task returns, the outcome is dropped and nothing is delivered. The task itself always
///   runs to completion.
///
/// The threader starts observing its lifecycle when it is created, and stops once an outcome has
/// been delivered or dropped.
///
/// Most users create threaders through a [`Builder`][crate::Builder].
pub struct Threader<T> {
    executor: Arc<dyn Executor>,
    shared: Arc<Shared<T>>,
}

/// Everything a submitted job needs. Excludes the executor: a job must never own the pool it
/// runs on.
struct Shared<T> {
    task: TaskFn<T>,
    deliver: DeliveryProcedure<T>,
    on_error: Option<ExceptionHandler>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    origin: Option<Arc<dyn Origin>>,
    gate: Arc<DeliveryGate>,
    /// `true` while `gate` is registered with `lifecycle`.
    observing: AtomicBool,
}

/// The flag deciding whether an outcome is still wanted, driven by lifecycle events.
///
/// This is a best-effort gate, not a cancellation token: it is read once, right after the task
/// returns, and events arriving after that have no effect on the outcome in flight.
struct DeliveryGate {
    open: AtomicBool,
}

impl LifecycleObserver for DeliveryGate {
    fn on_deactivate(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn on_reactivate(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

impl<T: Send + 'static> Threader<T> {
    /// Creates a threader and, if `lifecycle` is given, starts observing it right away.
    pub fn new(
        executor: Arc<dyn Executor>,
        task: TaskFn<T>,
        deliver: DeliveryProcedure<T>,
        on_error: Option<ExceptionHandler>,
        lifecycle: Option<Arc<dyn Lifecycle>>,
        origin: Option<Arc<dyn Origin>>,
    ) -> Self {
        let gate = Arc::new(DeliveryGate {
            open: AtomicBool::new(true),
        });
        if let Some(lifecycle) = &lifecycle {
            lifecycle.add_observer(gate.clone());
        }
        let observing = AtomicBool::new(lifecycle.is_some());
        Self {
            executor,
            shared: Arc::new(Shared {
                task,
                deliver,
                on_error,
                lifecycle,
                origin,
                gate,
                observing,
            }),
        }
    }

    /// Submits the task to the executor. Does not block.
    ///
    /// Calling this again submits the task again, and results in a separate delivery. All
    /// submissions share the same lifecycle observation, which ends with the first outcome.
    pub fn start(&self) {
        // Must be captured here: by the time the task has run, we're on a worker thread.
        let on_origin = self.shared.origin.as_ref().is_some_and(|o| o.is_current());
        log::trace!("submitting task (started on origin: {on_origin})");

        let shared = self.shared.clone();
        self.executor.submit(Box::new(move || shared.execute(on_origin)));
    }
}

impl<T> Threader<T> {
    /// Returns `true` while this threader is registered with its lifecycle.
    pub fn is_observing(&self) -> bool {
        self.shared.observing.load(Ordering::SeqCst)
    }
}

impl<T> fmt::Debug for Threader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Threader")
            .field("deliver", &self.shared.gate.open.load(Ordering::Relaxed))
            .field("observing", &self.is_observing())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Shared<T> {
    /// Runs on the worker thread.
    fn execute(self: Arc<Self>, on_origin: bool) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (self.task)())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                self.stop_observing();
                panic::resume_unwind(payload);
            }
        };

        let delivery: Job = match outcome {
            Ok(value) => {
                let deliver = self.deliver.clone();
                Box::new(move || deliver(value))
            }
            Err(error) => match &self.on_error {
                Some(handler) => {
                    let handler = handler.clone();
                    Box::new(move || handler(error))
                }
                None => {
                    self.stop_observing();
                    log::error!("task failed and no exception handler is configured: {error}");
                    panic!("unhandled task failure: {error}");
                }
            },
        };

        if !self.gate.open.load(Ordering::SeqCst) {
            log::debug!("lifecycle is stopped, dropping task outcome");
            drop(delivery);
            self.stop_observing();
            return;
        }

        match &self.origin {
            Some(origin) if on_origin => {
                log::trace!("posting outcome to origin");
                let shared = self.clone();
                origin.post(Box::new(move || shared.finish(delivery)));
            }
            _ => self.finish(delivery),
        }
    }
}

impl<T> Shared<T> {
    fn finish(&self, delivery: Job) {
        let _teardown = Teardown(self);
        delivery();
    }

    /// Unregisters from the lifecycle. Idempotent.
    fn stop_observing(&self) {
        if !self.observing.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(lifecycle) = &self.lifecycle {
            let observer: Arc<dyn LifecycleObserver> = self.gate.clone();
            lifecycle.remove_observer(&observer);
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Covers threaders that are dropped without being started, and outcomes posted to an
        // origin that never ran them.
        self.stop_observing();
    }
}

/// Stops observing the lifecycle when dropped, even if the delivery panicked.
struct Teardown<'a, T>(&'a Shared<T>);

impl<T> Drop for Teardown<'_, T> {
    fn drop(&mut self) {
        self.0.stop_observing();
    }
}
