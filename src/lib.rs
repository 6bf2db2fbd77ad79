//! Run work on a thread pool and hand the outcome back to the thread that asked for it.
//!
//! (if you want to run many small I/O tasks concurrently, an `async` runtime is a better fit;
//! this library is about moving one expensive computation off a thread that must stay
//! responsive, like a UI thread)
//!
//! # Overview
//!
//! A [`Threader`] runs a task on an [`Executor`] (usually a [`ThreadPool`]). When the task
//! returns, its outcome is delivered to a listener:
//!
//! - on the *origin* thread, if the threader was started there, or
//! - directly on the worker thread otherwise.
//!
//! The origin is whatever single-threaded context results should come back to, described by the
//! [`Origin`] trait. [`MainLoop`] is a simple cooperative event loop implementing it.
//!
//! Successful values go to the result listener and errors go to the exception handler. A task
//! that fails without an exception handler panics its worker thread, and the [`ThreadPool`]
//! forwards that panic to its owner; failures are never silently dropped.
//!
//! A threader can also observe a [`Lifecycle`]. If the lifecycle has been stopped when the task
//! returns, the outcome is dropped instead of delivered, so a closed screen never receives a late
//! result. The task itself is never interrupted.
//!
//! [`Builder`] is the usual way to configure and start a [`Threader`].
//!
//! # Usage
//!
//! Compute a value on a pool and receive it on the current thread:
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use handoff::{Builder, MainLoop, ThreadPool};
//!
//! let main = MainLoop::new();
//! let pool = Arc::new(ThreadPool::new(2).unwrap());
//! let (tx, rx) = crossbeam_channel::unbounded();
//!
//! Builder::new()
//!     .executor(pool.clone())
//!     .origin(main.handle())
//!     .task(|| Ok(6 * 7))
//!     .on_result(move |answer| tx.send(answer).unwrap())
//!     .start()
//!     .unwrap();
//!
//! // The result is posted back to this thread and delivered while the loop runs.
//! main.run_until(Duration::from_secs(5), || !rx.is_empty());
//! assert_eq!(rx.try_recv(), Ok(42));
//! ```
//!
//! Drop the result if its owner went away in the meantime:
//!
//! ```
//! use std::{sync::Arc, thread, time::Duration};
//! use handoff::{Builder, LifecycleRegistry, MainLoop, State, ThreadPool};
//!
//! let main = MainLoop::new();
//! let pool = Arc::new(ThreadPool::new(1).unwrap());
//! let screen = Arc::new(LifecycleRegistry::new(State::Resumed));
//!
//! Builder::new()
//!     .executor(pool.clone())
//!     .origin(main.handle())
//!     .observe(screen.clone())
//!     .task(|| {
//!         thread::sleep(Duration::from_millis(100));
//!         Ok("slow result")
//!     })
//!     .on_result(|_| unreachable!("the screen was stopped"))
//!     .on_error(|e| eprintln!("task failed: {e}"))
//!     .start()
//!     .unwrap();
//!
//! screen.move_to(State::Created);
//!
//! // Joins the pool; the task still ran to completion.
//! drop(pool);
//! assert_eq!(main.run_pending(), 0);
//! assert_eq!(screen.observer_count(), 0);
//! ```

mod builder;
mod executor;
mod lifecycle;
mod origin;
mod pool;
mod sync;
mod task;
mod threader;


pub use builder::{BuildError, Builder};
pub use executor::{Executor, Job};
pub use lifecycle::{Event, Lifecycle, LifecycleObserver, LifecycleRegistry, State};
pub use origin::{LoopHandle, MainLoop, Origin};
pub use pool::{ThreadPool, ThreadPoolBuilder};
pub use task::{
    DeliveryProcedure, EmptyListener, ExceptionHandler, ResultListener, TaskError, TaskFn,
    TaskKind,
};
pub use threader::Threader;
