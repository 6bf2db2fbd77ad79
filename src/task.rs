//! The callable shapes a [`Builder`][crate::Builder] and a [`Threader`][crate::Threader] are
//! configured with.

use std::{error::Error, fmt, sync::Arc};

/// The error type a task may fail with.
///
/// Anything implementing [`Error`] converts into it via `?` or `.into()`, including `&str` and
/// [`String`].
pub type TaskError = Box<dyn Error + Send + Sync + 'static>;

/// A unit of work that runs on the worker context.
///
/// Tasks are [`Fn`] rather than [`FnOnce`]: starting the same [`Threader`][crate::Threader]
/// twice runs its task twice.
pub type TaskFn<T> = Arc<dyn Fn() -> Result<T, TaskError> + Send + Sync>;

/// Delivers the value produced by a task.
///
/// Action tasks produce `()`, so their delivery procedure is a `DeliveryProcedure<()>`.
pub type DeliveryProcedure<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A listener receiving the value of a value-producing task.
pub type ResultListener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A listener notified when a task completed, without receiving a value.
pub type EmptyListener = Arc<dyn Fn() + Send + Sync>;

/// Receives the error of a failed task.
pub type ExceptionHandler = Arc<dyn Fn(TaskError) + Send + Sync>;

/// The task configured on a [`Builder`][crate::Builder].
///
/// A builder holds at most one of these, so configuring an action replaces a previously
/// configured value-producing task and vice versa.
pub enum TaskKind<T> {
    /// A task producing a `T`, delivered to the [`ResultListener`].
    Value(TaskFn<T>),
    /// A task producing nothing, delivered to the [`EmptyListener`].
    Action(TaskFn<()>),
}

impl<T> Clone for TaskKind<T> {
    fn clone(&self) -> Self {
        match self {
            TaskKind::Value(task) => TaskKind::Value(task.clone()),
            TaskKind::Action(task) => TaskKind::Action(task.clone()),
        }
    }
}

impl<T> fmt::Debug for TaskKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Value(_) => f.write_str("TaskKind::Value(..)"),
            TaskKind::Action(_) => f.write_str("TaskKind::Action(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_task() {
        let task: TaskFn<i32> = Arc::new(|| Ok(1));
        let kind = TaskKind::Value(task.clone());
        match kind.clone() {
            TaskKind::Value(cloned) => assert!(Arc::ptr_eq(&cloned, &task)),
            TaskKind::Action(_) => panic!("clone changed the kind"),
        }
        assert_eq!(format!("{kind:?}"), "TaskKind::Value(..)");
    }

    #[test]
    fn strings_convert_into_task_errors() {
        let task: TaskFn<()> = Arc::new(|| Err("boom".into()));
        let err = task().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
