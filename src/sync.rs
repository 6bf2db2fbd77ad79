//! A [`Mutex`] that ignores lock poisoning.
//!
//! Tasks and listeners are user code and may panic while the lifecycle registry or the thread
//! pool is being touched from another thread. Panics already reach the owner of the work through
//! the pool, so a poisoned lock would only bury the original panic under knock-on `unwrap`s.

use std::{
    ops::{Deref, DerefMut},
    sync,
};

#[derive(Debug, Default)]
pub(crate) struct Mutex<T: ?Sized> {
    inner: sync::Mutex<T>,
}

impl<T> Mutex<T> {
    pub(crate) const fn new(t: T) -> Self {
        Self {
            inner: sync::Mutex::new(t),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        MutexGuard {
            inner: self.inner.lock().unwrap_or_else(sync::PoisonError::into_inner),
        }
    }
}

pub(crate) struct MutexGuard<'a, T: ?Sized + 'a> {
    inner: sync::MutexGuard<'a, T>,
}

impl<'a, T: ?Sized + 'a> Deref for MutexGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<'a, T: ?Sized + 'a> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}
