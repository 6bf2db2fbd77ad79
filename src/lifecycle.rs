//! Lifecycle observation.
//!
//! A [`Lifecycle`] is something with an activation state, like a screen that can be shown and
//! hidden. A [`Threader`][crate::Threader] observing a lifecycle withholds its result while the
//! lifecycle is stopped, so that nothing gets delivered to an owner that no longer wants it.
//!
//! The states form a line from [`State::Destroyed`] to [`State::Resumed`]. Moving between two
//! neighboring states emits an [`Event`]; of these, [`Event::Stop`] *deactivates* the lifecycle
//! and [`Event::Start`] *reactivates* it.
//!
//! [`LifecycleRegistry`] is a ready-made [`Lifecycle`] that owners can drive by hand.

use std::{fmt, sync::Arc};

use crate::sync::Mutex;

/// The activation state of a [`Lifecycle`], ordered from least to most active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Torn down. Can be revived into [`State::Initialized`].
    Destroyed,
    /// Constructed, but not created yet.
    Initialized,
    /// Created, but not visible.
    Created,
    /// Visible. Results are wanted from here on.
    Started,
    /// Visible and in the foreground.
    Resumed,
}

impl State {
    /// The next more active state, and the event emitted when moving there.
    fn up(self) -> Option<(State, Option<Event>)> {
        Some(match self {
            // A destroyed lifecycle may be revived; this emits no event.
            State::Destroyed => (State::Initialized, None),
            State::Initialized => (State::Created, Some(Event::Create)),
            State::Created => (State::Started, Some(Event::Start)),
            State::Started => (State::Resumed, Some(Event::Resume)),
            State::Resumed => return None,
        })
    }

    /// The next less active state, and the event emitted when moving there.
    fn down(self) -> Option<(State, Option<Event>)> {
        Some(match self {
            State::Destroyed | State::Initialized => return None,
            State::Resumed => (State::Started, Some(Event::Pause)),
            State::Started => (State::Created, Some(Event::Stop)),
            State::Created => (State::Destroyed, Some(Event::Destroy)),
        })
    }
}

/// A transition between two neighboring [`State`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// [`State::Initialized`] to [`State::Created`].
    Create,
    /// [`State::Created`] to [`State::Started`]. Reactivates the lifecycle.
    Start,
    /// [`State::Started`] to [`State::Resumed`].
    Resume,
    /// [`State::Resumed`] to [`State::Started`].
    Pause,
    /// [`State::Started`] to [`State::Created`]. Deactivates the lifecycle.
    Stop,
    /// [`State::Created`] to [`State::Destroyed`].
    Destroy,
}

impl Event {
    /// Returns `true` for the transition that deactivates a lifecycle.
    pub fn is_deactivation(self) -> bool {
        self == Event::Stop
    }

    /// Returns `true` for the transition that reactivates a lifecycle.
    pub fn is_reactivation(self) -> bool {
        self == Event::Start
    }
}

/// Receives the events of a [`Lifecycle`] it was added to.
///
/// Events are delivered on whatever thread drives the lifecycle.
pub trait LifecycleObserver: Send + Sync {
    /// Called when the lifecycle is stopped.
    fn on_deactivate(&self) {}

    /// Called when the lifecycle is started again.
    fn on_reactivate(&self) {}

    /// Called for every event. Routes deactivation and reactivation to their methods.
    fn on_event(&self, event: Event) {
        if event.is_deactivation() {
            self.on_deactivate();
        } else if event.is_reactivation() {
            self.on_reactivate();
        }
    }
}

/// An observable activation state.
///
/// Observers are identified by their [`Arc`] allocation: `remove_observer` removes the observer
/// that was added through a clone of the same [`Arc`].
pub trait Lifecycle: Send + Sync {
    /// Registers `observer` for all future events.
    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>);

    /// Removes `observer`. Does nothing if it isn't registered.
    fn remove_observer(&self, observer: &Arc<dyn LifecycleObserver>);

    /// Returns the state the lifecycle is in right now.
    fn current_state(&self) -> State;
}

impl<L: Lifecycle + ?Sized> Lifecycle for Arc<L> {
    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        (**self).add_observer(observer)
    }

    fn remove_observer(&self, observer: &Arc<dyn LifecycleObserver>) {
        (**self).remove_observer(observer)
    }

    fn current_state(&self) -> State {
        (**self).current_state()
    }
}

fn same_observer(a: &Arc<dyn LifecycleObserver>, b: &Arc<dyn LifecycleObserver>) -> bool {
    // Data pointers only, vtable pointers are not unique.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// A [`Lifecycle`] whose state is set by its owner.
///
/// Changing the state emits one [`Event`] per step taken, in order, to every registered
/// observer. Observers are called without the registry's lock held, so they may add or remove
/// observers themselves.
pub struct LifecycleRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    state: State,
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl LifecycleRegistry {
    /// Creates a registry in `initial` state, without observers.
    pub fn new(initial: State) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                state: initial,
                observers: Vec::new(),
            }),
        }
    }

    /// Returns the number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    /// Moves one step towards [`State::Resumed`].
    ///
    /// # Panics
    ///
    /// Panics if the registry is already [`State::Resumed`].
    pub fn state_up(&self) {
        let step = self.current_state().up();
        let Some((state, event)) = step else {
            panic!("lifecycle is already resumed, can't go up");
        };
        self.step(state, event);
    }

    /// Moves one step towards [`State::Destroyed`].
    ///
    /// # Panics
    ///
    /// Panics if the registry is [`State::Destroyed`] or [`State::Initialized`].
    pub fn state_down(&self) {
        let step = self.current_state().down();
        let Some((state, event)) = step else {
            panic!("lifecycle is already destroyed, can't go down");
        };
        self.step(state, event);
    }

    /// Moves to `target`, emitting the events of every intermediate step.
    ///
    /// Moving down to [`State::Initialized`] passes through [`State::Destroyed`]. An
    /// [`State::Initialized`] registry can't be moved to [`State::Destroyed`] and stays put.
    pub fn move_to(&self, target: State) {
        loop {
            let current = self.current_state();
            let step = if target > current {
                current.up()
            } else if target < current {
                current.down()
            } else {
                None
            };
            match step {
                Some((state, event)) => self.step(state, event),
                None => return,
            }
        }
    }

    fn step(&self, state: State, event: Option<Event>) {
        let observers = {
            let mut inner = self.inner.lock();
            log::trace!("lifecycle {:?} -> {:?}", inner.state, state);
            inner.state = state;
            inner.observers.clone()
        };
        if let Some(event) = event {
            for observer in observers {
                observer.on_event(event);
            }
        }
    }
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::new(State::Initialized)
    }
}

impl Lifecycle for LifecycleRegistry {
    fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        let mut inner = self.inner.lock();
        if !inner.observers.iter().any(|o| same_observer(o, &observer)) {
            inner.observers.push(observer);
        }
    }

    fn remove_observer(&self, observer: &Arc<dyn LifecycleObserver>) {
        self.inner
            .lock()
            .observers
            .retain(|o| !same_observer(o, observer));
    }

    fn current_state(&self) -> State {
        self.inner.lock().state
    }
}

impl fmt::Debug for LifecycleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LifecycleRegistry")
            .field("state", &inner.state)
            .field("observers", &inner.observers.len())
            .finish()
    }
}
