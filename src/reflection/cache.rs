//! Lazily populated, race-tolerant cache slots.
//!
//! Reflection caches derived state (parameter lists, invokers) on the method it was derived
//! from. The values are pure functions of immutable metadata, so a slot never makes one
//! thread wait for another one's computation: every thread that finds the slot empty computes
//! the value itself and then tries to publish it with [`OnceLock::set`]. The first publication
//! sticks; later ones are discarded and their callers continue with the published value. A
//! publisher racing another one waits at most for that single store. All published values
//! are structurally interchangeable, so which one wins is unobservable to callers.
//!
//! The slot is a relaxed-consistency optimisation rather than a synchronisation primitive.
//! Redundant computation on a race is expected and harmless.

use std::sync::OnceLock;

use tracing::debug;

/// A write-once cache slot that computes outside of any lock.
///
/// # Examples
///
/// ```rust
/// use dotreflect::reflection::LazySlot;
///
/// let slot = LazySlot::new();
/// assert_eq!(slot.get(), None);
/// assert_eq!(slot.get_or_compute(|| 42), 42);
/// assert_eq!(slot.get_or_compute(|| 7), 42);
/// ```
pub struct LazySlot<T> {
    value: OnceLock<T>,
}

impl<T: Clone> LazySlot<T> {
    /// Create an empty slot
    #[must_use]
    pub const fn new() -> Self {
        LazySlot {
            value: OnceLock::new(),
        }
    }

    /// The published value, if any
    pub fn get(&self) -> Option<T> {
        self.value.get().cloned()
    }

    /// Has a value been published
    pub fn is_populated(&self) -> bool {
        self.value.get().is_some()
    }

    /// Publish `value` unless another one is already present, returning whichever value the
    /// slot holds afterwards.
    pub fn publish(&self, value: T) -> T {
        if self.value.set(value).is_err() {
            debug!("cache slot already populated, dropping redundant value");
        }
        match self.value.get() {
            Some(winner) => winner.clone(),
            // `set` leaves the slot initialized whether or not it stored
            None => unreachable!("cache slot empty after publish"),
        }
    }

    /// Return the cached value, computing and publishing it first if the slot is empty
    pub fn get_or_compute<F>(&self, compute: F) -> T
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.value.get() {
            return value.clone();
        }
        self.publish(compute())
    }

    /// Like [`Self::get_or_compute`], for computations that can fail. Failures are not
    /// cached: the next call computes again.
    ///
    /// # Errors
    /// Returns whatever error `compute` returns
    pub fn get_or_try_compute<E, F>(&self, compute: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        Ok(self.publish(compute()?))
    }
}

impl<T: Clone> Default for LazySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LazySlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("LazySlot").field(value).finish(),
            None => f.write_str("LazySlot(<empty>)"),
        }
    }
}
