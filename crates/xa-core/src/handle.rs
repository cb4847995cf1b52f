//! `Handle<T>` and `RelinkableHandle<T>`: shared references to a value.
//!
//! The model builder hands out a [`RelinkableHandle`] to the current
//! cross-asset model. Every rebuild links the handle to a fresh instance, so
//! holders observe the latest model without being re-wired, while an `Arc`
//! obtained through [`RelinkableHandle::current`] stays a consistent
//! snapshot for as long as it is held.
//!
//! | shape | Rust |
//! |-----|------|
//! | read-only, optionally null | `Handle<T>` (`Option<Arc<T>>`) |
//! | re-bindable, shared | `RelinkableHandle<T>` (`Arc<Mutex<Option<Arc<T>>>>`) |

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A shared, optionally-null reference to a value of type `T`.
///
/// The handle is *read-only*. To replace the contained value use a
/// [`RelinkableHandle`].
#[derive(Clone)]
pub struct Handle<T> {
    inner: Option<Arc<T>>,
}

impl<T> Handle<T> {
    /// Create a non-null handle wrapping `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
        }
    }

    /// Create a handle from an existing `Arc`.
    pub fn from_arc(arc: Arc<T>) -> Self {
        Self { inner: Some(arc) }
    }

    /// Create a null (empty) handle.
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// Return `true` if the handle is null (contains no value).
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Return a reference to the inner `Arc<T>`, or `None` if this handle is
    /// null.
    pub fn as_arc(&self) -> Option<&Arc<T>> {
        self.inner.as_ref()
    }

    /// Attempt to borrow the contained value.
    pub fn get(&self) -> Option<&T> {
        self.inner.as_deref()
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(v) => write!(f, "Handle({:?})", v),
            None => write!(f, "Handle(null)"),
        }
    }
}

/// A [`Handle`] whose contained value can be relinked at runtime.
///
/// The internal pointer is protected by a `Mutex` so that relinking from one
/// thread is visible to all threads holding a clone of this handle. A
/// poisoned lock is recovered, since the guarded value is a plain pointer
/// swap and can never be observed half-written.
#[derive(Clone)]
pub struct RelinkableHandle<T> {
    inner: Arc<Mutex<Option<Arc<T>>>>,
}

impl<T> RelinkableHandle<T> {
    /// Create a new relinkable handle, initially null.
    pub fn null() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a new relinkable handle wrapping `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Arc::new(value)))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<T>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the contained value with `value`.
    pub fn link_to(&self, value: T) {
        *self.lock() = Some(Arc::new(value));
    }

    /// Replace the contained value with an existing `Arc`.
    pub fn link_to_arc(&self, arc: Arc<T>) {
        *self.lock() = Some(arc);
    }

    /// Detach the handle from any value (make it null).
    pub fn unlink(&self) {
        *self.lock() = None;
    }

    /// Return `true` if the handle currently contains no value.
    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Execute a closure with a reference to the contained value.
    ///
    /// Returns `None` if the handle is null.
    pub fn with<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock();
        guard.as_deref().map(f)
    }

    /// Obtain a snapshot `Arc<T>` of the current value.
    pub fn current(&self) -> Option<Arc<T>> {
        self.lock().clone()
    }

    /// Read-only view of the current value.
    pub fn handle(&self) -> Handle<T> {
        match self.current() {
            Some(arc) => Handle::from_arc(arc),
            None => Handle::null(),
        }
    }
}

impl<T> Default for RelinkableHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RelinkableHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.current() {
            Some(v) => write!(f, "RelinkableHandle({:?})", v),
            None => write!(f, "RelinkableHandle(null)"),
        }
    }
}
