use super::{ReferenceCounter, User};
use crate::resource::{AsAny, HasProceeder, Resource, ResourceHolder};
use log::*;
use std::{
    fmt,
    ops::Deref,
    sync::{Arc, Weak},
};

/// Strong, shared ownership of a `T`.
///
/// Cloning a holder increments the holder count, dropping (or [`Holder::release`]-ing) it
/// decrements it. Once it reaches zero, `T` is dropped. A holder may also be null, in which case
/// [`Holder::try_get`] returns `None` and dereferencing panics.
pub struct Holder<T: ?Sized> {
    pub(super) inner: Option<Arc<T>>,
}

impl<T> Holder<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
        }
    }
}

impl<T: Resource> Holder<T> {
    /// Creates a holder for a resource, and binds the resource to its own weak handle, which is
    /// what lets it register itself in other listener graphs and emit events.
    ///
    /// Resources created with plain [`Holder::new`] are unbound, and can only receive events.
    pub fn new_resource(value: T) -> Self {
        let arc = Arc::new(value);
        let weak: Weak<dyn Resource> = Arc::downgrade(&arc) as Weak<dyn Resource>;
        arc.proceeder().bind(User::from_weak(weak));
        Self { inner: Some(arc) }
    }

    /// Type-erases the holder, keeping the same counter.
    pub fn as_resource(&self) -> ResourceHolder {
        Holder {
            inner: self.inner.clone().map(|arc| arc as Arc<dyn Resource>),
        }
    }
}

impl Holder<dyn Resource> {
    /// Recovers the concrete type of an erased resource. Returns a null holder if the resource
    /// isn't a `T`, or if this holder is null.
    pub fn downcast<T: Resource>(&self) -> Holder<T> {
        let inner = self
            .inner
            .clone()
            .and_then(|arc| arc.into_any_arc().downcast::<T>().ok());
        Holder { inner }
    }
}

impl<T: ?Sized> Holder<T> {
    /// Creates a null holder.
    pub const fn null() -> Self {
        Self { inner: None }
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.inner.is_none()
    }

    /// The held object, `None` for a null holder.
    #[inline]
    pub fn try_get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// Creates a weak [`User`] of this holder's object.
    pub fn user(&self) -> User<T> {
        User {
            inner: self.inner.as_ref().map(Arc::downgrade),
        }
    }

    /// Drops this holder's reference early, turning it into a null holder.
    pub fn release(&mut self) {
        self.inner = None;
    }

    pub fn counter(&self) -> ReferenceCounter {
        self.inner
            .as_ref()
            .map(|arc| ReferenceCounter {
                holders: Arc::strong_count(arc),
                users: Arc::weak_count(arc),
            })
            .unwrap_or_default()
    }

    /// Whether both holders point to the same object. Two null holders are equal.
    pub fn ptr_eq(&self, other: &Holder<T>) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => same_address(Arc::as_ptr(a), Arc::as_ptr(b)),
            (None, None) => true,
            _ => false,
        }
    }

    /// Whether given user observes the object of this holder.
    pub fn same_counter(&self, user: &User<T>) -> bool {
        match (&self.inner, &user.inner) {
            (Some(a), Some(b)) => same_address(Arc::as_ptr(a), b.as_ptr()),
            _ => false,
        }
    }
}

/// Compares addresses only, ignoring trait object metadata.
pub(super) fn same_address<T: ?Sized>(a: *const T, b: *const T) -> bool {
    a as *const () == b as *const ()
}

impl<T: ?Sized> Clone for Holder<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Default for Holder<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for Holder<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.inner.as_deref() {
            Some(value) => value,
            None => {
                error!("Dereferenced a null holder");
                panic!("dereferenced a null holder");
            }
        }
    }
}

impl<T: ?Sized> fmt::Debug for Holder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(arc) => f
                .debug_struct("Holder")
                .field("address", &(Arc::as_ptr(arc) as *const ()))
                .field("counter", &self.counter())
                .finish(),
            None => f.write_str("Holder(null)"),
        }
    }
}
