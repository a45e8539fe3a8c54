use super::{holder::same_address, Holder, ReferenceCounter};
use crate::resource::{Resource, ResourceUser};
use std::{fmt, sync::Weak};

/// Weak observer of an object owned by [`Holder`]s.
///
/// A user never keeps its object alive. To access the object, [`User::lock`] it, which yields a
/// holder that's null if the object has already been destroyed.
pub struct User<T: ?Sized> {
    pub(super) inner: Option<Weak<T>>,
}

impl<T: ?Sized> User<T> {
    /// Creates a null user.
    pub const fn null() -> Self {
        Self { inner: None }
    }

    pub(crate) fn from_weak(weak: Weak<T>) -> Self {
        Self { inner: Some(weak) }
    }

    /// Atomically acquires a holder of the object. Null if the object is gone.
    pub fn lock(&self) -> Holder<T> {
        Holder {
            inner: self.inner.as_ref().and_then(Weak::upgrade),
        }
    }

    /// Whether the user is null, or observes an object that's already destroyed.
    pub fn is_invalid(&self) -> bool {
        self.inner.as_ref().map_or(true, |weak| weak.strong_count() == 0)
    }

    /// Whether the observed object has been destroyed. Null users are never expired, since they
    /// never observed anything.
    pub fn is_expired(&self) -> bool {
        self.inner.as_ref().map_or(false, |weak| weak.strong_count() == 0)
    }

    /// Turns this user into a null user.
    pub fn reset(&mut self) {
        self.inner = None;
    }

    /// Counts of the observed allocation. Once the object is destroyed, the user count is only
    /// known to include this user.
    pub fn counter(&self) -> ReferenceCounter {
        match &self.inner {
            Some(weak) => ReferenceCounter {
                holders: weak.strong_count(),
                users: weak.weak_count().max(1),
            },
            None => ReferenceCounter::default(),
        }
    }

    /// Whether both users observe the same allocation. Two null users are equal.
    pub fn ptr_eq(&self, other: &User<T>) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => same_address(a.as_ptr(), b.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Resource> User<T> {
    /// Type-erases the user, keeping the same counter.
    pub fn as_resource(&self) -> ResourceUser {
        User {
            inner: self.inner.clone().map(|weak| weak as Weak<dyn Resource>),
        }
    }
}

impl User<dyn Resource> {
    /// Recovers the concrete type of an erased resource. The resource has to be alive for its
    /// type to be checked, so expired users always yield a null user.
    pub fn downcast<T: Resource>(&self) -> User<T> {
        self.lock().downcast::<T>().user()
    }
}

impl<T: ?Sized> Clone for User<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Default for User<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<&Holder<T>> for User<T> {
    fn from(holder: &Holder<T>) -> Self {
        holder.user()
    }
}

impl<T: ?Sized> fmt::Debug for User<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(weak) => f
                .debug_struct("User")
                .field("address", &(weak.as_ptr() as *const ()))
                .field("counter", &self.counter())
                .finish(),
            None => f.write_str("User(null)"),
        }
    }
}
