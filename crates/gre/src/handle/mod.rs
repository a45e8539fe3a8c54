//! Reference counted handles
//!
//! Every shared object of the engine is owned by one or more [`Holder`]s, and observed by any
//! number of [`User`]s. The object is destroyed exactly once, when the last holder goes away.
//! The allocation holding the counts lives a bit longer, until the last user is gone as well,
//! so users can always tell whether the object they point to is still there.
//!
//! Both handles may be null. Operations on a null or expired handle never crash, they just
//! return invalid results (with the exception of [`Holder`]'s `Deref`, which fails fast).

mod holder;
mod user;

pub use holder::Holder;
pub use user::User;

/// A snapshot of the counts of a shared allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceCounter {
    /// Amount of live [`Holder`]s
    pub holders: usize,
    /// Amount of live [`User`]s
    pub users: usize,
}

impl ReferenceCounter {
    /// Whether the counted object is still alive.
    pub fn is_object_valid(&self) -> bool {
        self.holders > 0
    }

    /// Whether the counter itself is still allocated.
    pub fn is_counter_valid(&self) -> bool {
        self.holders > 0 || self.users > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn object_dies_with_last_holder() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = Holder::new(DropCounter(drops.clone()));
        let second = first.clone();
        let third = second.clone();
        assert_eq!(first.counter().holders, 3);

        drop(first);
        drop(third);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(second);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut holder = Holder::new(DropCounter(drops.clone()));
        holder.release();
        holder.release();
        assert!(holder.is_invalid());
        drop(holder);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn users_expire_but_counter_survives() {
        let holder = Holder::new(5u32);
        let user = holder.user();
        assert_eq!(
            user.counter(),
            ReferenceCounter {
                holders: 1,
                users: 1
            }
        );

        let locked = user.lock();
        assert!(locked.same_counter(&user));
        assert_eq!(*locked, 5);
        drop(locked);
        drop(holder);

        assert!(user.is_expired());
        assert!(user.lock().is_invalid());
        let counter = user.counter();
        assert!(!counter.is_object_valid());
        assert!(counter.is_counter_valid());
    }

    #[test]
    fn null_handles_are_harmless() {
        let holder: Holder<u32> = Holder::null();
        let user: User<u32> = User::null();
        assert!(holder.is_invalid());
        assert!(holder.try_get().is_none());
        assert!(holder.user().is_invalid());
        assert!(user.lock().is_invalid());
        assert_eq!(user.counter(), ReferenceCounter::default());
        assert!(!user.counter().is_counter_valid());
    }

    #[test]
    #[should_panic]
    fn deref_of_null_holder_panics() {
        let holder: Holder<u32> = Holder::default();
        let _value: u32 = *holder;
    }
}
