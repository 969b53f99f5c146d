#![forbid(unsafe_code)]

//! Cancellable subscription handles.
//!
//! # Design
//!
//! A [`Subscription`] is a cloneable handle to shared state
//! (`Rc<SubscriptionInner>`). Every clone refers to the **same** subscription:
//! releasing any one of them releases all of them.
//!
//! [`SubscriptionGuard`] is the RAII flavour: dropping the guard releases the
//! subscription, matching the drop-to-unsubscribe style of reactive bindings.
//!
//! # Invariants
//!
//! 1. The teardown closure runs at most once, on the first `unsubscribe()`.
//! 2. `unsubscribe()` on a released subscription is a no-op.
//! 3. `is_closed()` never goes back to `false` once it reported `true`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Teardown = Box<dyn FnOnce()>;

struct SubscriptionInner {
    closed: Cell<bool>,
    teardown: RefCell<Option<Teardown>>,
}

/// Handle to a live binding between a source and an observer.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    /// Create an open subscription that runs `teardown` when released.
    #[must_use]
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self::with_teardown(Some(Box::new(teardown)), false)
    }

    /// Create an open subscription with nothing to tear down.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_teardown(None, false)
    }

    /// Create a subscription that is already released.
    ///
    /// Returned by sources that finished during `subscribe()`.
    #[must_use]
    pub fn closed() -> Self {
        Self::with_teardown(None, true)
    }

    fn with_teardown(teardown: Option<Teardown>, closed: bool) -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                closed: Cell::new(closed),
                teardown: RefCell::new(teardown),
            }),
        }
    }

    /// True once the subscription has been released, either explicitly or
    /// because the source terminated.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Release the subscription.
    ///
    /// The first call runs the teardown; every later call (on this handle or
    /// any clone) does nothing.
    pub fn unsubscribe(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        // Take the closure out before running it so the teardown may touch
        // this handle again without a double borrow.
        let teardown = self.inner.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Mark the subscription closed without running its teardown.
    ///
    /// Used by sources that already dropped the observer themselves
    /// (terminal signal delivered).
    pub(crate) fn close_silently(&self) {
        self.inner.closed.set(true);
        drop(self.inner.teardown.borrow_mut().take());
    }

    /// True when both handles refer to the same subscription.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wrap this handle in a guard that releases it on drop.
    #[must_use]
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: self,
            armed: true,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// RAII guard for a [`Subscription`].
///
/// Dropping the guard calls [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Subscription,
    armed: bool,
}

impl SubscriptionGuard {
    /// Borrow the guarded handle.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Disarm the guard and return the handle; the subscription stays open.
    #[must_use]
    pub fn into_inner(mut self) -> Subscription {
        self.armed = false;
        self.subscription.clone()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.subscription.unsubscribe();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counting() -> (Subscription, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let sub = Subscription::new(move || count_clone.set(count_clone.get() + 1));
        (sub, count)
    }

    #[test]
    fn unsubscribe_runs_teardown_once() {
        let (sub, count) = counting();
        assert!(!sub.is_closed());

        sub.unsubscribe();
        assert!(sub.is_closed());
        assert_eq!(count.get(), 1);

        sub.unsubscribe();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn clones_share_state() {
        let (sub, count) = counting();
        let other = sub.clone();
        assert!(sub.same_as(&other));

        other.unsubscribe();
        assert!(sub.is_closed());
        sub.unsubscribe();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn closed_constructor_is_already_released() {
        let sub = Subscription::closed();
        assert!(sub.is_closed());
        sub.unsubscribe(); // No-op.
        assert!(!Subscription::empty().is_closed());
    }

    #[test]
    fn guard_drop_unsubscribes() {
        let (sub, count) = counting();
        let guard = sub.clone().guard();
        assert!(!sub.is_closed());

        drop(guard);
        assert!(sub.is_closed());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn into_inner_disarms_guard() {
        let (sub, count) = counting();
        let handle = sub.guard().into_inner();
        assert!(!handle.is_closed());
        assert_eq!(count.get(), 0);

        handle.unsubscribe();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn close_silently_skips_teardown() {
        let (sub, count) = counting();
        sub.close_silently();
        assert!(sub.is_closed());

        sub.unsubscribe();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn reentrant_unsubscribe_from_teardown() {
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot_clone = Rc::clone(&slot);
        let sub = Subscription::new(move || {
            if let Some(me) = slot_clone.borrow().as_ref() {
                me.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub.clone());

        sub.unsubscribe();
        assert!(sub.is_closed());
    }

    #[test]
    fn debug_format() {
        let dbg = format!("{:?}", Subscription::closed());
        assert!(dbg.contains("Subscription"));
        assert!(dbg.contains("closed: true"));
    }
}
