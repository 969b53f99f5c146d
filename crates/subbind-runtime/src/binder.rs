#![forbid(unsafe_code)]

//! Subscription binder: one live subscription per component instance,
//! synchronized with the host's render/commit lifecycle.
//!
//! # Design
//!
//! A [`Binder`] splits its work across the two host phases:
//!
//! - **Render** ([`Binder::render`]) may run any number of times and never
//!   touches the subscription. It escalates a pending stream error, then
//!   overwrites the *latest args* cell (source + callbacks).
//! - **Commit** ([`Binder::commit`]) runs once per accepted render. If the
//!   committed source differs (by identity) from the bound one, it clears the
//!   pending error, releases the old subscription, bumps the bind epoch, and
//!   subscribes to the new source.
//!
//! Handlers installed on the source hold a `Weak` reference to the binder
//! state plus the epoch they were created for. An emission is dropped unless
//! its epoch is still current, and the callback is looked up from the latest
//! args at dispatch time, never captured at subscribe time.
//!
//! ```text
//! render(A, cb1) ─ render(A, cb2) ─ commit ──► subscribe(A) [epoch 1]
//!                                              A.next(1) → cb2(1)
//! render(B, cb2) ─ commit ──────────────────► unsubscribe(A), subscribe(B) [epoch 2]
//!                                              A.next(2) → dropped (epoch 1)
//! ```
//!
//! # Invariants
//!
//! 1. At most one subscription is open per binder.
//! 2. The old subscription is released before the new one is created.
//! 3. Only handlers of the current epoch dispatch; teardown retires every
//!    epoch.
//! 4. Changing only callbacks never resubscribes.
//! 5. A pending error survives renders until a different source is bound.
//! 6. The first render after an error is parked fails, whichever source it
//!    names. Later renders fail only while they name the errored source.
//!
//! # Failure Modes
//!
//! - **Unhandled stream error**: with no error callback at dispatch time the
//!   error is parked and a re-render is requested; the next render returns
//!   it as `Err`, and so does every render of the same source after that.
//! - **Panicking error callback**: the panic unwinds out of the emitting
//!   call. The pending error was already cleared, so nothing is escalated.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use subbind_core::{Observer, SourceRef, Subscription, SubscriptionGuard};
use tracing::{debug, trace};

use crate::scheduler::RerenderHandle;

/// Value callback.
pub type NextFn<T> = Rc<dyn Fn(T)>;
/// Error callback.
pub type ErrorFn<E> = Rc<dyn Fn(E)>;
/// Completion callback.
pub type CompleteFn = Rc<dyn Fn()>;

/// The three optional callbacks, in fixed positional order.
///
/// `None` is the placeholder for a skipped position:
///
/// ```ignore
/// Callbacks::new(None, Some(Rc::new(|e| report(e))), None)
/// ```
pub struct Callbacks<T, E> {
    /// Called with each value.
    pub next: Option<NextFn<T>>,
    /// Called with a stream error. Without it the error escalates.
    pub error: Option<ErrorFn<E>>,
    /// Called once when the stream completes.
    pub complete: Option<CompleteFn>,
}

impl<T, E> Clone for Callbacks<T, E> {
    fn clone(&self) -> Self {
        Self {
            next: self.next.clone(),
            error: self.error.clone(),
            complete: self.complete.clone(),
        }
    }
}

impl<T, E> Default for Callbacks<T, E> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T, E> fmt::Debug for Callbacks<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

impl<T, E> Callbacks<T, E> {
    /// Positional constructor: next, then error, then complete.
    #[must_use]
    pub fn new(
        next: Option<NextFn<T>>,
        error: Option<ErrorFn<E>>,
        complete: Option<CompleteFn>,
    ) -> Self {
        Self {
            next,
            error,
            complete,
        }
    }

    /// No callbacks at all.
    #[must_use]
    pub fn none() -> Self {
        Self::new(None, None, None)
    }

    /// Set the value callback.
    #[must_use]
    pub fn on_next(mut self, f: impl Fn(T) + 'static) -> Self {
        self.next = Some(Rc::new(f));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(E) + 'static) -> Self {
        self.error = Some(Rc::new(f));
        self
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_complete(mut self, f: impl Fn() + 'static) -> Self {
        self.complete = Some(Rc::new(f));
        self
    }
}

impl<T: 'static, E: 'static> Callbacks<T, E> {
    /// Route all three positions to one observer object.
    #[must_use]
    pub fn from_observer(observer: Rc<dyn Observer<T, E>>) -> Self {
        let on_next = Rc::clone(&observer);
        let on_error = Rc::clone(&observer);
        Self::none()
            .on_next(move |value| on_next.next(value))
            .on_error(move |error| on_error.error(error))
            .on_complete(move || observer.complete())
    }
}

/// Most recently rendered call.
struct LatestArgs<T, E> {
    source: SourceRef<T, E>,
    callbacks: Callbacks<T, E>,
}

/// State shared between a binder and the handlers it installs.
struct BinderState<T, E> {
    latest: RefCell<Option<LatestArgs<T, E>>>,
    bound: RefCell<Option<SourceRef<T, E>>>,
    epoch: Cell<u64>,
    pending_error: RefCell<Option<E>>,
    /// Set once a render has returned the pending error.
    error_surfaced: Cell<bool>,
    torn_down: Cell<bool>,
    rerender: RerenderHandle,
}

impl<T, E> BinderState<T, E> {
    fn is_current(&self, epoch: u64) -> bool {
        !self.torn_down.get() && self.epoch.get() == epoch
    }

    fn callback<C>(&self, pick: impl FnOnce(&Callbacks<T, E>) -> Option<C>) -> Option<C> {
        self.latest
            .borrow()
            .as_ref()
            .and_then(|args| pick(&args.callbacks))
    }
}

/// Binds one component instance to the observable it currently renders.
pub struct Binder<T, E> {
    state: Rc<BinderState<T, E>>,
    active: RefCell<Option<SubscriptionGuard>>,
    subscribes: Cell<u64>,
}

impl<T, E> fmt::Debug for Binder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("epoch", &self.state.epoch.get())
            .field("subscribed", &self.active.borrow().is_some())
            .field("pending_error", &self.state.pending_error.borrow().is_some())
            .field("torn_down", &self.state.torn_down.get())
            .finish()
    }
}

impl<T: 'static, E: Clone + 'static> Binder<T, E> {
    /// Create an unbound binder that asks `rerender` for forced renders.
    #[must_use]
    pub fn new(rerender: RerenderHandle) -> Self {
        Self {
            state: Rc::new(BinderState {
                latest: RefCell::new(None),
                bound: RefCell::new(None),
                epoch: Cell::new(0),
                pending_error: RefCell::new(None),
                error_surfaced: Cell::new(false),
                torn_down: Cell::new(false),
                rerender,
            }),
            active: RefCell::new(None),
            subscribes: Cell::new(0),
        }
    }

    /// Render phase.
    ///
    /// Returns the active subscription (`None` before the first commit).
    ///
    /// # Errors
    ///
    /// Returns the parked stream error on the first render after it was
    /// parked, whatever the rendered source. After that, only renders of the
    /// errored source fail, so a render naming a different source can commit
    /// and retire it.
    pub fn render(
        &self,
        source: &SourceRef<T, E>,
        callbacks: Callbacks<T, E>,
    ) -> Result<Option<Subscription>, E> {
        if let Some(error) = self.escalation_for(source) {
            trace!(target: "subbind::binder", source = ?source.id(), "escalating pending error");
            return Err(error);
        }
        *self.state.latest.borrow_mut() = Some(LatestArgs {
            source: source.clone(),
            callbacks,
        });
        Ok(self.subscription())
    }

    /// Commit phase.
    ///
    /// Resubscribes when the last rendered source is not the bound one;
    /// otherwise does nothing. No-op before the first render and after
    /// teardown.
    pub fn commit(&self) {
        if self.state.torn_down.get() {
            trace!(target: "subbind::binder", "commit after teardown ignored");
            return;
        }
        let Some(source) = self
            .state
            .latest
            .borrow()
            .as_ref()
            .map(|args| args.source.clone())
        else {
            return;
        };
        let unchanged = self.active.borrow().is_some()
            && self
                .state
                .bound
                .borrow()
                .as_ref()
                .is_some_and(|bound| bound.same_source(&source));
        if unchanged {
            return;
        }

        self.state.pending_error.borrow_mut().take();
        self.state.error_surfaced.set(false);

        let previous = self.active.borrow_mut().take();
        if let Some(previous) = previous {
            previous.into_inner().unsubscribe();
        }

        let epoch = self.state.epoch.get() + 1;
        self.state.epoch.set(epoch);
        *self.state.bound.borrow_mut() = Some(source.clone());

        let observer: Rc<dyn Observer<T, E>> = Rc::new(BoundObserver {
            state: Rc::downgrade(&self.state),
            epoch,
        });
        let subscription = source.subscribe(observer);
        self.subscribes.set(self.subscribes.get() + 1);
        debug!(
            target: "subbind::binder",
            source = ?source.id(),
            epoch,
            closed = subscription.is_closed(),
            "bound source"
        );
        *self.active.borrow_mut() = Some(subscription.guard());
    }

    /// Permanent removal. Releases the subscription; idempotent.
    pub fn teardown(&self) {
        if self.state.torn_down.replace(true) {
            return;
        }
        let previous = self.active.borrow_mut().take();
        if let Some(previous) = previous {
            previous.into_inner().unsubscribe();
        }
        debug!(target: "subbind::binder", epoch = self.state.epoch.get(), "torn down");
    }

    /// Handle to the active subscription, if any.
    #[must_use]
    pub fn subscription(&self) -> Option<Subscription> {
        self.active
            .borrow()
            .as_ref()
            .map(|guard| guard.subscription().clone())
    }

    /// The parked stream error, if any.
    #[must_use]
    pub fn pending_error(&self) -> Option<E> {
        self.state.pending_error.borrow().clone()
    }

    /// The source the active subscription was opened against.
    #[must_use]
    pub fn bound_source(&self) -> Option<SourceRef<T, E>> {
        self.state.bound.borrow().clone()
    }

    /// True after [`teardown`](Self::teardown).
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.state.torn_down.get()
    }

    /// Number of subscriptions opened over the binder's lifetime.
    #[must_use]
    pub fn subscribe_count(&self) -> u64 {
        self.subscribes.get()
    }

    fn escalation_for(&self, source: &SourceRef<T, E>) -> Option<E> {
        let pending = self.state.pending_error.borrow();
        let error = pending.as_ref()?;
        if !self.state.error_surfaced.replace(true) {
            return Some(error.clone());
        }
        let bound = self.state.bound.borrow();
        bound
            .as_ref()
            .filter(|bound| bound.same_source(source))
            .map(|_| error.clone())
    }
}

/// Handlers installed on a bound source.
struct BoundObserver<T, E> {
    state: Weak<BinderState<T, E>>,
    epoch: u64,
}

impl<T, E> BoundObserver<T, E> {
    fn current(&self) -> Option<Rc<BinderState<T, E>>> {
        let state = self.state.upgrade()?;
        if state.is_current(self.epoch) {
            Some(state)
        } else {
            trace!(target: "subbind::binder", epoch = self.epoch, "stale emission dropped");
            None
        }
    }
}

impl<T, E> Observer<T, E> for BoundObserver<T, E> {
    fn next(&self, value: T) {
        let Some(state) = self.current() else {
            return;
        };
        if let Some(on_next) = state.callback(|cbs| cbs.next.clone()) {
            on_next(value);
        }
    }

    fn error(&self, error: E) {
        let Some(state) = self.current() else {
            return;
        };
        match state.callback(|cbs| cbs.error.clone()) {
            Some(on_error) => {
                state.pending_error.borrow_mut().take();
                on_error(error);
            }
            None => {
                debug!(
                    target: "subbind::binder",
                    epoch = self.epoch,
                    "unhandled stream error parked"
                );
                *state.pending_error.borrow_mut() = Some(error);
                state.error_surfaced.set(false);
                state.rerender.request();
            }
        }
    }

    fn complete(&self) {
        let Some(state) = self.current() else {
            return;
        };
        if let Some(on_complete) = state.callback(|cbs| cbs.complete.clone()) {
            on_complete();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
