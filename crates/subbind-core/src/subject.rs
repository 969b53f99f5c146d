#![forbid(unsafe_code)]

//! Multicast push source with terminal-signal tracking.
//!
//! # Design
//!
//! [`Subject<T, E>`] keeps its observers in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Emissions are delivered to every live observer in
//! registration order. Cloning a subject yields another handle to the same
//! state, and [`Source::identity`] reports that shared state, so clones are
//! the same source.
//!
//! # Invariants
//!
//! 1. Observers are notified in registration order.
//! 2. After `error` or `complete`, every later emission is a no-op and every
//!    subscription is closed.
//! 3. An observer whose subscription was released (even mid-emission, by an
//!    earlier observer) receives nothing further.
//! 4. Subscribing to a terminated subject replays the terminal signal
//!    synchronously and yields a closed subscription.
//!
//! # Failure Modes
//!
//! - **Re-entrant emission**: an observer may call `next` on the subject it is
//!   observing. The nested emission is delivered depth-first; the outer
//!   emission then resumes with its original snapshot.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::observer::{Notification, Observer};
use crate::source::{Source, SourceId, SourceRef};
use crate::subscription::Subscription;

type ObserverRc<T, E> = Rc<dyn Observer<T, E>>;

struct Entry<T, E> {
    id: u64,
    observer: ObserverRc<T, E>,
    subscription: Subscription,
}

enum Terminal<E> {
    Errored(E),
    Completed,
}

/// Shared interior for [`Subject<T, E>`].
struct SubjectInner<T, E> {
    entries: Vec<Entry<T, E>>,
    terminal: Option<Terminal<E>>,
    next_id: u64,
    emitted: u64,
}

/// A shared multicast source.
pub struct Subject<T, E> {
    inner: Rc<RefCell<SubjectInner<T, E>>>,
}

// Manual Clone: shares the same Rc.
impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Subject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subject")
            .field("observer_count", &inner.entries.len())
            .field("stopped", &inner.terminal.is_some())
            .field("emitted", &inner.emitted)
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Subject<T, E> {
    /// Create a subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SubjectInner {
                entries: Vec::new(),
                terminal: None,
                next_id: 0,
                emitted: 0,
            })),
        }
    }

    /// A [`SourceRef`] naming this subject.
    #[must_use]
    pub fn source(&self) -> SourceRef<T, E> {
        SourceRef::new(self.clone())
    }

    /// Deliver a value to every live observer.
    pub fn next(&self, value: T) {
        let targets = {
            let mut inner = self.inner.borrow_mut();
            if inner.terminal.is_some() {
                return;
            }
            inner.emitted += 1;
            Self::snapshot(&inner.entries)
        };
        for (observer, subscription) in targets {
            if subscription.is_closed() {
                continue;
            }
            observer.next(value.clone());
        }
    }

    /// Fail the stream and release every subscription.
    pub fn error(&self, error: E) {
        let Some(entries) = self.stop(Terminal::Errored(error.clone())) else {
            return;
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "subbind::subject", observers = entries.len(), "errored");
        for entry in entries {
            if entry.subscription.is_closed() {
                continue;
            }
            entry.subscription.close_silently();
            entry.observer.error(error.clone());
        }
    }

    /// Finish the stream and release every subscription.
    pub fn complete(&self) {
        let Some(entries) = self.stop(Terminal::Completed) else {
            return;
        };
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "subbind::subject", observers = entries.len(), "completed");
        for entry in entries {
            if entry.subscription.is_closed() {
                continue;
            }
            entry.subscription.close_silently();
            entry.observer.complete();
        }
    }

    /// Deliver a reified signal.
    pub fn emit(&self, notification: Notification<T, E>) {
        match notification {
            Notification::Next(value) => self.next(value),
            Notification::Error(error) => self.error(error),
            Notification::Complete => self.complete(),
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// True once `error` or `complete` was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.borrow().terminal.is_some()
    }

    /// Number of values emitted so far (delivered or not).
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.inner.borrow().emitted
    }

    /// Record the terminal signal and take every entry. `None` if already
    /// stopped.
    fn stop(&self, terminal: Terminal<E>) -> Option<Vec<Entry<T, E>>> {
        let mut inner = self.inner.borrow_mut();
        if inner.terminal.is_some() {
            return None;
        }
        inner.terminal = Some(terminal);
        Some(std::mem::take(&mut inner.entries))
    }

    fn snapshot(entries: &[Entry<T, E>]) -> Vec<(ObserverRc<T, E>, Subscription)> {
        entries
            .iter()
            .map(|e| (Rc::clone(&e.observer), e.subscription.clone()))
            .collect()
    }

    fn detach(inner: &Weak<RefCell<SubjectInner<T, E>>>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            inner.borrow_mut().entries.retain(|e| e.id != id);
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Source<T, E> for Subject<T, E> {
    fn subscribe(&self, observer: ObserverRc<T, E>) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let replay = match &inner.terminal {
            Some(Terminal::Errored(error)) => Some(Notification::Error(error.clone())),
            Some(Terminal::Completed) => Some(Notification::Complete),
            None => None,
        };
        if let Some(signal) = replay {
            drop(inner);
            signal.deliver_to(&*observer);
            return Subscription::closed();
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let weak = Rc::downgrade(&self.inner);
        let subscription = Subscription::new(move || Self::detach(&weak, id));
        inner.entries.push(Entry {
            id,
            observer,
            subscription: subscription.clone(),
        });
        subscription
    }

    fn identity(&self) -> SourceId {
        SourceId::of_rc(&self.inner)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> From<Subject<T, E>> for SourceRef<T, E> {
    fn from(subject: Subject<T, E>) -> Self {
        SourceRef::new(subject)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<Notification<i32, String>>>>;

    struct Recorder {
        log: Log,
    }

    impl Observer<i32, String> for Recorder {
        fn next(&self, value: i32) {
            self.log.borrow_mut().push(Notification::Next(value));
        }
        fn error(&self, error: String) {
            self.log.borrow_mut().push(Notification::Error(error));
        }
        fn complete(&self) {
            self.log.borrow_mut().push(Notification::Complete);
        }
    }

    fn recorder() -> (ObserverRc<i32, String>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let observer: ObserverRc<i32, String> = Rc::new(Recorder {
            log: Rc::clone(&log),
        });
        (observer, log)
    }

    #[test]
    fn next_reaches_subscriber() {
        let subject = Subject::<i32, String>::new();
        let (observer, log) = recorder();
        let _sub = subject.subscribe(observer);

        subject.next(1);
        subject.next(2);
        assert_eq!(
            *log.borrow(),
            vec![Notification::Next(1), Notification::Next(2)]
        );
        assert_eq!(subject.emitted(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subject = Subject::<i32, String>::new();
        let (observer, log) = recorder();
        let sub = subject.subscribe(observer);

        subject.next(1);
        sub.unsubscribe();
        subject.next(2);

        assert_eq!(*log.borrow(), vec![Notification::Next(1)]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let subject = Subject::<i32, String>::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Tag(char, Rc<RefCell<Vec<char>>>);
        impl Observer<i32, String> for Tag {
            fn next(&self, _value: i32) {
                self.1.borrow_mut().push(self.0);
            }
            fn error(&self, _error: String) {}
            fn complete(&self) {}
        }

        let _a = subject.subscribe(Rc::new(Tag('A', Rc::clone(&order))));
        let _b = subject.subscribe(Rc::new(Tag('B', Rc::clone(&order))));
        let _c = subject.subscribe(Rc::new(Tag('C', Rc::clone(&order))));

        subject.next(1);
        assert_eq!(*order.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn error_is_terminal() {
        let subject = Subject::<i32, String>::new();
        let (observer, log) = recorder();
        let sub = subject.subscribe(observer);

        subject.error("boom".to_string());
        subject.next(1);
        subject.complete();

        assert_eq!(*log.borrow(), vec![Notification::Error("boom".to_string())]);
        assert!(sub.is_closed());
        assert!(subject.is_stopped());
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn complete_is_terminal() {
        let subject = Subject::<i32, String>::new();
        let (observer, log) = recorder();
        let sub = subject.subscribe(observer);

        subject.complete();
        subject.error("late".to_string());

        assert_eq!(*log.borrow(), vec![Notification::Complete]);
        assert!(sub.is_closed());
    }

    #[test]
    fn late_subscriber_gets_terminal_replay() {
        let subject = Subject::<i32, String>::new();
        subject.error("gone".to_string());

        let (observer, log) = recorder();
        let sub = subject.subscribe(observer);

        assert!(sub.is_closed());
        assert_eq!(*log.borrow(), vec![Notification::Error("gone".to_string())]);
    }

    #[test]
    fn release_mid_emission_skips_later_observer() {
        let subject = Subject::<i32, String>::new();
        let victim_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        struct Killer(Rc<RefCell<Option<Subscription>>>);
        impl Observer<i32, String> for Killer {
            fn next(&self, _value: i32) {
                if let Some(sub) = self.0.borrow().as_ref() {
                    sub.unsubscribe();
                }
            }
            fn error(&self, _error: String) {}
            fn complete(&self) {}
        }

        let _killer = subject.subscribe(Rc::new(Killer(Rc::clone(&victim_slot))));
        let (observer, log) = recorder();
        let victim = subject.subscribe(observer);
        *victim_slot.borrow_mut() = Some(victim);

        subject.next(1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn clones_share_identity_and_observers() {
        let subject = Subject::<i32, String>::new();
        let other = subject.clone();
        assert!(subject.source().same_source(&other.source()));

        let count = Rc::new(Cell::new(0u32));
        struct Counter(Rc<Cell<u32>>);
        impl Observer<i32, String> for Counter {
            fn next(&self, _value: i32) {
                self.0.set(self.0.get() + 1);
            }
            fn error(&self, _error: String) {}
            fn complete(&self) {}
        }
        let _sub = subject.subscribe(Rc::new(Counter(Rc::clone(&count))));

        other.next(5);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn distinct_subjects_differ() {
        let a = Subject::<i32, String>::new();
        let b = Subject::<i32, String>::new();
        assert!(!a.source().same_source(&b.source()));
    }

    #[test]
    fn emit_routes_notifications() {
        let subject = Subject::<i32, String>::new();
        let (observer, log) = recorder();
        let _sub = subject.subscribe(observer);

        subject.emit(Notification::Next(3));
        subject.emit(Notification::Complete);
        assert_eq!(
            *log.borrow(),
            vec![Notification::Next(3), Notification::Complete]
        );
    }

    #[test]
    fn debug_format() {
        let subject = Subject::<i32, String>::new();
        let dbg = format!("{:?}", subject);
        assert!(dbg.contains("Subject"));
        assert!(dbg.contains("observer_count"));
    }
}
