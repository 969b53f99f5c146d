#![forbid(unsafe_code)]

//! Observer contract and reified stream signals.

/// Receiver of the three stream signals.
///
/// Sources call these methods through an `Rc<dyn Observer<T, E>>` and never
/// while holding their own interior borrows, so implementations may
/// subscribe or unsubscribe re-entrantly.
pub trait Observer<T, E> {
    /// A value was produced.
    fn next(&self, value: T);

    /// The stream failed. No further signal follows.
    fn error(&self, error: E);

    /// The stream finished. No further signal follows.
    fn complete(&self);
}

/// A single stream signal as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T, E> {
    /// A value.
    Next(T),
    /// The stream failed.
    Error(E),
    /// The stream finished.
    Complete,
}

impl<T, E> Notification<T, E> {
    /// True for `Error` and `Complete`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    /// Hand this signal to `observer`.
    pub fn deliver_to(self, observer: &dyn Observer<T, E>) {
        match self {
            Self::Next(value) => observer.next(value),
            Self::Error(error) => observer.error(error),
            Self::Complete => observer.complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<Notification<i32, String>>>,
    }

    impl Observer<i32, String> for Recorder {
        fn next(&self, value: i32) {
            self.seen.borrow_mut().push(Notification::Next(value));
        }
        fn error(&self, error: String) {
            self.seen.borrow_mut().push(Notification::Error(error));
        }
        fn complete(&self) {
            self.seen.borrow_mut().push(Notification::Complete);
        }
    }

    #[test]
    fn terminal_classification() {
        assert!(!Notification::<i32, ()>::Next(1).is_terminal());
        assert!(Notification::<i32, ()>::Error(()).is_terminal());
        assert!(Notification::<i32, ()>::Complete.is_terminal());
    }

    #[test]
    fn deliver_routes_to_matching_method() {
        let rec = Recorder::default();
        Notification::Next(7).deliver_to(&rec);
        Notification::Error("boom".to_string()).deliver_to(&rec);
        Notification::Complete.deliver_to(&rec);

        assert_eq!(
            *rec.seen.borrow(),
            vec![
                Notification::Next(7),
                Notification::Error("boom".to_string()),
                Notification::Complete,
            ]
        );
    }
}
