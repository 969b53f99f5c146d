#![forbid(unsafe_code)]

//! Subscribe contract and identity-compared source references.
//!
//! # Identity
//!
//! Sources are compared by **identity**, never by value: two references name
//! the same source exactly when their [`SourceId`]s are equal. By default the
//! identity is the address of the source value; shared-state sources such as
//! [`Subject`](crate::Subject) override [`Source::identity`] so that every
//! clone reports the address of the shared state instead.
//!
//! A [`SourceRef`] keeps its source alive, so an identity held through a
//! `SourceRef` cannot be recycled by a later allocation.

use std::fmt;
use std::rc::Rc;

use crate::observer::Observer;
use crate::subscription::Subscription;

/// Opaque identity of a source. Only meaningful while the source is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

impl SourceId {
    /// Identity derived from the address of `value`.
    #[must_use]
    pub fn of<S: ?Sized>(value: &S) -> Self {
        Self((value as *const S).cast::<()>() as usize)
    }

    /// Identity derived from the allocation behind `rc`.
    #[must_use]
    pub fn of_rc<S: ?Sized>(rc: &Rc<S>) -> Self {
        Self(Rc::as_ptr(rc).cast::<()>() as usize)
    }
}

/// A push-based source of `T` values that may fail with `E`.
pub trait Source<T, E> {
    /// Attach `observer` and return the handle that detaches it.
    ///
    /// Implementations may deliver signals synchronously from inside this
    /// call. After the returned subscription is released no signal may reach
    /// `observer`.
    fn subscribe(&self, observer: Rc<dyn Observer<T, E>>) -> Subscription;

    /// Identity used to decide whether two references name the same source.
    fn identity(&self) -> SourceId {
        SourceId::of(self)
    }
}

/// Shared, identity-compared reference to a [`Source`].
pub struct SourceRef<T, E> {
    inner: Rc<dyn Source<T, E>>,
}

impl<T, E> Clone for SourceRef<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> SourceRef<T, E> {
    /// Wrap an owned source.
    #[must_use]
    pub fn new<S: Source<T, E> + 'static>(source: S) -> Self {
        Self {
            inner: Rc::new(source),
        }
    }

    /// Wrap an already shared source.
    #[must_use]
    pub fn from_rc(source: Rc<dyn Source<T, E>>) -> Self {
        Self { inner: source }
    }

    /// Identity of the referenced source.
    #[must_use]
    pub fn id(&self) -> SourceId {
        self.inner.identity()
    }

    /// True when both references name the same source.
    #[must_use]
    pub fn same_source(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Subscribe `observer` to the referenced source.
    pub fn subscribe(&self, observer: Rc<dyn Observer<T, E>>) -> Subscription {
        self.inner.subscribe(observer)
    }
}

impl<T, E> fmt::Debug for SourceRef<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceRef").field(&self.id()).finish()
    }
}
