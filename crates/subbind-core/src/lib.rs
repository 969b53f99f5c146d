#![forbid(unsafe_code)]

//! Core: observable sources, observers, and cancellable subscriptions.
//!
//! # Role in subbind
//! `subbind-core` defines the push side of the system. A [`Source`] accepts an
//! [`Observer`] and hands back a [`Subscription`]; the runtime
//! (`subbind-runtime`) binds those subscriptions to a render/commit lifecycle.
//!
//! # Primary responsibilities
//! - **Subscription**: idempotent cancellation handle plus an RAII guard.
//! - **Source / SourceRef**: the subscribe contract and identity-compared
//!   references to live sources.
//! - **Subject**: a multicast push source that enforces the stream grammar
//!   (any number of values, then at most one error *or* completion).
//!
//! # Stream grammar
//!
//! 1. `next` may be delivered zero or more times.
//! 2. At most one of `error` / `complete` is delivered, and nothing follows it.
//! 3. No handler runs after the subscription that owns it was released.

pub mod observer;
pub mod source;
pub mod subject;
pub mod subscription;

pub use observer::{Notification, Observer};
pub use source::{Source, SourceId, SourceRef};
pub use subject::Subject;
pub use subscription::{Subscription, SubscriptionGuard};
