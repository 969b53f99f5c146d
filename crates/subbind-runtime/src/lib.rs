#![forbid(unsafe_code)]

//! Runtime: render/commit host and the observable subscription binder.
//!
//! # Role in subbind
//! `subbind-runtime` connects push-based sources from `subbind-core` to a
//! pull-based, re-rendering component model. A component declares *which*
//! source it wants during render; the runtime keeps exactly one subscription
//! to that source alive, swapping it only when the committed source changes.
//!
//! # Primary responsibilities
//! - **Binder**: the per-instance subscription state machine (latest
//!   callbacks, bind epoch, pending error).
//! - **Root / RenderCx**: render passes, commit phase, hook slots, error
//!   boundary, unmount.
//! - **Scheduler**: task queue and forced re-render flag.
//! - **Config / logging**: environment-driven `HostConfig` and optional JSON
//!   log output (`tracing-json` feature).
//!
//! # Lifecycle
//!
//! ```text
//! render (0..n times) ──► commit ──► emissions ──► [unhandled error]
//!        ▲                                               │
//!        └──────────── forced re-render ◄────────────────┘
//! ```
//!
//! An unhandled stream error is parked by the binder and returned from the
//! next render, so it surfaces through the host's normal render-error path
//! even when the component has moved on to another source.

pub mod binder;
pub mod config;
pub mod error;
pub mod host;
#[cfg(feature = "tracing-json")]
pub mod logging;
pub mod scheduler;

pub use binder::{Binder, Callbacks, CompleteFn, ErrorFn, NextFn};
pub use config::HostConfig;
pub use error::{HostError, LoggingError};
pub use host::{Component, Effect, EffectPhase, HostStats, RenderCx, Root};
pub use scheduler::{RerenderHandle, TaskQueue};
