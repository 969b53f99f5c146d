#![forbid(unsafe_code)]

//! Render/commit host runtime.
//!
//! The host owns one component instance and drives it through two phases:
//!
//! 1. **Render**: [`Component::render`] runs with a [`RenderCx`]. It may run
//!    more than once per commit (strict mode renders twice) and must not
//!    commit side effects. Hooks allocated through the context live in
//!    call-order slots that persist across renders.
//! 2. **Commit**: after a successful render, every hook effect runs exactly
//!    once, layout effects first, then passive effects.
//!
//! Between commits, [`Root::flush`] turns the event loop: it services forced
//! re-render requests and runs queued tasks until both are idle.
//!
//! # Example
//!
//! ```ignore
//! use subbind_core::{SourceRef, Subject};
//! use subbind_runtime::{Callbacks, Component, RenderCx, Root};
//!
//! struct Ticker {
//!     source: SourceRef<u32, String>,
//! }
//!
//! impl Component for Ticker {
//!     type Output = ();
//!     type Error = String;
//!
//!     fn render(&self, cx: &mut RenderCx<'_>) -> Result<(), String> {
//!         cx.use_subscription(&self.source, Callbacks::none().on_next(|n| println!("{n}")))?;
//!         Ok(())
//!     }
//! }
//!
//! let ticks = Subject::new();
//! let mut root = Root::new(Ticker { source: ticks.source() });
//! root.render()?;
//! ticks.next(1);
//! ```
//!
//! # Failure Modes
//!
//! - **Render error**: nothing is committed; the previous commit's effects
//!   stay active. With an error boundary installed ([`Root::on_error`]) the
//!   error is handed to it and kept in [`Root::last_error`]; otherwise it is
//!   returned as [`HostError::Render`].
//! - **Runaway re-render**: `flush()` stops with [`HostError::RerenderLimit`].

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use subbind_core::{SourceRef, Subscription};
use tracing::{debug, debug_span, trace};

use crate::binder::{Binder, Callbacks};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::scheduler::{RerenderHandle, TaskQueue};

/// A renderable unit driven by a [`Root`].
pub trait Component {
    /// What a successful render produces.
    type Output;
    /// What a failed render reports.
    type Error;

    /// Produce output for the current props.
    ///
    /// May run several times per commit; only hooks obtained from `cx` may
    /// schedule side effects, and they do so for the commit phase.
    fn render(&self, cx: &mut RenderCx<'_>) -> Result<Self::Output, Self::Error>;
}

/// Commit-phase side effect owned by a hook slot.
pub trait Effect {
    /// Run after a successful render.
    fn commit(&self);
    /// Run once when the component is permanently removed.
    fn teardown(&self);
}

impl<T: 'static, E: Clone + 'static> Effect for Binder<T, E> {
    fn commit(&self) {
        Binder::commit(self);
    }

    fn teardown(&self) {
        Binder::teardown(self);
    }
}

/// When a hook's effect commits relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    /// Committed first.
    Layout,
    /// Committed after every layout effect.
    Passive,
}

struct HookSlot {
    value: Rc<dyn Any>,
    effect: Rc<dyn Effect>,
    phase: EffectPhase,
}

/// Hook context handed to [`Component::render`].
pub struct RenderCx<'a> {
    slots: &'a mut Vec<HookSlot>,
    cursor: usize,
    rerender: &'a RerenderHandle,
    tasks: &'a TaskQueue,
}

impl<'a> RenderCx<'a> {
    fn new(
        slots: &'a mut Vec<HookSlot>,
        rerender: &'a RerenderHandle,
        tasks: &'a TaskQueue,
    ) -> Self {
        Self {
            slots,
            cursor: 0,
            rerender,
            tasks,
        }
    }

    /// Keep one subscription to `source` alive while this component is
    /// mounted, committed as a passive effect.
    ///
    /// Returns the active subscription (`None` until the first commit).
    ///
    /// # Errors
    ///
    /// Returns the exact stream error when `source` failed earlier with no
    /// error callback bound.
    ///
    /// # Panics
    ///
    /// Panics if the hook at this call position was a different hook (or
    /// had different type parameters) on a previous render.
    pub fn use_subscription<T: 'static, E: Clone + 'static>(
        &mut self,
        source: &SourceRef<T, E>,
        callbacks: Callbacks<T, E>,
    ) -> Result<Option<Subscription>, E> {
        self.binder::<T, E>(EffectPhase::Passive).render(source, callbacks)
    }

    /// Like [`use_subscription`](Self::use_subscription), but committed in
    /// the layout phase, before any passive effect.
    ///
    /// # Errors
    ///
    /// See [`use_subscription`](Self::use_subscription).
    ///
    /// # Panics
    ///
    /// See [`use_subscription`](Self::use_subscription).
    pub fn use_layout_subscription<T: 'static, E: Clone + 'static>(
        &mut self,
        source: &SourceRef<T, E>,
        callbacks: Callbacks<T, E>,
    ) -> Result<Option<Subscription>, E> {
        self.binder::<T, E>(EffectPhase::Layout).render(source, callbacks)
    }

    /// Ask the host for another render after this one.
    pub fn request_rerender(&self) {
        self.rerender.request();
    }

    /// The host's task queue.
    #[must_use]
    pub fn tasks(&self) -> &TaskQueue {
        self.tasks
    }

    fn binder<T: 'static, E: Clone + 'static>(
        &mut self,
        phase: EffectPhase,
    ) -> Rc<Binder<T, E>> {
        let index = self.cursor;
        self.cursor += 1;
        if let Some(slot) = self.slots.get(index) {
            assert_eq!(slot.phase, phase, "hook {index} changed phase between renders");
            return match Rc::clone(&slot.value).downcast::<Binder<T, E>>() {
                Ok(binder) => binder,
                Err(_) => panic!("hook {index} changed type between renders"),
            };
        }
        let binder = Rc::new(Binder::<T, E>::new(self.rerender.clone()));
        self.slots.push(HookSlot {
            value: Rc::clone(&binder) as Rc<dyn Any>,
            effect: Rc::clone(&binder) as Rc<dyn Effect>,
            phase,
        });
        binder
    }

    fn finish(self) {
        assert!(
            self.cursor == self.slots.len(),
            "render used {} hooks but an earlier render used {}",
            self.cursor,
            self.slots.len()
        );
    }
}

/// Counters maintained by a [`Root`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Render passes attempted (strict mode counts two per update).
    pub renders: u64,
    /// Commits performed.
    pub commits: u64,
    /// Render attempts that returned an error.
    pub failed_renders: u64,
    /// Tasks run by `flush()`.
    pub tasks_run: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Mounted,
    Unmounted,
}

type Boundary<E> = Box<dyn FnMut(&E)>;

/// Owner of one mounted component instance.
pub struct Root<C: Component> {
    component: C,
    slots: Vec<HookSlot>,
    config: HostConfig,
    rerender: RerenderHandle,
    tasks: TaskQueue,
    lifecycle: Lifecycle,
    output: Option<C::Output>,
    last_error: Option<C::Error>,
    boundary: Option<Boundary<C::Error>>,
    stats: HostStats,
}

impl<C: Component> fmt::Debug for Root<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("lifecycle", &self.lifecycle)
            .field("hooks", &self.slots.len())
            .field("stats", &self.stats)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Component> Root<C> {
    /// Create a root with the default configuration. Nothing renders until
    /// [`render`](Self::render) or [`flush`](Self::flush).
    #[must_use]
    pub fn new(component: C) -> Self {
        Self::with_config(component, HostConfig::default())
    }

    /// Create a root with an explicit configuration.
    #[must_use]
    pub fn with_config(component: C, config: HostConfig) -> Self {
        Self {
            component,
            slots: Vec::new(),
            config,
            rerender: RerenderHandle::new(),
            tasks: TaskQueue::new(),
            lifecycle: Lifecycle::Created,
            output: None,
            last_error: None,
            boundary: None,
            stats: HostStats::default(),
        }
    }

    /// Install an error boundary. Render failures are passed to `boundary`
    /// and recorded in [`last_error`](Self::last_error) instead of being
    /// returned.
    #[must_use]
    pub fn on_error(mut self, boundary: impl FnMut(&C::Error) + 'static) -> Self {
        self.boundary = Some(Box::new(boundary));
        self
    }

    /// Render and, on success, commit.
    ///
    /// # Errors
    ///
    /// - [`HostError::NotMounted`] after [`unmount`](Self::unmount).
    /// - [`HostError::Render`] when the render fails and no boundary is
    ///   installed.
    pub fn render(&mut self) -> Result<(), HostError<C::Error>> {
        if self.lifecycle == Lifecycle::Unmounted {
            return Err(HostError::NotMounted);
        }
        // This render satisfies every request made so far.
        self.rerender.take();
        match self.render_passes() {
            Ok(output) => {
                self.commit();
                self.output = Some(output);
                self.last_error = None;
                Ok(())
            }
            Err(error) => self.recover(error),
        }
    }

    /// Mutate the component's props and schedule a re-render.
    pub fn update(&mut self, f: impl FnOnce(&mut C)) {
        f(&mut self.component);
        self.rerender.request();
    }

    /// Service re-render requests and queued tasks until both are idle.
    ///
    /// Re-renders take priority over tasks. After unmount, tasks still run
    /// but re-render requests are discarded.
    ///
    /// # Errors
    ///
    /// - [`HostError::Render`] when a render fails and no boundary is
    ///   installed.
    /// - [`HostError::RerenderLimit`] / [`HostError::TaskLimit`] when the
    ///   configured bounds are exceeded.
    pub fn flush(&mut self) -> Result<(), HostError<C::Error>> {
        let mut rerenders = 0usize;
        let mut tasks = 0usize;
        loop {
            if self.rerender.is_requested() {
                if self.lifecycle == Lifecycle::Unmounted {
                    self.rerender.take();
                    continue;
                }
                rerenders += 1;
                if rerenders > self.config.max_rerenders_per_flush {
                    return Err(HostError::RerenderLimit {
                        limit: self.config.max_rerenders_per_flush,
                    });
                }
                self.render()?;
                continue;
            }
            if !self.tasks.is_empty() {
                tasks += 1;
                if tasks > self.config.max_tasks_per_flush {
                    return Err(HostError::TaskLimit {
                        limit: self.config.max_tasks_per_flush,
                    });
                }
                self.tasks.run_next();
                self.stats.tasks_run += 1;
                continue;
            }
            return Ok(());
        }
    }

    /// Permanently remove the component, tearing down every effect once.
    /// Idempotent.
    pub fn unmount(&mut self) {
        if self.lifecycle == Lifecycle::Unmounted {
            return;
        }
        self.lifecycle = Lifecycle::Unmounted;
        for slot in &self.slots {
            slot.effect.teardown();
        }
        self.output = None;
        debug!(target: "subbind::host", hooks = self.slots.len(), "unmounted");
    }

    /// The component instance.
    #[must_use]
    pub fn component(&self) -> &C {
        &self.component
    }

    /// Output of the last committed render.
    #[must_use]
    pub fn output(&self) -> Option<&C::Output> {
        self.output.as_ref()
    }

    /// The error most recently handed to the boundary; cleared by the next
    /// successful render.
    #[must_use]
    pub fn last_error(&self) -> Option<&C::Error> {
        self.last_error.as_ref()
    }

    /// True between the first commit and unmount.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.stats
    }

    /// The root's configuration.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Handle to the root's task queue, for scheduling emissions.
    #[must_use]
    pub fn tasks(&self) -> TaskQueue {
        self.tasks.clone()
    }

    /// Handle that forces a re-render on the next `flush()`.
    #[must_use]
    pub fn rerender_handle(&self) -> RerenderHandle {
        self.rerender.clone()
    }

    fn render_passes(&mut self) -> Result<C::Output, C::Error> {
        let passes = self.config.render_passes();
        let mut output = self.render_pass(0)?;
        for pass in 1..passes {
            output = self.render_pass(pass)?;
        }
        Ok(output)
    }

    fn render_pass(&mut self, pass: usize) -> Result<C::Output, C::Error> {
        let _span = debug_span!(target: "subbind::host", "render", pass).entered();
        self.stats.renders += 1;
        let mut cx = RenderCx::new(&mut self.slots, &self.rerender, &self.tasks);
        let result = self.component.render(&mut cx);
        if result.is_ok() {
            cx.finish();
        }
        if result.is_err() {
            self.stats.failed_renders += 1;
        }
        result
    }

    fn commit(&mut self) {
        for phase in [EffectPhase::Layout, EffectPhase::Passive] {
            for slot in self.slots.iter().filter(|slot| slot.phase == phase) {
                slot.effect.commit();
            }
        }
        self.lifecycle = Lifecycle::Mounted;
        self.stats.commits += 1;
        trace!(target: "subbind::host", commits = self.stats.commits, "committed");
    }

    fn recover(&mut self, error: C::Error) -> Result<(), HostError<C::Error>> {
        debug!(target: "subbind::host", "render failed");
        match self.boundary.as_mut() {
            Some(boundary) => {
                boundary(&error);
                self.last_error = Some(error);
                Ok(())
            }
            None => Err(HostError::Render(error)),
        }
    }
}

impl<C: Component> Drop for Root<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
