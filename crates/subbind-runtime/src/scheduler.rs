#![forbid(unsafe_code)]

//! Single-threaded event loop primitives.
//!
//! [`TaskQueue`] is the host's FIFO of deferred work (typically stream
//! emissions scheduled for a later turn). [`RerenderHandle`] is the coalescing
//! "render me again" flag handed to hooks.
//!
//! Both are `Rc`-shared and `!Send`: one logical thread of control owns a
//! root and everything scheduled on it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// FIFO queue of deferred tasks.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run on a later turn.
    pub fn spawn(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().push_back(Box::new(task));
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Run the oldest task. Returns `false` if the queue was empty.
    ///
    /// The queue is not borrowed while the task runs, so tasks may spawn
    /// further tasks.
    pub fn run_next(&self) -> bool {
        let task = self.inner.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[derive(Default)]
struct RerenderState {
    requested: Cell<bool>,
    requests: Cell<u64>,
}

/// Coalescing request for a forced re-render.
///
/// Any number of `request()` calls before the host services the flag result
/// in one render.
#[derive(Clone, Default)]
pub struct RerenderHandle {
    state: Rc<RerenderState>,
}

impl RerenderHandle {
    /// Create a handle with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the host to render again.
    pub fn request(&self) {
        self.state.requested.set(true);
        self.state.requests.set(self.state.requests.get() + 1);
    }

    /// True while a request is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.state.requested.get()
    }

    /// Total `request()` calls over the handle's lifetime.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.state.requests.get()
    }

    /// Consume the pending request, returning whether there was one.
    pub(crate) fn take(&self) -> bool {
        self.state.requested.replace(false)
    }
}

impl fmt::Debug for RerenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerenderHandle")
            .field("requested", &self.is_requested())
            .field("requests", &self.request_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_fifo_order() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.spawn(move || log.borrow_mut().push(i));
        }
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
        assert!(!queue.run_next());
    }

    #[test]
    fn task_may_spawn_task() {
        let queue = TaskQueue::new();
        let hits = Rc::new(Cell::new(0u32));
        let inner_queue = queue.clone();
        let inner_hits = Rc::clone(&hits);
        queue.spawn(move || {
            let hits = Rc::clone(&inner_hits);
            inner_queue.spawn(move || hits.set(hits.get() + 1));
        });

        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn rerender_requests_coalesce() {
        let handle = RerenderHandle::new();
        assert!(!handle.is_requested());

        handle.request();
        handle.clone().request();
        assert!(handle.is_requested());
        assert_eq!(handle.request_count(), 2);

        assert!(handle.take());
        assert!(!handle.take());
        assert!(!handle.is_requested());
    }
}
