//! Deferred teardown of GPU objects.
//!
//! Every initialization step that creates a GPU object pushes one teardown
//! action here. At shutdown, after the GPU is idle, [`DeletionQueue::flush`]
//! runs the actions newest-first, so an object is always released before the
//! objects it was built from (an image view before its image, a buffer before
//! the allocator, the allocator before the device).
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use vkengine_core::DeletionQueue;
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let mut queue = DeletionQueue::new();
//! for name in ["allocator", "buffer"] {
//!     let log = log.clone();
//!     queue.push(name, move || log.borrow_mut().push(name));
//! }
//! queue.flush();
//! assert_eq!(*log.borrow(), ["buffer", "allocator"]);
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error, warn};

struct Entry {
    label: &'static str,
    action: Box<dyn FnOnce()>,
}

/// LIFO list of run-once teardown actions.
#[derive(Default)]
pub struct DeletionQueue {
    entries: Vec<Entry>,
}

impl DeletionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a teardown action. `label` names the released object in logs.
    pub fn push<F>(&mut self, label: &'static str, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.entries.push(Entry {
            label,
            action: Box::new(action),
        });
    }

    /// Runs every pending action in reverse insertion order, then leaves the
    /// queue empty.
    ///
    /// A panicking action is logged and skipped; the remaining actions still
    /// run. Calling `flush` on an empty queue does nothing.
    pub fn flush(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        debug!("Flushing deletion queue ({} entries)", self.entries.len());

        while let Some(Entry { label, action }) = self.entries.pop() {
            debug!("Releasing {}", label);
            if catch_unwind(AssertUnwindSafe(action)).is_err() {
                error!("Teardown of {} panicked, continuing", label);
            }
        }
    }

    /// Number of pending actions.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no actions are pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                "Deletion queue dropped with {} pending entries, flushing",
                self.entries.len()
            );
            self.flush();
        }
    }
}

impl std::fmt::Debug for DeletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionQueue")
            .field(
                "entries",
                &self.entries.iter().map(|e| e.label).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = log.clone();
        let make = move |id: u32| -> Box<dyn FnOnce()> {
            let log = handle.clone();
            Box::new(move || log.borrow_mut().push(id))
        };
        (log, make)
    }

    #[test]
    fn test_flush_runs_in_reverse_order() {
        let (log, make) = recorder();
        let mut queue = DeletionQueue::new();
        for id in 1..=5 {
            queue.push("obj", make(id));
        }
        assert_eq!(queue.len(), 5);

        queue.flush();

        assert_eq!(*log.borrow(), vec![5, 4, 3, 2, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_second_flush_is_noop() {
        let (log, make) = recorder();
        let mut queue = DeletionQueue::new();
        queue.push("obj", make(1));
        queue.flush();
        queue.flush();
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn test_push_after_flush_behaves_like_fresh_queue() {
        let (log, make) = recorder();
        let mut queue = DeletionQueue::new();
        queue.push("obj", make(1));
        queue.flush();

        queue.push("obj", make(2));
        queue.push("obj", make(3));
        queue.flush();

        assert_eq!(*log.borrow(), vec![1, 3, 2]);
    }

    #[test]
    fn test_panicking_action_does_not_stop_flush() {
        let (log, make) = recorder();
        let mut queue = DeletionQueue::new();
        queue.push("first", make(1));
        queue.push("broken", || panic!("destroy failed"));
        queue.push("last", make(3));

        queue.flush();

        assert_eq!(*log.borrow(), vec![3, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_flushes_pending_entries() {
        let (log, make) = recorder();
        {
            let mut queue = DeletionQueue::new();
            queue.push("a", make(1));
            queue.push("b", make(2));
        }
        assert_eq!(*log.borrow(), vec![2, 1]);
    }
}
