//! The Context Registry (spec §4.5): a thread-local slot holding "the
//! supervisor context for this worker thread", published by the worker
//! during bootstrap and read by callbacks (log handlers, the screenshot
//! routine) invoked without an explicit context parameter.
//!
//! Grounded on the teacher's global log-buffer pattern
//! (`desktop/src/debug/tui/mod.rs`'s `lazy_static! static ref LOG_MESSAGES`)
//! but deliberately *not* a process-wide global: spec.md §9 is explicit that
//! a single process may host multiple supervisors, one per worker thread, so
//! this is `thread_local!`, not `lazy_static!`.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use crate::context::SupervisorContext;

thread_local! {
    static CURRENT: RefCell<Option<Weak<SupervisorContext>>> = RefCell::new(None);
}

/// Called by the worker on entry (spec §4.3 phase 1: "Bind thread-local
/// context").
pub(crate) fn publish(context: &Arc<SupervisorContext>) {
    CURRENT.with(|cell| {
        *cell.borrow_mut() = Some(Arc::downgrade(context));
    });
}

/// Called by the worker on exit. The registry must not retain ownership of
/// the context after the worker exits (spec §4.5); clearing explicitly here
/// makes that immediate rather than relying only on thread teardown.
pub(crate) fn clear() {
    CURRENT.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Returns the context bound to the calling thread, if any. Non-worker
/// threads (and a worker thread whose context has since been dropped) see
/// `None`.
pub fn current() -> Option<Arc<SupervisorContext>> {
    CURRENT.with(|cell| cell.borrow().as_ref().and_then(Weak::upgrade))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use std::thread;

    #[test]
    fn non_worker_thread_sees_no_context() {
        assert!(current().is_none());
    }

    #[test]
    fn publish_is_visible_only_on_the_publishing_thread() {
        let ctx = SupervisorContext::new(BootConfig::default());
        let published = ctx.clone();

        let handle = thread::spawn(move || {
            assert!(current().is_none());
            publish(&published);
            assert!(current().is_some());
        });
        handle.join().unwrap();

        // The spawning thread never published anything itself.
        assert!(current().is_none());
    }

    #[test]
    fn clear_removes_the_binding() {
        let ctx = SupervisorContext::new(BootConfig::default());
        publish(&ctx);
        assert!(current().is_some());
        clear();
        assert!(current().is_none());
    }
}
