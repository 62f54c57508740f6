// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Timecode listener registry.
//!
//! Listeners are invoked once per committed tick, in registration order,
//! with the just-committed timecode and the channel's diagnostics graph.
//! The scheduled-command dispatcher of the surrounding control layer hangs
//! off this hook.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::diagnostics::Graph;
use crate::core::timecode::FrameTimecode;

pub type TimecodeListener = Arc<dyn Fn(FrameTimecode, &Arc<Graph>) + Send + Sync>;

#[derive(Default)]
struct ListenerMap {
    next_id: u64,
    listeners: BTreeMap<u64, TimecodeListener>,
}

/// Registry of per-tick timecode callbacks.
///
/// The lock is held only to snapshot or mutate the map, never across an
/// invocation, so listeners may freely register or cancel other listeners.
#[derive(Default)]
pub struct TimecodeListeners {
    map: Arc<Mutex<ListenerMap>>,
}

impl TimecodeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and return the token that keeps it registered.
    #[must_use = "dropping the token unregisters the listener"]
    pub fn add(
        &self,
        listener: impl Fn(FrameTimecode, &Arc<Graph>) + Send + Sync + 'static,
    ) -> ListenerToken {
        let mut map = self.map.lock();
        let id = map.next_id;
        map.next_id += 1;
        map.listeners.insert(id, Arc::new(listener));

        ListenerToken {
            id,
            map: Arc::downgrade(&self.map),
        }
    }

    /// Invoke every registered listener in ascending id order.
    ///
    /// Runs on a snapshot: listeners cancelled during invocation still see
    /// this tick, listeners added during it start with the next. A panicking
    /// listener is logged and never prevents the others.
    pub fn invoke(&self, timecode: FrameTimecode, graph: &Arc<Graph>) {
        let snapshot: Vec<(u64, TimecodeListener)> = {
            let map = self.map.lock();
            map.listeners
                .iter()
                .map(|(&id, listener)| (id, Arc::clone(listener)))
                .collect()
        };

        for (id, listener) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(timecode, graph))) {
                tracing::error!(
                    "Timecode listener {} panicked: {}",
                    id,
                    panic_message(&panic)
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().listeners.is_empty()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

/// Scoped cancellation for a registered listener; dropping it (or calling
/// [`cancel`](Self::cancel)) unregisters the listener. An in-flight
/// invocation is not interrupted.
pub struct ListenerToken {
    id: u64,
    map: Weak<Mutex<ListenerMap>>,
}

impl ListenerToken {
    pub fn cancel(self) {
        // Drop does the work.
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ListenerToken {
    fn drop(&mut self) {
        if let Some(map) = self.map.upgrade() {
            map.lock().listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn test_graph() -> Arc<Graph> {
        Arc::new(Graph::new())
    }

    #[test]
    fn test_invocation_in_insertion_order() {
        let listeners = TimecodeListeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let _t1 = listeners.add(move |_, _| o1.lock().push(1));
        let o2 = Arc::clone(&order);
        let _t2 = listeners.add(move |_, _| o2.lock().push(2));
        let o3 = Arc::clone(&order);
        let _t3 = listeners.add(move |_, _| o3.lock().push(3));

        listeners.invoke(FrameTimecode::new(0, 25), &test_graph());
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_token_drop_unregisters() {
        let listeners = TimecodeListeners::new();
        let calls = Arc::new(AtomicU64::new(0));

        let c = Arc::clone(&calls);
        let token = listeners.add(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(listeners.len(), 1);

        listeners.invoke(FrameTimecode::new(0, 25), &test_graph());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(token);
        assert!(listeners.is_empty());

        listeners.invoke(FrameTimecode::new(1, 25), &test_graph());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let listeners = TimecodeListeners::new();
        let calls = Arc::new(AtomicU64::new(0));

        let _t1 = listeners.add(|_, _| panic!("scheduled command exploded"));
        let c = Arc::clone(&calls);
        let _t2 = listeners.add(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        listeners.invoke(FrameTimecode::new(0, 25), &test_graph());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_during_invocation_is_safe() {
        let listeners = TimecodeListeners::new();
        let token_slot: Arc<Mutex<Option<ListenerToken>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let slot = Arc::clone(&token_slot);
        let c = Arc::clone(&calls);
        let token = listeners.add(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            // self-cancel while the snapshot is being walked
            slot.lock().take();
        });
        *token_slot.lock() = Some(token);

        listeners.invoke(FrameTimecode::new(0, 25), &test_graph());
        listeners.invoke(FrameTimecode::new(1, 25), &test_graph());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }
}
