//! Reference-counted registry of controller views
//!
//! One view exists per controller id while at least one listener holds it.
//! The view's listener count and the registry entry change together under the
//! map's entry lock, so no caller can observe a registered view with a count
//! of zero.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use psmove_protocol::{ControllerDataFrame, ControllerId};

use crate::view::{ControllerView, ControllerViewHandle};

/// Thread-safe mapping of controller id to its shared view
#[derive(Default)]
pub struct ControllerViewRegistry {
    views: DashMap<ControllerId, Arc<RwLock<ControllerView>>>,
}

impl ControllerViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener to the view for `controller_id`, creating it on first use
    pub fn allocate(&self, controller_id: ControllerId) -> ControllerViewHandle {
        let entry = self
            .views
            .entry(controller_id)
            .or_insert_with(|| Arc::new(RwLock::new(ControllerView::new(controller_id))));

        let view = Arc::clone(entry.value());
        let count = view.write().inc_listener_count();
        drop(entry);

        tracing::debug!(
            "Controller view {} listener count: {} -> {}",
            controller_id,
            count - 1,
            count
        );

        ControllerViewHandle::new(controller_id, view)
    }

    /// Remove a listener, destroying the view when it was the last one
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to the view currently registered
    /// for its controller id (double free, or a handle from a view that was
    /// already destroyed and re-allocated).
    pub fn free(&self, handle: ControllerViewHandle) {
        let controller_id = handle.controller_id();

        let Entry::Occupied(entry) = self.views.entry(controller_id) else {
            panic!("Freed controller view {} which is not registered", controller_id);
        };
        assert!(
            Arc::ptr_eq(entry.get(), handle.shared()),
            "Freed a stale handle for controller view {}",
            controller_id
        );

        let remaining = entry.get().write().dec_listener_count();

        tracing::debug!(
            "Controller view {} listener count: {} -> {}",
            controller_id,
            remaining + 1,
            remaining
        );

        if remaining == 0 {
            entry.remove();
            tracing::debug!("Controller view {} destroyed", controller_id);
        }
    }

    /// Overwrite the registered view's state with a data frame
    ///
    /// Frames for unregistered controllers are dropped. Returns whether the
    /// frame was applied.
    pub fn apply_data_frame(&self, frame: &ControllerDataFrame) -> bool {
        match self.views.get(&frame.controller_id) {
            Some(view) => {
                view.write().apply_data_frame(frame);
                true
            }
            None => {
                tracing::trace!(
                    "Dropping data frame {} for unregistered controller {}",
                    frame.sequence_num,
                    frame.controller_id
                );
                false
            }
        }
    }

    /// Whether `handle` refers to the view currently registered for its id
    pub fn is_registered(&self, handle: &ControllerViewHandle) -> bool {
        self.views
            .get(&handle.controller_id())
            .map_or(false, |view| Arc::ptr_eq(view.value(), handle.shared()))
    }

    pub fn contains(&self, controller_id: ControllerId) -> bool {
        self.views.contains_key(&controller_id)
    }

    /// Current listener count for a controller, zero if unregistered
    pub fn listener_count(&self, controller_id: ControllerId) -> usize {
        self.views
            .get(&controller_id)
            .map_or(0, |view| view.read().listener_count())
    }

    pub fn controller_ids(&self) -> Vec<ControllerId> {
        let mut ids: Vec<_> = self.views.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn frame(controller_id: ControllerId, sequence_num: u32) -> ControllerDataFrame {
        ControllerDataFrame {
            controller_id,
            sequence_num,
            ..Default::default()
        }
    }

    #[test]
    fn test_allocate_shares_view() {
        let registry = ControllerViewRegistry::new();
        let first = registry.allocate(7);
        let second = registry.allocate(7);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.listener_count(7), 2);
        assert!(Arc::ptr_eq(first.shared(), second.shared()));
    }

    #[test]
    fn test_free_removes_on_last_listener() {
        let registry = ControllerViewRegistry::new();
        let first = registry.allocate(7);
        let second = registry.allocate(7);

        registry.free(first);
        assert!(registry.contains(7));
        assert_eq!(registry.listener_count(7), 1);

        registry.free(second);
        assert!(!registry.contains(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_frame_for_unknown_controller_is_dropped() {
        let registry = ControllerViewRegistry::new();
        assert!(!registry.apply_data_frame(&frame(3, 1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_frame_updates_registered_view() {
        let registry = ControllerViewRegistry::new();
        let view = registry.allocate(3);

        assert!(registry.apply_data_frame(&frame(3, 42)));
        assert_eq!(view.read().sequence_num(), 42);
    }

    #[test]
    fn test_handle_outlives_destroyed_view() {
        let registry = ControllerViewRegistry::new();
        let view = registry.allocate(1);
        let kept = view.clone();
        registry.apply_data_frame(&frame(1, 5));
        registry.free(view);

        // The registry no longer updates it, but the memory stays valid
        assert!(!registry.apply_data_frame(&frame(1, 6)));
        assert_eq!(kept.read().sequence_num(), 5);
        assert!(!registry.is_registered(&kept));
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_double_free_panics() {
        let registry = ControllerViewRegistry::new();
        let view = registry.allocate(1);
        let copy = view.clone();
        registry.free(view);
        registry.free(copy);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_stale_handle_after_reallocation_panics() {
        let registry = ControllerViewRegistry::new();
        let old = registry.allocate(1);
        let stale = old.clone();
        registry.free(old);

        let _fresh = registry.allocate(1);
        registry.free(stale);
    }

    #[test]
    fn test_concurrent_allocate_and_free() {
        let registry = Arc::new(ControllerViewRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let view = registry.allocate(1);
                        registry.apply_data_frame(&frame(1, 0));
                        registry.free(view);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(ControllerId),
        Free(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4i32).prop_map(Op::Allocate),
            any::<usize>().prop_map(Op::Free),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The registry holds exactly the ids with a positive net allocation
        /// count, and each view's listener count equals that net count.
        #[test]
        fn prop_listener_counts_track_net_allocations(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let registry = ControllerViewRegistry::new();
            let mut outstanding: Vec<ControllerViewHandle> = Vec::new();
            let mut expected: HashMap<ControllerId, usize> = HashMap::new();

            for op in ops {
                match op {
                    Op::Allocate(id) => {
                        outstanding.push(registry.allocate(id));
                        *expected.entry(id).or_insert(0) += 1;
                    }
                    Op::Free(index) => {
                        if outstanding.is_empty() {
                            continue;
                        }
                        let handle = outstanding.swap_remove(index % outstanding.len());
                        let id = handle.controller_id();
                        registry.free(handle);
                        let count = expected.get_mut(&id).unwrap();
                        *count -= 1;
                        if *count == 0 {
                            expected.remove(&id);
                        }
                    }
                }

                let mut expected_ids: Vec<_> = expected.keys().copied().collect();
                expected_ids.sort_unstable();
                prop_assert_eq!(registry.controller_ids(), expected_ids);
                for (id, count) in &expected {
                    prop_assert_eq!(registry.listener_count(*id), *count);
                }
            }
        }
    }
}
