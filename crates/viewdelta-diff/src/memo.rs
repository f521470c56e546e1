//! Per-parent cache of child change nodes.
//!
//! Entries are keyed by slot index (view nodes) or element identity
//! (plural and map nodes) and remember the `(initial, current)` pair they
//! were built for. A hit is only served while both references are still
//! the same; otherwise the node is rebuilt and replaces the entry. The
//! cache holds the values alive, so identity keys cannot be reused by other
//! allocations while an entry exists. Element caches are pruned to the
//! live deltas each time a parent enumerates them.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use tracing::trace;
use viewdelta_tracking::Value;

use crate::error::DiffResult;
use crate::model::{ChangeModel, ChangeRef};

struct MemoEntry {
    initial: Value,
    current: Value,
    node: ChangeRef,
}

/// Cache of child nodes owned by one parent node.
pub(crate) struct MemoCache<K> {
    entries: RefCell<HashMap<K, MemoEntry>>,
}

impl<K> Default for MemoCache<K> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy + std::fmt::Debug> MemoCache<K> {
    /// Cached node for `key` if it was built for the same pair, else the
    /// result of `build`, which is then cached.
    pub(crate) fn get_or_build(
        &self,
        key: K,
        initial: &Value,
        current: &Value,
        build: impl FnOnce() -> DiffResult<ChangeModel>,
    ) -> DiffResult<ChangeRef> {
        if let Some(entry) = self.entries.borrow().get(&key) {
            if entry.initial.same(initial) && entry.current.same(current) {
                return Ok(Rc::clone(&entry.node));
            }
            trace!(?key, "memoized change node is stale; rebuilding");
        }
        let node = Rc::new(build()?);
        self.entries.borrow_mut().insert(
            key,
            MemoEntry {
                initial: initial.clone(),
                current: current.clone(),
                node: Rc::clone(&node),
            },
        );
        Ok(node)
    }

    /// Drop every entry whose key is not in `live`.
    pub(crate) fn retain(&self, live: impl IntoIterator<Item = K>) {
        let live: HashSet<K> = live.into_iter().collect();
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|key, _| live.contains(key));
        if entries.len() < before {
            trace!(evicted = before - entries.len(), "pruned memoized change nodes");
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}
