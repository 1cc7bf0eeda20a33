//! Dependency-keyed memoization of virtual subtrees.
//!
//! An entry is returned without rebuilding iff its stored dependency list has
//! the same length as the caller's and every element is identity-equal
//! ([`PropValue::is_same`]). Stored nodes are private copies; callers never
//! share structure with what they passed in.
//!
//! Eviction: when an insert pushes the entry count above capacity, the
//! least-recently-accessed fraction (20% by default) is dropped.

use crate::types::{PropValue, VNode};
use core_types::CacheStamp;
use std::collections::HashMap;
use std::rc::Rc;

pub type Dependency = PropValue;

#[derive(Debug)]
struct CacheEntry {
    value: Rc<VNode>,
    dependencies: Vec<Dependency>,
    last_accessed: CacheStamp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub evicted: u64,
}

#[derive(Debug)]
pub struct MemoCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    evict_ratio: f64,
    clock: CacheStamp,
    stats: MemoStats,
}

impl MemoCache {
    pub const DEFAULT_CAPACITY: usize = 1000;
    pub const DEFAULT_EVICT_RATIO: f64 = 0.2;

    pub fn new() -> Self {
        Self::with_policy(Self::DEFAULT_CAPACITY, Self::DEFAULT_EVICT_RATIO)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_policy(capacity, Self::DEFAULT_EVICT_RATIO)
    }

    /// `evict_ratio` is clamped to `0.0..=1.0`; at least one entry is evicted
    /// whenever the cache overflows.
    pub fn with_policy(capacity: usize, evict_ratio: f64) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            evict_ratio: evict_ratio.clamp(0.0, 1.0),
            clock: CacheStamp::INITIAL,
            stats: MemoStats::default(),
        }
    }

    /// Return the stored copy for `key` when `dependencies` are unchanged,
    /// otherwise store and return a fresh copy of `node`.
    pub fn memoize(&mut self, key: &str, node: &VNode, dependencies: &[Dependency]) -> Rc<VNode> {
        self.memoize_with(key, dependencies, || node.clone())
    }

    /// Like [`MemoCache::memoize`], but only builds the node on a miss.
    pub fn memoize_with(
        &mut self,
        key: &str,
        dependencies: &[Dependency],
        build: impl FnOnce() -> VNode,
    ) -> Rc<VNode> {
        let cache_key = cache_key(key, dependencies);
        let stamp = self.tick();

        if let Some(entry) = self.entries.get_mut(&cache_key) {
            entry.last_accessed = stamp;
            if deps_same(&entry.dependencies, dependencies) {
                self.stats.hits += 1;
                log::trace!(target: "vdom.memo", "hit {cache_key}");
                return Rc::clone(&entry.value);
            }
        }

        self.stats.misses += 1;
        log::trace!(target: "vdom.memo", "miss {cache_key}");
        let value = Rc::new(build());
        self.entries.insert(
            cache_key,
            CacheEntry {
                value: Rc::clone(&value),
                dependencies: dependencies.to_vec(),
                last_accessed: stamp,
            },
        );
        if self.entries.len() > self.capacity {
            self.evict();
        }
        value
    }

    pub fn contains(&self, key: &str, dependencies: &[Dependency]) -> bool {
        self.entries.contains_key(&cache_key(key, dependencies))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> MemoStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn tick(&mut self) -> CacheStamp {
        self.clock = self.clock.next();
        self.clock
    }

    fn evict(&mut self) {
        let len = self.entries.len();
        let count = ((len as f64 * self.evict_ratio).floor() as usize).clamp(1, len);
        let mut by_age: Vec<(CacheStamp, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_accessed, key.clone()))
            .collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        self.stats.evicted += count as u64;
        log::debug!(target: "vdom.memo", "evicted {count} of {len} entries");
    }
}

impl Default for MemoCache {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(key: &str, dependencies: &[Dependency]) -> String {
    let mut out = String::from(key);
    for dep in dependencies {
        out.push('-');
        out.push_str(&dep.fragment());
    }
    out
}

fn deps_same(old: &[Dependency], new: &[Dependency]) -> bool {
    old.len() == new.len() && old.iter().zip(new).all(|(a, b)| a.is_same(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{create_node, leaf};
    use crate::types::Props;

    fn item(text: &str) -> VNode {
        create_node("li", Props::new(), [text])
    }

    #[test]
    fn same_dependencies_return_same_instance() {
        let mut cache = MemoCache::new();
        let deps = [PropValue::from("x"), PropValue::from(1)];
        let a = cache.memoize("row", &item("a"), &deps);
        let b = cache.memoize("row", &item("other"), &deps);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(*b, item("a"));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn changing_one_dependency_recomputes() {
        let mut cache = MemoCache::new();
        let a = cache.memoize("row", &item("a"), &[PropValue::from(1), PropValue::from(2)]);
        let b = cache.memoize("row", &item("b"), &[PropValue::from(1), PropValue::from(3)]);
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(*b, item("b"));
    }

    #[test]
    fn dependencies_compare_by_identity() {
        let mut cache = MemoCache::new();
        let shared = PropValue::from(vec![PropValue::from(1)]);
        let a = cache.memoize("row", &item("a"), std::slice::from_ref(&shared));
        let b = cache.memoize("row", &item("b"), &[shared.clone()]);
        assert!(Rc::ptr_eq(&a, &b));

        let lookalike = PropValue::from(vec![PropValue::from(1)]);
        let c = cache.memoize("row", &item("c"), &[lookalike]);
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(*c, item("c"));
    }

    #[test]
    fn memoize_with_builds_only_on_miss() {
        let mut cache = MemoCache::new();
        let mut builds = 0;
        for _ in 0..3 {
            cache.memoize_with("static", &[], || {
                builds += 1;
                leaf("hr", Props::new())
            });
        }
        assert_eq!(builds, 1);
    }

    #[test]
    fn stored_value_is_a_copy() {
        let mut cache = MemoCache::new();
        let node = item("a");
        let stored = cache.memoize("row", &node, &[]);
        assert_eq!(*stored, node);
        drop(node);
        assert_eq!(stored.children()[0].as_text(), Some("a"));
    }

    #[test]
    fn overflow_evicts_least_recently_accessed() {
        let mut cache = MemoCache::with_capacity(10);
        for i in 0..10 {
            cache.memoize(&format!("k{i}"), &item("x"), &[]);
        }
        // Touch k0 and k1 so k2 and k3 become the oldest.
        cache.memoize("k0", &item("x"), &[]);
        cache.memoize("k1", &item("x"), &[]);
        cache.memoize("k10", &item("x"), &[]);

        // 11 entries, floor(11 * 0.2) = 2 evicted.
        assert_eq!(cache.len(), 9);
        assert!(cache.contains("k0", &[]));
        assert!(cache.contains("k1", &[]));
        assert!(!cache.contains("k2", &[]));
        assert!(!cache.contains("k3", &[]));
        assert!(cache.contains("k10", &[]));
        assert_eq!(cache.stats().evicted, 2);
    }

    #[test]
    fn tiny_capacity_still_evicts() {
        let mut cache = MemoCache::with_capacity(1);
        cache.memoize("a", &item("a"), &[]);
        cache.memoize("b", &item("b"), &[]);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b", &[]));
    }
}
