//! Sharded in-memory keyed store.
//!
//! Every component keeps its shared state in one of these. `update` runs the
//! caller's closure under the shard write lock, so a multi-field change lands
//! as one atomic transition and concurrent writers to the same key serialize
//! instead of overwriting each other. Persistence of the contents is a
//! collaborator's responsibility.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;

const SHARD_COUNT: usize = 16;

pub struct ShardedStore<K, V> {
    shards: Vec<RwLock<HashMap<K, V>>>,
}

impl<K, V> ShardedStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    fn shard_for(&self, key: &K) -> &RwLock<HashMap<K, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.shard_for(key).read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.shard_for(key).read().contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.shard_for(&key).write().insert(key, value);
    }

    /// Atomic read-modify-write. The entry is created with `init` when
    /// absent; `apply` sees the entry under the write lock and its return
    /// value is handed back to the caller.
    pub fn update<R>(&self, key: K, init: impl FnOnce() -> V, apply: impl FnOnce(&mut V) -> R) -> R {
        let mut shard = self.shard_for(&key).write();
        let entry = shard.entry(key).or_insert_with(init);
        apply(entry)
    }

    /// Atomic read-modify-write that leaves missing keys missing.
    pub fn update_existing<R>(&self, key: &K, apply: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut shard = self.shard_for(key).write();
        shard.get_mut(key).map(apply)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard_for(key).write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry the predicate rejects; the predicate may also trim
    /// the value in place. Returns how many entries were removed.
    pub fn retain(&self, mut keep: impl FnMut(&K, &mut V) -> bool) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut guard = shard.write();
            let before = guard.len();
            guard.retain(|k, v| keep(k, v));
            removed += before - guard.len();
        }
        removed
    }

    /// Cloned snapshot of the entries matching the predicate. Shards are
    /// visited one at a time, so the snapshot is per-shard consistent only.
    pub fn collect_where(&self, mut pred: impl FnMut(&K, &V) -> bool) -> Vec<(K, V)> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let guard = shard.read();
            for (k, v) in guard.iter() {
                if pred(k, v) {
                    out.push((k.clone(), v.clone()));
                }
            }
        }
        out
    }
}

impl<K, V> Default for ShardedStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
