use crate::models::ResourceKind;
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Sharded async mutexes keyed by resource.
///
/// Two resources hashing to the same shard share a lock. Shards are always
/// taken in ascending order so pipelines touching several resources cannot
/// deadlock each other.
pub struct ResourceLocks {
    shards: Vec<Arc<Mutex<()>>>,
}

impl ResourceLocks {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Arc::new(Mutex::new(()))).collect(),
        }
    }

    fn shard(&self, kind: ResourceKind, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        (kind, id).hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub async fn acquire(&self, keys: &[(ResourceKind, &str)]) -> Vec<OwnedMutexGuard<()>> {
        let mut shards: Vec<usize> = keys.iter().map(|(kind, id)| self.shard(*kind, id)).collect();
        shards.sort_unstable();
        shards.dedup();

        let mut guards = Vec::with_capacity(shards.len());
        for shard in shards {
            guards.push(Arc::clone(&self.shards[shard]).lock_owned().await);
        }

        guards
    }
}
