use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::model::{DateRange, RoomInfo, RoomType};

/// Every availability entry lives under this prefix; booking mutations drop them all.
pub const AVAILABILITY_PREFIX: &str = "availability:";

pub fn availability_key(range: &DateRange, room_type: Option<RoomType>, min_capacity: Option<u32>) -> String {
    format!(
        "{AVAILABILITY_PREFIX}{}:{}:{}:{}",
        range.check_in(),
        range.check_out(),
        room_type.map_or("any", |t| t.as_str()),
        min_capacity.unwrap_or(0),
    )
}

pub trait AvailabilityCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<RoomInfo>>;
    fn put(&self, key: String, rooms: Vec<RoomInfo>);
    /// Returns how many entries were dropped.
    fn invalidate_prefix(&self, prefix: &str) -> usize;
    /// Drops entries past their TTL. Returns how many were dropped.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Caching disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl AvailabilityCache for NoopCache {
    fn get(&self, _key: &str) -> Option<Vec<RoomInfo>> {
        None
    }

    fn put(&self, _key: String, _rooms: Vec<RoomInfo>) {}

    fn invalidate_prefix(&self, _prefix: &str) -> usize {
        0
    }
}

/// In-process TTL cache.
pub struct MemoryCache {
    entries: DashMap<String, (Instant, Vec<RoomInfo>)>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AvailabilityCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<RoomInfo>> {
        let hit = self
            .entries
            .get(key)
            .filter(|e| e.value().0.elapsed() < self.ttl)
            .map(|e| e.value().1.clone());
        if hit.is_none() {
            self.entries.remove_if(key, |_, (stored, _)| stored.elapsed() >= self.ttl);
        }
        let result = if hit.is_some() { "hit" } else { "miss" };
        metrics::counter!(crate::observability::CACHE_LOOKUPS_TOTAL, "result" => result).increment(1);
        hit
    }

    fn put(&self, key: String, rooms: Vec<RoomInfo>) {
        self.entries.insert(key, (Instant::now(), rooms));
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }
}
