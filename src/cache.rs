//! Injectable key-value cache for read-heavy catalog queries.
//!
//! Entries carry a caller supplied TTL. Stale reads within the TTL are acceptable;
//! writers invalidate by key prefix after they commit.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use serde_json::Value;

pub const PREFIX_PRODUCT: &str = "product:";

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Drops every entry whose key starts with `prefix`, returning how many went.
    fn invalidate_prefix(&self, prefix: &str) -> usize;
}

/// Build a stable key from a prefix and any serializable parameters.
pub fn make_key<P: serde::Serialize>(prefix: &str, params: &P) -> String {
    let encoded = serde_json::to_string(params).unwrap_or_default();
    format!("{prefix}{encoded}")
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.write() {
            let now = Instant::now();
            entries.retain(|_, (_, expires_at)| *expires_at > now);
            entries.insert(key.to_string(), (value, now + ttl));
        }
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}

    fn invalidate_prefix(&self, _prefix: &str) -> usize {
        0
    }
}
