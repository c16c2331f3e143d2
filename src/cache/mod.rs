use crate::model::{ContractQuote, SpotQuote};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedValue {
    Contract(ContractQuote),
    Spot(SpotQuote),
}

#[derive(Debug, Clone, Copy)]
struct CacheSlot {
    value: CachedValue,
    stored_at: DateTime<Utc>,
}

/// Short-lived quote memo keyed by symbol. Purely an optimisation: a disabled or
/// cold cache must lead to the same decisions, only with more provider calls.
#[derive(Clone, Debug)]
pub struct QuoteCache {
    ttl: Duration,
    capacity: usize,
    inner: Arc<RwLock<HashMap<String, CacheSlot>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
}

impl QuoteCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::zero(), 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0 && self.ttl > Duration::zero()
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CachedValue> {
        if !self.is_enabled() {
            return None;
        }
        let guard = self.inner.read();
        guard
            .get(key)
            .filter(|slot| now - slot.stored_at < self.ttl)
            .map(|slot| slot.value)
    }

    pub fn put(&self, key: &str, value: CachedValue) {
        self.put_at(key, value, Utc::now());
    }

    pub fn put_at(&self, key: &str, value: CachedValue, now: DateTime<Utc>) {
        if !self.is_enabled() {
            return;
        }
        let mut guard = self.inner.write();
        if guard.len() >= self.capacity && !guard.contains_key(key) {
            guard.retain(|_, slot| now - slot.stored_at < self.ttl);
            if guard.len() >= self.capacity {
                let oldest = guard
                    .iter()
                    .min_by_key(|(_, slot)| slot.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    guard.remove(&oldest);
                }
            }
        }
        guard.insert(
            key.to_string(),
            CacheSlot {
                value,
                stored_at: now,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.read();
        let now = Utc::now();
        CacheStats {
            entries: guard.len(),
            fresh: guard
                .values()
                .filter(|slot| now - slot.stored_at < self.ttl)
                .count(),
        }
    }
}
