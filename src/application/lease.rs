//! Per-key "in flight" markers with an optional expiry.
//!
//! A fresh lease is parked: it never expires until its holder first renews
//! it. From then on it expires `ttl` after the latest renewal.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Proof of holding a lease; only the holder can release it through `release_if`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseToken(u64);

#[derive(Debug)]
struct Lease {
    token: LeaseToken,
    /// `None` while parked.
    renewed_at: Option<Instant>,
}

#[derive(Debug)]
pub struct LeaseTable<K> {
    leases: Mutex<HashMap<K, Lease>>,
    ttl: Option<Duration>,
    next_token: AtomicU64,
}

impl<K: Eq + Hash> LeaseTable<K> {
    /// A renewed lease idle for longer than `ttl` counts as released.
    /// `None` keeps leases forever.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            ttl,
            next_token: AtomicU64::new(1),
        }
    }

    /// Take the lease for `key` unless someone else holds a live one.
    pub fn acquire(&self, key: K) -> Option<LeaseToken> {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = leases.get(&key) {
            if !self.expired(existing) {
                return None;
            }
            tracing::warn!(
                idle_for = ?existing.renewed_at.map(|at| at.elapsed()),
                "taking over expired lease"
            );
        }

        let token = LeaseToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        leases.insert(
            key,
            Lease {
                token,
                renewed_at: None,
            },
        );
        Some(token)
    }

    pub fn try_acquire(&self, key: K) -> bool {
        self.acquire(key).is_some()
    }

    /// Restart the expiry clock of a lease still held by `token`.
    pub fn renew(&self, key: &K, token: LeaseToken) -> bool {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        match leases.get_mut(key) {
            Some(lease) if lease.token == token && !self.expired(lease) => {
                lease.renewed_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// Unconditional release. Returns whether a live lease was held.
    pub fn release(&self, key: &K) -> bool {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        match leases.remove(key) {
            Some(lease) => !self.expired(&lease),
            None => false,
        }
    }

    /// Release only if the lease still belongs to `token`.
    pub fn release_if(&self, key: &K, token: LeaseToken) -> bool {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        match leases.get(key) {
            Some(lease) if lease.token == token => {
                leases.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn is_held(&self, key: &K) -> bool {
        let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        leases.get(key).map(|lease| !self.expired(lease)).unwrap_or(false)
    }

    fn expired(&self, lease: &Lease) -> bool {
        match (self.ttl, lease.renewed_at) {
            (Some(ttl), Some(renewed_at)) => renewed_at.elapsed() >= ttl,
            _ => false,
        }
    }
}

/// A held lease travelling with the job it protects.
#[derive(Debug, Clone)]
pub struct LeaseHandle<K> {
    table: Arc<LeaseTable<K>>,
    key: K,
    token: LeaseToken,
}

impl<K: Eq + Hash> LeaseHandle<K> {
    pub fn new(table: Arc<LeaseTable<K>>, key: K, token: LeaseToken) -> Self {
        Self { table, key, token }
    }

    pub fn token(&self) -> LeaseToken {
        self.token
    }

    /// Unpark or extend the lease. `false` if it was lost in the meantime.
    pub fn renew(&self) -> bool {
        self.table.renew(&self.key, self.token)
    }
}
