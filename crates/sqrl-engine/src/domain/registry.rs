//! Nut registry: the only shared mutable state the engine owns.
//!
//! A bounded-by-TTL concurrent map from nut string to [`NutRecord`]. Two
//! access disciplines share it:
//!
//! - the protocol path *consumes* nuts: each nut admits at most one client
//!   message, enforced atomically per entry
//! - the poll path only *reads*, and keeps seeing a record after the
//!   conversation has consumed it, until the TTL evicts it

use super::entities::{IdentityKey, NutRecord};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Registry counters, exposed for observability.
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Nuts issued over the registry lifetime.
    pub issued: AtomicU64,
    /// Nuts consumed by the protocol path.
    pub consumed: AtomicU64,
    /// Records dropped by TTL sweeps.
    pub evicted: AtomicU64,
}

/// Concurrent nut store with TTL eviction.
pub struct NutRegistry {
    records: DashMap<String, NutRecord>,
    ttl: Duration,
    stats: RegistryStats,
}

impl NutRegistry {
    /// Create a registry whose records live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
            stats: RegistryStats::default(),
        }
    }

    /// Record that `nut` was handed to a client, optionally embedded in
    /// `url`. A present `origin_nut` marks this as a follow-up in an
    /// existing conversation; ancestry always points at the origin, so the
    /// chain stays one step deep no matter how many round trips intervene.
    pub fn issue(&self, nut: &str, url: Option<&str>, origin_nut: Option<&str>) {
        let record = NutRecord {
            nut: nut.to_string(),
            url: url.map(str::to_string),
            created_at: Instant::now(),
            original_login_nut: origin_nut.map(str::to_string),
            logged_in: false,
            client_primary_identity_public_key: None,
            consumed: false,
        };
        self.records.insert(nut.to_string(), record);
        self.stats.issued.fetch_add(1, Ordering::Relaxed);
        trace!(nut, origin = origin_nut, "nut issued");
    }

    /// Read a record without consuming it. Returns `None` for unknown or
    /// expired nuts. This is the poll path: consumed records stay visible.
    pub fn lookup(&self, nut: &str) -> Option<NutRecord> {
        let record = self.records.get(nut)?;
        if record.created_at.elapsed() > self.ttl {
            return None;
        }
        Some(record.clone())
    }

    /// Claim a nut for the protocol path. At most one of any number of
    /// racing claims on the same nut succeeds; the entry mutation happens
    /// under the map's shard lock.
    pub fn consume(&self, nut: &str) -> Option<NutRecord> {
        let mut record = self.records.get_mut(nut)?;
        if record.consumed || record.created_at.elapsed() > self.ttl {
            return None;
        }
        record.consumed = true;
        self.stats.consumed.fetch_add(1, Ordering::Relaxed);
        Some(record.clone())
    }

    /// The atomic consume-and-issue step of one engine invocation: claim
    /// the presented nut, then register its successor with ancestry
    /// pointing at the conversation origin. Returns the consumed record.
    pub fn consume_and_issue(
        &self,
        presented: &str,
        next_nut: &str,
        next_url: Option<&str>,
    ) -> Option<NutRecord> {
        let record = self.consume(presented)?;
        self.issue(next_nut, next_url, Some(record.origin_nut()));
        Some(record)
    }

    /// Flip the origin record to logged-in and bind the identity key.
    /// Any subsequent [`lookup`](Self::lookup) observes the flip.
    pub fn mark_logged_in(&self, origin_nut: &str, key: IdentityKey) -> bool {
        match self.records.get_mut(origin_nut) {
            Some(mut record) => {
                record.logged_in = true;
                record.client_primary_identity_public_key = Some(key);
                debug!(nut = origin_nut, "origin marked logged in");
                true
            }
            None => false,
        }
    }

    /// Drop expired records. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let before = self.records.len();
        let ttl = self.ttl;
        self.records.retain(|_, record| record.created_at.elapsed() <= ttl);
        let evicted = before - self.records.len();
        if evicted > 0 {
            self.stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "nut registry sweep");
        }
        evicted
    }

    /// Live record count (including expired records not yet swept).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registry counters.
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}
