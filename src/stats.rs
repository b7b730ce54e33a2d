// src/stats.rs
// Fire-and-forget counters and the recent-blocks ring, persisted to the KV
// store. Every write swallows failure: stats loss under store pressure is
// accepted, and nothing here may fail or slow the request path.

use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;

/// Counter expiry, pushed forward on every write. A counter therefore only
/// disappears after a full day of inactivity, not at a daily boundary.
pub const STATS_TTL_SECS: u64 = 86400;

pub const BLOCKED_TOTAL_KEY: &str = "botguard:blocked:total";
pub const ALLOWED_TOTAL_KEY: &str = "botguard:allowed:total";
pub const RECENT_BLOCKS_KEY: &str = "botguard:recent-blocks";
pub const RECENT_BLOCKS_CAP: usize = 100;

/// One denied request, as kept in the recent-blocks ring.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlockedEntry {
    pub ip: String,
    #[serde(default)]
    pub country: Option<String>,
    pub reason: String,
    pub path: String,
    pub ts: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct StatCounter {
    count: u64,
    expires: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct RecentBlocks {
    entries: Vec<BlockedEntry>,
    expires: u64,
}

pub fn geo_counter_key(country: &str) -> String {
    format!("botguard:blocked:geo:{}", country)
}

pub fn country_counter_key(country: &str) -> String {
    format!("botguard:allowed:country:{}", country)
}

fn read_counter(store: &impl KeyValueStore, key: &str) -> u64 {
    let now = crate::now_ts();
    store
        .get(key)
        .ok()
        .flatten()
        .and_then(|v| serde_json::from_slice::<StatCounter>(&v).ok())
        .filter(|c| c.expires > now)
        .map(|c| c.count)
        .unwrap_or(0)
}

/// Whole-value read-modify-write without storage-level atomicity; concurrent
/// writers can lose updates, acceptable for approximate stats.
fn bump_counter(store: &impl KeyValueStore, key: &str) {
    let counter = StatCounter {
        count: read_counter(store, key).saturating_add(1),
        expires: crate::now_ts() + STATS_TTL_SECS,
    };
    match serde_json::to_vec(&counter) {
        Ok(val) => {
            if store.set(key, &val).is_err() {
                eprintln!("[stats] dropped increment for {}", key);
            }
        }
        Err(_) => eprintln!("[stats] serialization error for {}", key),
    }
}

/// Records a deny: total and per-country counters plus the recent-blocks
/// ring. Never fails the caller.
pub fn record_blocked(store: &impl KeyValueStore, entry: BlockedEntry) {
    bump_counter(store, BLOCKED_TOTAL_KEY);
    if let Some(country) = entry.country.as_deref() {
        bump_counter(store, &geo_counter_key(country));
    }
    push_recent_block(store, entry);
}

/// Mirrors for admitted traffic.
pub fn record_allowed(store: &impl KeyValueStore, country: Option<&str>) {
    bump_counter(store, ALLOWED_TOTAL_KEY);
    if let Some(country) = country {
        bump_counter(store, &country_counter_key(country));
    }
}

fn push_recent_block(store: &impl KeyValueStore, entry: BlockedEntry) {
    let now = crate::now_ts();
    let mut entries = store
        .get(RECENT_BLOCKS_KEY)
        .ok()
        .flatten()
        .and_then(|v| serde_json::from_slice::<RecentBlocks>(&v).ok())
        .filter(|r| r.expires > now)
        .map(|r| r.entries)
        .unwrap_or_default();
    // Newest first; oldest entries are silently dropped.
    entries.insert(0, entry);
    entries.truncate(RECENT_BLOCKS_CAP);
    let blob = RecentBlocks {
        entries,
        expires: now + STATS_TTL_SECS,
    };
    match serde_json::to_vec(&blob) {
        Ok(val) => {
            if store.set(RECENT_BLOCKS_KEY, &val).is_err() {
                eprintln!("[stats] dropped recent-blocks update");
            }
        }
        Err(_) => eprintln!("[stats] serialization error for recent-blocks"),
    }
}

pub fn blocked_total(store: &impl KeyValueStore) -> u64 {
    read_counter(store, BLOCKED_TOTAL_KEY)
}

pub fn allowed_total(store: &impl KeyValueStore) -> u64 {
    read_counter(store, ALLOWED_TOTAL_KEY)
}

pub fn blocked_for_country(store: &impl KeyValueStore, country: &str) -> u64 {
    read_counter(store, &geo_counter_key(country))
}

pub fn recent_blocks(store: &impl KeyValueStore) -> Vec<BlockedEntry> {
    let now = crate::now_ts();
    store
        .get(RECENT_BLOCKS_KEY)
        .ok()
        .flatten()
        .and_then(|v| serde_json::from_slice::<RecentBlocks>(&v).ok())
        .filter(|r| r.expires > now)
        .map(|r| r.entries)
        .unwrap_or_default()
}
