// src/config.rs
// Guard configuration: environment seeding, KV persistence, and the
// merge-vs-replace duality for admin writes and periodic refresh.

use std::collections::HashSet;
use std::env;

use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;

pub const CONFIG_KEY: &str = "botguard:config";
/// Persisted config must outlive a process restart by a wide margin.
pub const CONFIG_TTL_SECS: u64 = 30 * 86400;

pub const DEFAULT_SUSPICION_THRESHOLD: u8 = 80;
pub const DEFAULT_BLOCKED_COUNTRY: &str = "CN";

/// The four admin-tunable fields. Requests read a whole snapshot of this
/// struct, never individual fields across refreshes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    pub enabled: bool,
    pub blocked_countries: HashSet<String>,
    pub blocked_ips: HashSet<String>,
    pub suspicion_threshold: u8,
}

/// Partial admin update: only provided fields overwrite. Blocked IPs are
/// managed through the dedicated block-ip operations instead.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub enabled: Option<bool>,
    pub blocked_countries: Option<Vec<String>>,
    pub suspicion_threshold: Option<u8>,
}

/// Stored envelope: the config blob plus its expiry. Spin KV has no native
/// TTL, so expiry is checked lazily on read.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct StoredConfig {
    #[serde(flatten)]
    config: GuardConfig,
    expires: u64,
}

fn parse_bool_env(value: Option<&str>, default_value: bool) -> bool {
    match value {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => default_value,
    }
}

pub(crate) fn parse_threshold(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .unwrap_or(DEFAULT_SUSPICION_THRESHOLD)
        .min(100)
}

pub(crate) fn parse_country_list(value: Option<&str>) -> HashSet<String> {
    let countries: HashSet<String> = value
        .unwrap_or("")
        .split(',')
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| is_iso2(c))
        .collect();
    if countries.is_empty() {
        HashSet::from([DEFAULT_BLOCKED_COUNTRY.to_string()])
    } else {
        countries
    }
}

pub fn is_iso2(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}

impl GuardConfig {
    /// Environment-seeded defaults, used at process start and whenever no
    /// usable snapshot exists in the store.
    pub fn from_env() -> Self {
        GuardConfig {
            enabled: parse_bool_env(env::var("BOT_GUARD_ENABLED").ok().as_deref(), true),
            blocked_countries: parse_country_list(
                env::var("BOT_GUARD_BLOCKED_COUNTRIES").ok().as_deref(),
            ),
            blocked_ips: HashSet::new(),
            suspicion_threshold: parse_threshold(
                env::var("BOT_GUARD_SUSPICION_THRESHOLD").ok().as_deref(),
            ),
        }
    }

    /// Loads the persisted snapshot. Returns None when the key is missing,
    /// expired or malformed; the caller keeps its in-memory state (fail-open
    /// on config, never fail-closed).
    pub fn load(store: &impl KeyValueStore) -> Option<GuardConfig> {
        let val = store.get(CONFIG_KEY).ok().flatten()?;
        let stored = serde_json::from_slice::<StoredConfig>(&val).ok()?;
        if stored.expires <= crate::now_ts() {
            let _ = store.delete(CONFIG_KEY);
            return None;
        }
        Some(stored.config)
    }

    /// Persists the full snapshot, pushing the expiry forward.
    pub fn persist(&self, store: &impl KeyValueStore) -> Result<(), ()> {
        let stored = StoredConfig {
            config: self.clone(),
            expires: crate::now_ts() + CONFIG_TTL_SECS,
        };
        let val = serde_json::to_vec(&stored).map_err(|_| ())?;
        store.set(CONFIG_KEY, &val)
    }

    /// Merge semantics for admin writes: only provided fields overwrite.
    /// Country codes are normalized to upper case, the threshold clamped.
    pub fn merge_from(&mut self, update: &ConfigUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(ref countries) = update.blocked_countries {
            self.blocked_countries = countries
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .collect();
        }
        if let Some(threshold) = update.suspicion_threshold {
            self.suspicion_threshold = threshold.min(100);
        }
    }
}
