// src/state.rs
// Process-wide guard state and the time-gated refresh protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::config::{ConfigUpdate, GuardConfig};
use crate::store::KeyValueStore;

/// How long an in-memory snapshot may serve requests before the next store
/// round-trip is attempted.
pub const REFRESH_INTERVAL_SECS: u64 = 60;

pub struct GuardState {
    config: RwLock<GuardConfig>,
    /// Unix timestamp of the last refresh attempt. Zero forces a refresh on
    /// the first request after process start.
    last_refresh: AtomicU64,
}

impl GuardState {
    pub fn seeded_from_env() -> Self {
        GuardState::with_config(GuardConfig::from_env())
    }

    pub fn with_config(config: GuardConfig) -> Self {
        GuardState {
            config: RwLock::new(config),
            last_refresh: AtomicU64::new(0),
        }
    }

    /// Whole-snapshot read for a single request's evaluation: no torn reads
    /// across a concurrent refresh or admin write.
    pub fn snapshot(&self) -> GuardConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wholesale replace of all fields (periodic refresh path).
    pub fn replace_from(&self, snapshot: GuardConfig) {
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
    }

    /// Partial-field merge (admin write path). Returns the merged snapshot
    /// so the caller can persist the full config afterwards.
    pub fn merge_from(&self, update: &ConfigUpdate) -> GuardConfig {
        let mut cfg = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cfg.merge_from(update);
        cfg.clone()
    }

    /// In-place mutation under the write lock (block-ip add/remove, toggle).
    /// Returns the new snapshot for persistence.
    pub fn update_with<F: FnOnce(&mut GuardConfig)>(&self, f: F) -> GuardConfig {
        let mut cfg = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut cfg);
        cfg.clone()
    }

    pub fn last_refresh_at(&self) -> u64 {
        self.last_refresh.load(Ordering::Relaxed)
    }

    /// Time-gated refresh. The timer is stamped before the load, so a failed
    /// or empty refresh still resets it and a down store is not hammered on
    /// every request. Failure leaves the in-memory snapshot untouched.
    pub fn refresh_if_stale(&self, store: &impl KeyValueStore) {
        let now = crate::now_ts();
        let last = self.last_refresh.load(Ordering::Relaxed);
        if now.saturating_sub(last) <= REFRESH_INTERVAL_SECS && last != 0 {
            return;
        }
        self.last_refresh.store(now, Ordering::Relaxed);
        if let Some(snapshot) = GuardConfig::load(store) {
            self.replace_from(snapshot);
        } else {
            println!("[config] refresh found no usable snapshot; keeping in-memory state");
        }
    }
}

/// Singleton used by the HTTP entrypoint. Evaluation and admin code take
/// `&GuardState` explicitly so tests can construct their own.
pub fn global() -> &'static GuardState {
    static STATE: Lazy<GuardState> = Lazy::new(GuardState::seeded_from_env);
    &STATE
}
