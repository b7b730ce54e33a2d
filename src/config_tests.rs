// src/config_tests.rs
// Unit tests for config defaults, env parsing, persistence, and refresh

#[cfg(test)]
mod tests {
    use crate::config::{
        is_iso2, parse_country_list, parse_threshold, ConfigUpdate, GuardConfig, CONFIG_KEY,
    };
    use crate::state::GuardState;
    use crate::store::KeyValueStore;
    use crate::test_support::{lock_env, FailingStore, InMemoryStore};
    use std::collections::HashSet;
    use std::env;

    fn clear_guard_env() {
        env::remove_var("BOT_GUARD_ENABLED");
        env::remove_var("BOT_GUARD_BLOCKED_COUNTRIES");
        env::remove_var("BOT_GUARD_SUSPICION_THRESHOLD");
    }

    #[test]
    fn env_defaults_apply_when_nothing_is_set() {
        let _guard = lock_env();
        clear_guard_env();
        let cfg = GuardConfig::from_env();
        assert!(cfg.enabled);
        assert_eq!(cfg.blocked_countries, HashSet::from(["CN".to_string()]));
        assert!(cfg.blocked_ips.is_empty());
        assert_eq!(cfg.suspicion_threshold, 80);
    }

    #[test]
    fn env_overrides_are_honored() {
        let _guard = lock_env();
        clear_guard_env();
        env::set_var("BOT_GUARD_ENABLED", "false");
        env::set_var("BOT_GUARD_BLOCKED_COUNTRIES", "ru, ir ,kp");
        env::set_var("BOT_GUARD_SUSPICION_THRESHOLD", "65");
        let cfg = GuardConfig::from_env();
        assert!(!cfg.enabled);
        assert_eq!(
            cfg.blocked_countries,
            HashSet::from(["RU".to_string(), "IR".to_string(), "KP".to_string()])
        );
        assert_eq!(cfg.suspicion_threshold, 65);
        clear_guard_env();
    }

    #[test]
    fn threshold_parsing_clamps_and_defaults() {
        assert_eq!(parse_threshold(None), 80);
        assert_eq!(parse_threshold(Some("not a number")), 80);
        assert_eq!(parse_threshold(Some("0")), 0);
        assert_eq!(parse_threshold(Some("150")), 100);
    }

    #[test]
    fn country_list_parsing_normalizes_and_filters() {
        let parsed = parse_country_list(Some("us, gb ,,XX1,de"));
        assert_eq!(
            parsed,
            HashSet::from(["US".to_string(), "GB".to_string(), "DE".to_string()])
        );
        // An empty or all-invalid list falls back to the default.
        assert_eq!(
            parse_country_list(Some(",,,")),
            HashSet::from(["CN".to_string()])
        );
        assert_eq!(parse_country_list(None), HashSet::from(["CN".to_string()]));
    }

    #[test]
    fn iso2_check_requires_two_ascii_letters() {
        assert!(is_iso2("US"));
        assert!(is_iso2("de"));
        assert!(!is_iso2("USA"));
        assert!(!is_iso2("U"));
        assert!(!is_iso2("1A"));
        assert!(!is_iso2(""));
    }

    #[test]
    fn merge_applies_only_provided_fields() {
        let mut cfg = GuardConfig {
            enabled: true,
            blocked_countries: HashSet::from(["CN".to_string()]),
            blocked_ips: HashSet::from(["203.0.113.5".to_string()]),
            suspicion_threshold: 80,
        };
        cfg.merge_from(&ConfigUpdate {
            enabled: None,
            blocked_countries: Some(vec!["ru".to_string(), " ir ".to_string()]),
            suspicion_threshold: None,
        });
        assert!(cfg.enabled);
        assert_eq!(
            cfg.blocked_countries,
            HashSet::from(["RU".to_string(), "IR".to_string()])
        );
        // Blocked IPs are never carried in an update; they survive merges.
        assert!(cfg.blocked_ips.contains("203.0.113.5"));
        assert_eq!(cfg.suspicion_threshold, 80);

        cfg.merge_from(&ConfigUpdate {
            enabled: Some(false),
            blocked_countries: None,
            suspicion_threshold: Some(150),
        });
        assert!(!cfg.enabled);
        assert_eq!(cfg.suspicion_threshold, 100);
    }

    #[test]
    fn persist_then_load_round_trips_with_wire_field_names() {
        let store = InMemoryStore::default();
        let cfg = GuardConfig {
            enabled: false,
            blocked_countries: HashSet::from(["RU".to_string()]),
            blocked_ips: HashSet::from(["203.0.113.5".to_string()]),
            suspicion_threshold: 42,
        };
        cfg.persist(&store).unwrap();

        let raw = store.get(CONFIG_KEY).unwrap().unwrap();
        let blob: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(blob.get("enabled"), Some(&serde_json::json!(false)));
        assert_eq!(blob.get("suspicionThreshold"), Some(&serde_json::json!(42)));
        assert_eq!(
            blob.get("blockedIps"),
            Some(&serde_json::json!(["203.0.113.5"]))
        );
        let expires = blob.get("expires").and_then(|v| v.as_u64()).unwrap();
        assert!(expires > crate::now_ts());

        assert_eq!(GuardConfig::load(&store), Some(cfg));
    }

    #[test]
    fn expired_snapshot_is_discarded() {
        let store = InMemoryStore::default();
        let blob = serde_json::json!({
            "enabled": true,
            "blockedCountries": ["CN"],
            "blockedIps": [],
            "suspicionThreshold": 80,
            "expires": 1,
        });
        store.set(CONFIG_KEY, blob.to_string().as_bytes()).unwrap();
        assert_eq!(GuardConfig::load(&store), None);
        // Expired blobs are cleaned up on read.
        assert_eq!(store.get(CONFIG_KEY).unwrap(), None);
    }

    #[test]
    fn malformed_snapshot_is_discarded() {
        let store = InMemoryStore::default();
        store.set(CONFIG_KEY, b"{ not json").unwrap();
        assert_eq!(GuardConfig::load(&store), None);
    }

    #[test]
    fn refresh_replaces_the_whole_snapshot() {
        let store = InMemoryStore::default();
        let persisted = GuardConfig {
            enabled: true,
            blocked_countries: HashSet::from(["RU".to_string()]),
            blocked_ips: HashSet::from(["203.0.113.5".to_string()]),
            suspicion_threshold: 55,
        };
        persisted.persist(&store).unwrap();

        let state = GuardState::with_config(GuardConfig {
            enabled: false,
            blocked_countries: HashSet::from(["CN".to_string()]),
            blocked_ips: HashSet::new(),
            suspicion_threshold: 80,
        });
        state.refresh_if_stale(&store);
        assert_eq!(state.snapshot(), persisted);
        assert!(state.last_refresh_at() > 0);
    }

    #[test]
    fn failed_refresh_keeps_state_and_stamps_the_timer() {
        let state = GuardState::with_config(GuardConfig {
            enabled: true,
            blocked_countries: HashSet::from(["CN".to_string()]),
            blocked_ips: HashSet::from(["203.0.113.5".to_string()]),
            suspicion_threshold: 80,
        });
        let before = state.snapshot();
        state.refresh_if_stale(&FailingStore);
        // In-memory state is untouched; the timer still advances so a
        // broken store is not hammered on every request.
        assert_eq!(state.snapshot(), before);
        assert!(state.last_refresh_at() > 0);
    }

    #[test]
    fn refresh_within_the_interval_is_skipped() {
        let store = InMemoryStore::default();
        let state = GuardState::with_config(GuardConfig {
            enabled: true,
            blocked_countries: HashSet::from(["CN".to_string()]),
            blocked_ips: HashSet::new(),
            suspicion_threshold: 80,
        });
        state.refresh_if_stale(&store);
        let stamped = state.last_refresh_at();

        // Persist a different snapshot; a second refresh inside the
        // interval must not pick it up.
        let other = GuardConfig {
            enabled: false,
            blocked_countries: HashSet::from(["RU".to_string()]),
            blocked_ips: HashSet::new(),
            suspicion_threshold: 10,
        };
        other.persist(&store).unwrap();
        state.refresh_if_stale(&store);
        assert_ne!(state.snapshot(), other);
        assert_eq!(state.last_refresh_at(), stamped);
    }
}
