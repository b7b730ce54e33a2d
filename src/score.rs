// src/score.rs
// Behavioral suspicion scoring: independent weighted signals, clamped to
// 100. Heuristic by design; false positives are a tunable trade-off, not a
// defect, and the threshold is operator-adjustable.

use crate::config::GuardConfig;
use crate::fingerprint::RequestFingerprint;
use crate::rules;

pub const WEIGHT_NO_ACCEPT_LANGUAGE: u8 = 30;
pub const WEIGHT_SUSPICIOUS_AGENT: u8 = 20;
pub const WEIGHT_NO_SESSION: u8 = 15;
pub const WEIGHT_OFF_TARGET_COUNTRY: u8 = 10;
pub const WEIGHT_SCRAPING_PATH: u8 = 10;

/// Returns a suspicion score in [0, 100]. All applicable signals add; none
/// are mutually exclusive. A globally disabled filter always scores 0.
pub fn suspicion_score(cfg: &GuardConfig, fp: &RequestFingerprint) -> u8 {
    if !cfg.enabled {
        return 0;
    }
    let mut score: u32 = 0;
    if fp.accept_language.is_none() {
        score += WEIGHT_NO_ACCEPT_LANGUAGE as u32;
    }
    if agent_is_suspicious(&fp.user_agent) {
        score += WEIGHT_SUSPICIOUS_AGENT as u32;
    }
    if !fp.has_session && fp.path != "/" && !rules::is_static_asset(&fp.path) {
        score += WEIGHT_NO_SESSION as u32;
    }
    if let Some(country) = fp.country.as_deref() {
        if !rules::is_target_country(country) {
            score += WEIGHT_OFF_TARGET_COUNTRY as u32;
        }
    }
    if rules::is_scraping_path(&fp.path) {
        score += WEIGHT_SCRAPING_PATH as u32;
    }
    score.min(100) as u8
}

/// A too-short user-agent is suspicious no matter what the pattern lists
/// say; otherwise the good-bot allowlist wins over the suspicious list.
pub(crate) fn agent_is_suspicious(ua: &str) -> bool {
    if ua.len() < rules::MIN_UA_LENGTH {
        return true;
    }
    if rules::is_good_bot(ua) {
        return false;
    }
    rules::is_suspicious_agent(ua)
}
