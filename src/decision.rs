// src/decision.rs
// Per-request admission decision: ordered short-circuit checks wrapped in a
// single fail-open boundary. A filtering bug must never become an outage.

use std::net::IpAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};

use ipnet::Ipv4Net;
use once_cell::sync::Lazy;

use crate::config::GuardConfig;
use crate::fingerprint::RequestFingerprint;
use crate::score;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    GeoBlocked,
    IpBlocked,
    Suspicious,
}

impl DenyReason {
    /// Wire code surfaced in the 403 body.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::GeoBlocked => "GEO_BLOCKED",
            DenyReason::IpBlocked => "IP_BLOCKED",
            DenyReason::Suspicious => "SUSPICIOUS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitReason {
    /// Filter globally disabled.
    Disabled,
    /// Loopback or RFC1918 client address.
    InternalNetwork,
    /// Passed every check; the only admit counted toward allowed stats.
    Passed,
    /// Evaluation error swallowed (fail-open).
    FailOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit(AdmitReason),
    Deny(DenyReason),
}

static PRIVATE_NETS: Lazy<[Ipv4Net; 3]> = Lazy::new(|| {
    [
        "10.0.0.0/8".parse().unwrap(),
        "172.16.0.0/12".parse().unwrap(),
        "192.168.0.0/16".parse().unwrap(),
    ]
});

/// Loopback and RFC1918 ranges are trusted infrastructure: internal health
/// probes, or a reverse-proxy hop that failed to forward a public address.
pub fn is_internal_ip(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_loopback() || PRIVATE_NETS.iter().any(|net| net.contains(&v4)),
        Ok(IpAddr::V6(v6)) => v6.is_loopback(),
        Err(_) => false,
    }
}

/// Ordered evaluation, terminal on the first matching branch. Bypass paths
/// never reach this function; the router admits them without stats.
pub fn evaluate(cfg: &GuardConfig, fp: &RequestFingerprint) -> Verdict {
    if !cfg.enabled {
        return Verdict::Admit(AdmitReason::Disabled);
    }
    if is_internal_ip(&fp.ip) {
        return Verdict::Admit(AdmitReason::InternalNetwork);
    }
    if let Some(country) = fp.country.as_deref() {
        if cfg.blocked_countries.contains(country) {
            return Verdict::Deny(DenyReason::GeoBlocked);
        }
    }
    if cfg.blocked_ips.contains(fp.ip.as_str()) {
        return Verdict::Deny(DenyReason::IpBlocked);
    }
    if score::suspicion_score(cfg, fp) >= cfg.suspicion_threshold {
        return Verdict::Deny(DenyReason::Suspicious);
    }
    Verdict::Admit(AdmitReason::Passed)
}

/// Fail-open boundary around the whole evaluation: any panic inside the
/// checks admits the request and is logged, never surfaced to the client.
pub fn evaluate_safely(cfg: &GuardConfig, fp: &RequestFingerprint) -> Verdict {
    match catch_unwind(AssertUnwindSafe(|| evaluate(cfg, fp))) {
        Ok(verdict) => verdict,
        Err(_) => {
            eprintln!(
                "[guard] evaluation panicked for ip {} on {}; admitting",
                fp.ip, fp.path
            );
            Verdict::Admit(AdmitReason::FailOpen)
        }
    }
}
