// src/lib.rs
// Entry point for the Bot Guard Spin app. Every storefront request passes
// through here before reaching its route handler.

use spin_sdk::http::{Request, Response};
#[cfg(target_arch = "wasm32")]
use spin_sdk::http_component;
use spin_sdk::key_value::Store;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod admin; // Operator config API
pub mod config; // Config loading, env defaults, KV persistence
pub mod decision; // Ordered admission verdict
pub mod fingerprint; // Per-request signal extraction
pub mod rules; // Static lists: target countries, bot agents, paths
pub mod score; // Behavioral suspicion scoring
pub mod state; // In-memory config snapshot + refresh timer
pub mod stats; // Best-effort counters and recent-block ring
pub mod store; // KeyValueStore trait over Spin KV

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod test_support;

/// Seconds since the Unix epoch.
pub(crate) fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Returns true if forwarded IP headers should be trusted for this request.
/// If BOT_GUARD_FORWARDED_IP_SECRET is set, require a matching
/// X-Guard-Forwarded-Secret header.
fn forwarded_ip_trusted(req: &Request) -> bool {
    match env::var("BOT_GUARD_FORWARDED_IP_SECRET") {
        Ok(secret) => req
            .header("x-guard-forwarded-secret")
            .and_then(|v| v.as_str())
            .map(|v| v == secret)
            .unwrap_or(false),
        Err(_) => true,
    }
}

/// Extract the best available client IP from the request. First entry of
/// X-Forwarded-For wins, then X-Real-IP, then the literal "unknown".
pub fn extract_client_ip(req: &Request) -> String {
    if forwarded_ip_trusted(req) {
        if let Some(xff) = req.header("x-forwarded-for").and_then(|v| v.as_str()) {
            if let Some(first) = xff.split(',').next() {
                let first = first.trim();
                if !first.is_empty() && first != "unknown" {
                    return first.to_string();
                }
            }
        }
        if let Some(real_ip) = req.header("x-real-ip").and_then(|v| v.as_str()) {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() && real_ip != "unknown" {
                return real_ip.to_string();
            }
        }
    }
    "unknown".to_string()
}

fn deny_response(reason: decision::DenyReason) -> Response {
    let body = serde_json::json!({
        "error": "Access denied",
        "code": reason.code(),
    });
    Response::builder()
        .status(403)
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .build()
}

/// Main admission handler, invoked for every HTTP request. Applies the
/// checks in fixed order and fails open on any infrastructure error.
pub fn handle_guard_impl(req: &Request) -> Response {
    let path = req.path();

    // Health probes and static assets never go through admission.
    if rules::is_bypass_path(path) {
        return Response::new(200, "OK (admission bypass)");
    }

    // Outside wasm the Spin host is absent and open_default() panics rather
    // than erroring, so treat the store as unavailable there.
    #[cfg(target_arch = "wasm32")]
    let store = Store::open_default().ok();
    #[cfg(not(target_arch = "wasm32"))]
    let store: Option<Store> = None;
    let state = state::global();

    if path.starts_with("/admin/guard") {
        return match store {
            Some(ref store) => admin::handle_admin(req, store, state),
            None => Response::new(500, "Key-value store error"),
        };
    }

    if let Some(ref store) = store {
        state.refresh_if_stale(store);
    }

    let fp = fingerprint::RequestFingerprint::from_request(req);
    let cfg = state.snapshot();

    match decision::evaluate_safely(&cfg, &fp) {
        decision::Verdict::Deny(reason) => {
            if let Some(ref store) = store {
                stats::record_blocked(
                    store,
                    stats::BlockedEntry {
                        ip: fp.ip.clone(),
                        country: fp.country.clone(),
                        reason: reason.code().to_string(),
                        path: fp.path.clone(),
                        ts: now_ts(),
                    },
                );
            }
            println!(
                "[guard] denied {} {} ({})",
                fp.ip,
                fp.path,
                reason.code()
            );
            deny_response(reason)
        }
        decision::Verdict::Admit(decision::AdmitReason::Passed) => {
            if let Some(ref store) = store {
                stats::record_allowed(store, fp.country.as_deref());
            }
            Response::new(200, "OK (request admitted)")
        }
        decision::Verdict::Admit(_) => Response::new(200, "OK (request admitted)"),
    }
}

#[cfg(target_arch = "wasm32")]
#[http_component]
pub fn guard_entrypoint(req: Request) -> Response {
    handle_guard_impl(&req)
}
