// src/admin.rs
// Operator-facing configuration API for Bot Guard. The operator-privilege
// check happens in the caller's admin layer before requests reach these
// routes; this component only validates and applies the changes.

use serde::Deserialize;
use serde_json::json;
use spin_sdk::http::{Method, Request, Response};

use crate::config::{is_iso2, ConfigUpdate};
#[cfg(test)]
use crate::config::GuardConfig;
use crate::rules;
use crate::state::GuardState;
use crate::stats;
use crate::store::KeyValueStore;

const BLOCK_IP_PREFIX: &str = "/admin/guard/block-ip/";

#[derive(Deserialize, Debug)]
struct BlockIpRequest {
    ip: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ToggleRequest {
    enabled: bool,
}

/// Returns true if the path is a valid guard admin endpoint (prevents path
/// traversal/abuse).
fn sanitize_path(path: &str) -> bool {
    matches!(
        path,
        "/admin/guard/stats"
            | "/admin/guard/config"
            | "/admin/guard/block-ip"
            | "/admin/guard/toggle"
            | "/admin/guard/recent-blocks"
    ) || path.starts_with(BLOCK_IP_PREFIX)
}

/// Handles all /admin/guard endpoints:
///   - GET    /admin/guard/stats          — snapshot of counters and config
///   - GET    /admin/guard/config         — full config incl. target countries
///   - PUT    /admin/guard/config         — partial config merge
///   - POST   /admin/guard/block-ip       — add one blocked IP
///   - DELETE /admin/guard/block-ip/:ip   — remove one blocked IP
///   - POST   /admin/guard/toggle         — enable/disable the filter
///   - GET    /admin/guard/recent-blocks  — most recent denied requests
pub fn handle_admin<S: KeyValueStore>(req: &Request, store: &S, state: &GuardState) -> Response {
    let path = req.path();
    if !sanitize_path(path) {
        return Response::new(404, "Not found");
    }

    match (path, req.method()) {
        ("/admin/guard/stats", Method::Get) => handle_stats(store, state),
        ("/admin/guard/config", Method::Get) => handle_get_config(state),
        ("/admin/guard/config", Method::Put) => handle_put_config(req, store, state),
        ("/admin/guard/block-ip", Method::Post) => handle_block_ip(req, store, state),
        ("/admin/guard/toggle", Method::Post) => handle_toggle(req, store, state),
        ("/admin/guard/recent-blocks", Method::Get) => handle_recent_blocks(store),
        (path, Method::Delete) if path.starts_with(BLOCK_IP_PREFIX) => {
            handle_unblock_ip(path, store, state)
        }
        _ => Response::new(405, "Method Not Allowed"),
    }
}

fn json_response(status: u16, body: &serde_json::Value) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .build()
}

fn handle_stats<S: KeyValueStore>(store: &S, state: &GuardState) -> Response {
    let cfg = state.snapshot();
    let blocked = stats::blocked_total(store);
    let allowed = stats::allowed_total(store);
    let total = blocked + allowed;
    let block_rate = if total == 0 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", blocked as f64 * 100.0 / total as f64)
    };
    json_response(
        200,
        &json!({
            "enabled": cfg.enabled,
            "blockedCountries": cfg.blocked_countries.len(),
            "blockedIps": cfg.blocked_ips.len(),
            "suspicionThreshold": cfg.suspicion_threshold,
            "blocked24h": blocked,
            "allowed24h": allowed,
            "blockRate": block_rate,
            "lastRefreshAt": state.last_refresh_at(),
        }),
    )
}

fn handle_get_config(state: &GuardState) -> Response {
    let cfg = state.snapshot();
    let mut blocked_countries: Vec<&String> = cfg.blocked_countries.iter().collect();
    blocked_countries.sort();
    let mut blocked_ips: Vec<&String> = cfg.blocked_ips.iter().collect();
    blocked_ips.sort();
    json_response(
        200,
        &json!({
            "enabled": cfg.enabled,
            "blockedCountries": blocked_countries,
            "blockedIps": blocked_ips,
            "suspicionThreshold": cfg.suspicion_threshold,
            "targetCountries": rules::TARGET_COUNTRIES,
            "lastRefreshAt": state.last_refresh_at(),
        }),
    )
}

fn handle_put_config<S: KeyValueStore>(req: &Request, store: &S, state: &GuardState) -> Response {
    let update: ConfigUpdate = match serde_json::from_slice(req.body()) {
        Ok(update) => update,
        Err(_) => return Response::new(400, "Bad Request: invalid JSON body"),
    };
    if let Some(ref countries) = update.blocked_countries {
        for country in countries {
            if !is_iso2(country.trim()) {
                return Response::new(400, format!("invalid country code: {}", country));
            }
        }
    }
    if let Some(threshold) = update.suspicion_threshold {
        if threshold > 100 {
            return Response::new(400, "suspicionThreshold out of range (0-100)");
        }
    }

    // In-memory first, so the very next request sees the change, then a
    // synchronous persist of the full merged snapshot.
    let before = state.snapshot();
    let merged = state.merge_from(&update);
    if merged.persist(store).is_err() {
        return Response::new(500, "Key-value store error (config not persisted)");
    }

    let significant =
        before.enabled != merged.enabled || before.blocked_countries != merged.blocked_countries;
    if significant {
        eprintln!(
            "[guard] admin config change: enabled={} blocked_countries={}",
            merged.enabled,
            merged.blocked_countries.len()
        );
    } else {
        println!(
            "[guard] admin config change: suspicion_threshold={}",
            merged.suspicion_threshold
        );
    }
    json_response(200, &json!({ "config": merged }))
}

fn handle_block_ip<S: KeyValueStore>(req: &Request, store: &S, state: &GuardState) -> Response {
    let body: BlockIpRequest = match serde_json::from_slice(req.body()) {
        Ok(body) => body,
        Err(_) => return Response::new(400, "Bad Request: invalid JSON body"),
    };
    let ip = body.ip.trim().to_string();
    if ip.is_empty() {
        return Response::new(400, "Bad Request: missing ip");
    }
    let reason = body.reason.unwrap_or_else(|| "manual".to_string());

    let merged = state.update_with(|cfg| {
        cfg.blocked_ips.insert(ip.clone());
    });
    if merged.persist(store).is_err() {
        return Response::new(500, "Key-value store error (config not persisted)");
    }
    eprintln!("[guard] admin blocked ip {} ({})", ip, reason);
    json_response(200, &json!({ "blocked": ip, "reason": reason }))
}

fn handle_unblock_ip<S: KeyValueStore>(path: &str, store: &S, state: &GuardState) -> Response {
    let ip = path.strip_prefix(BLOCK_IP_PREFIX).unwrap_or("").trim();
    if ip.is_empty() {
        return Response::new(400, "Bad Request: missing ip");
    }
    let mut removed = false;
    let merged = state.update_with(|cfg| {
        removed = cfg.blocked_ips.remove(ip);
    });
    if merged.persist(store).is_err() {
        return Response::new(500, "Key-value store error (config not persisted)");
    }
    eprintln!("[guard] admin unblocked ip {} (removed={})", ip, removed);
    json_response(200, &json!({ "unblocked": ip, "removed": removed }))
}

fn handle_toggle<S: KeyValueStore>(req: &Request, store: &S, state: &GuardState) -> Response {
    let body: ToggleRequest = match serde_json::from_slice(req.body()) {
        Ok(body) => body,
        Err(_) => return Response::new(400, "Bad Request: invalid JSON body"),
    };
    let merged = state.update_with(|cfg| {
        cfg.enabled = body.enabled;
    });
    if merged.persist(store).is_err() {
        return Response::new(500, "Key-value store error (config not persisted)");
    }
    eprintln!("[guard] admin toggled filter enabled={}", body.enabled);
    json_response(200, &json!({ "enabled": merged.enabled }))
}

fn handle_recent_blocks<S: KeyValueStore>(store: &S) -> Response {
    json_response(200, &json!({ "blocks": stats::recent_blocks(store) }))
}
