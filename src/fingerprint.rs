// src/fingerprint.rs
// Per-request signals consumed by the scorer and the decision engine.
// Nothing here survives the request.

use spin_sdk::http::Request;

use crate::rules;

#[derive(Debug, Clone)]
pub struct RequestFingerprint {
    pub ip: String,
    /// Upper-cased ISO-2 code from the edge-provided X-Geo-Country header.
    pub country: Option<String>,
    pub user_agent: String,
    pub path: String,
    pub accept_language: Option<String>,
    pub has_session: bool,
}

impl RequestFingerprint {
    pub fn from_request(req: &Request) -> Self {
        let country = req
            .header("x-geo-country")
            .and_then(|v| v.as_str())
            .map(|v| v.trim().to_ascii_uppercase())
            .filter(|v| !v.is_empty());
        let user_agent = req
            .header("user-agent")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let accept_language = req
            .header("accept-language")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .filter(|v| !v.is_empty());
        let has_session = req
            .header("cookie")
            .and_then(|v| v.as_str())
            .map(|c| c.contains(rules::SESSION_COOKIE))
            .unwrap_or(false);
        RequestFingerprint {
            ip: crate::extract_client_ip(req),
            country,
            user_agent,
            path: req.path().to_string(),
            accept_language,
            has_session,
        }
    }
}
