// src/rules.rs
// Static rule tables for Bot Guard. Compiled into the component, never
// mutated at runtime.

/// Countries the storefront actively sells into. Exposed read-only through
/// the admin API for operator visibility; the decision engine does not treat
/// membership as a veto, so an operator block on one of these countries is
/// still honored.
pub const TARGET_COUNTRIES: [&str; 6] = ["US", "CA", "GB", "DE", "FR", "AU"];

/// Known-good crawler user-agent substrings (lowercase). A match here wins
/// over any suspicious-pattern match.
pub const GOOD_BOTS: [&str; 8] = [
    "googlebot",
    "bingbot",
    "duckduckbot",
    "yandexbot",
    "baiduspider",
    "applebot",
    "facebookexternalhit",
    "twitterbot",
];

/// User-agent substrings (lowercase) that mark scripted clients.
pub const SUSPICIOUS_AGENTS: [&str; 12] = [
    "curl",
    "wget",
    "python",
    "scrapy",
    "go-http-client",
    "java/",
    "libwww",
    "httpclient",
    "okhttp",
    "headless",
    "phantomjs",
    "spider",
];

/// Scraping-prone endpoints: catalog, product and search APIs.
pub const SCRAPING_PATH_PREFIXES: [&str; 3] = ["/api/catalog", "/api/products", "/api/search"];

pub const STATIC_ASSET_PREFIXES: [&str; 2] = ["/static/", "/assets/"];

/// Substring of the storefront session cookie name.
pub const SESSION_COOKIE: &str = "shop_session";

/// Anything shorter than this is not a plausible browser user-agent.
pub const MIN_UA_LENGTH: usize = 10;

pub fn is_target_country(code: &str) -> bool {
    TARGET_COUNTRIES.iter().any(|c| c.eq_ignore_ascii_case(code))
}

pub fn is_good_bot(ua: &str) -> bool {
    let ua = ua.to_ascii_lowercase();
    GOOD_BOTS.iter().any(|b| ua.contains(b))
}

pub fn is_suspicious_agent(ua: &str) -> bool {
    let ua = ua.to_ascii_lowercase();
    SUSPICIOUS_AGENTS.iter().any(|p| ua.contains(p))
}

pub fn is_static_asset(path: &str) -> bool {
    path == "/favicon.ico" || STATIC_ASSET_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub fn is_scraping_path(path: &str) -> bool {
    SCRAPING_PATH_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Paths admitted before any evaluation, with no stats side effects: health
/// probes, static assets and the favicon.
pub fn is_bypass_path(path: &str) -> bool {
    path == "/health" || is_static_asset(path)
}
