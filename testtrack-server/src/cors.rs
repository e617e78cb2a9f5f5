//! CORS for the local service: browser-based SDKs on a dev machine need
//! to reach this from whatever origin their dev server happens to run on,
//! so the allow-list is permissive by default and tightened only when the
//! operator names specific origins.

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// `TESTTRACK_ALLOWED_ORIGINS` is a comma-separated substring allow-list.
/// When it's empty, loopback addresses, `localhost`, and the `.test` TLD
/// are allowed — the set a local dev toolchain actually uses.
pub fn layer(allowed_origins: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_origin(AllowOrigin::predicate(move |origin, _parts| {
            origin_allowed(origin, &allowed_origins)
        }))
}

fn origin_allowed(origin: &HeaderValue, allowed_origins: &[String]) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };

    if !allowed_origins.is_empty() {
        return allowed_origins.iter().any(|allowed| !allowed.is_empty() && origin.contains(allowed.as_str()));
    }

    origin.contains("localhost") || origin.contains("127.0.0.1") || origin.contains("[::1]") || origin.contains(".test")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_against_configured_list() {
        let allowed = vec!["example.com".to_string()];
        assert!(origin_allowed(&HeaderValue::from_static("https://app.example.com"), &allowed));
        assert!(!origin_allowed(&HeaderValue::from_static("https://evil.com"), &allowed));
    }

    #[test]
    fn falls_back_to_loopback_and_dot_test_when_unconfigured() {
        assert!(origin_allowed(&HeaderValue::from_static("http://localhost:3000"), &[]));
        assert!(origin_allowed(&HeaderValue::from_static("http://127.0.0.1:3000"), &[]));
        assert!(origin_allowed(&HeaderValue::from_static("http://myapp.test"), &[]));
        assert!(!origin_allowed(&HeaderValue::from_static("https://example.com"), &[]));
    }
}
