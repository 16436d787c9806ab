//! HTTP route handlers, one module per API area.

pub mod audio;
pub mod auth;
pub mod convert;
pub mod history;
pub mod sessions;
pub mod templates;
pub mod text;
pub mod tts;

use axum::http::HeaderMap;

/// Client identifier for login throttling: first hop of
/// `x-forwarded-for`, then `x-real-ip`, then a fixed fallback.
pub(crate) fn client_identifier(headers: &HeaderMap) -> String {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };
    from_header("x-forwarded-for")
        .or_else(|| from_header("x-real-ip"))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_chain_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(client_identifier(&headers), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_identifier(&headers), "198.51.100.4");
        assert_eq!(client_identifier(&HeaderMap::new()), "unknown");
    }
}
