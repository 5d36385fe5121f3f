//! Server endpoint derivation
//!
//! Every session derives its server endpoint the same way: an explicit
//! override wins, a local page host maps to the local server, anything
//! else talks to the gateway on the page's own host.

/// Port the gateway listens on when no override is given
pub const DEFAULT_PORT: u16 = 5000;

/// Derive the HTTP endpoint for a session.
///
/// `override_url` comes from configuration (e.g. an env var) and wins
/// outright when non-empty. Otherwise `localhost` and `127.0.0.1` page
/// hosts resolve to the local gateway, and any other hostname keeps its
/// host with the default port.
pub fn derive_endpoint(override_url: Option<&str>, hostname: &str) -> String {
    if let Some(url) = override_url {
        let url = url.trim();
        if !url.is_empty() {
            return url.trim_end_matches('/').to_string();
        }
    }

    if hostname == "localhost" || hostname == "127.0.0.1" {
        return format!("http://localhost:{}", DEFAULT_PORT);
    }

    format!("http://{}:{}", hostname, DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(
            derive_endpoint(Some("https://api.example.com"), "menus.example.com"),
            "https://api.example.com"
        );
        // Trailing slash is normalized
        assert_eq!(
            derive_endpoint(Some("https://api.example.com/"), "localhost"),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_blank_override_is_ignored() {
        assert_eq!(
            derive_endpoint(Some("  "), "localhost"),
            "http://localhost:5000"
        );
        assert_eq!(derive_endpoint(None, "127.0.0.1"), "http://localhost:5000");
    }

    #[test]
    fn test_remote_host_keeps_hostname() {
        assert_eq!(
            derive_endpoint(None, "menus.example.com"),
            "http://menus.example.com:5000"
        );
    }
}
