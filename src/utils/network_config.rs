//! Endpoint URL validation
//!
//! Both the JSON-RPC provider and the signing oracle are reached over
//! HTTP. Remote endpoints must use TLS; plain HTTP is accepted only for
//! loopback hosts (a local devnet or a locally running oracle).

use url::{Host, Url};

/// Validation result for an endpoint URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointValidation {
    pub is_valid: bool,
    pub url: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl EndpointValidation {
    fn rejected(error: String) -> Self {
        Self {
            is_valid: false,
            url: None,
            warnings: Vec::new(),
            errors: vec![error],
        }
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Validate an RPC or oracle endpoint URL
pub fn validate_endpoint(url: &str) -> EndpointValidation {
    let parsed = match Url::parse(url.trim()) {
        Ok(u) => u,
        Err(e) => return EndpointValidation::rejected(format!("Invalid URL format: {}", e)),
    };

    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    match parsed.scheme() {
        "https" => {}
        "http" if is_loopback(&parsed) => {
            warnings.push("HTTP allowed for loopback endpoints only".to_string());
        }
        "http" => errors.push("HTTPS required for remote endpoints".to_string()),
        other => errors.push(format!("Unsupported URL scheme: {}", other)),
    }

    if parsed.host().is_none() {
        errors.push("URL has no host".to_string());
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        warnings.push("Credentials in URL; make sure the URL is not logged".to_string());
    }

    if let Some(query) = parsed.query() {
        let query = query.to_ascii_lowercase();
        if query.contains("apikey") || query.contains("api_key") {
            warnings.push("API key in URL query string; make sure the URL is not logged".to_string());
        }
    }

    let is_valid = errors.is_empty();
    EndpointValidation {
        is_valid,
        url: is_valid.then(|| parsed.to_string()),
        warnings,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_endpoint_is_valid() {
        let result = validate_endpoint("https://ethereum-sepolia.publicnode.com");
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_remote_http_rejected() {
        let result = validate_endpoint("http://rpc.example.com");
        assert!(!result.is_valid);
        assert!(result.url.is_none());
    }

    #[test]
    fn test_loopback_http_allowed() {
        for url in ["http://localhost:8545", "http://127.0.0.1:8545", "http://[::1]:4943"] {
            let result = validate_endpoint(url);
            assert!(result.is_valid, "{}", url);
            assert!(!result.warnings.is_empty());
        }
    }

    #[test]
    fn test_malformed_and_unsupported() {
        assert!(!validate_endpoint("not a url").is_valid);
        assert!(!validate_endpoint("ftp://example.com").is_valid);
    }

    #[test]
    fn test_api_key_in_query_warns() {
        let result = validate_endpoint("https://rpc.example.com/v1?apikey=abc");
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
