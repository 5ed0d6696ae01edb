// Call target normalization
//
// Callers may name the target of an outbound call in several shapes: a bare
// address string, a parsed `url::Url`, a `RequestOptions` structure, or an
// address/URL paired with options that override method and headers. All of
// them are normalized once, at the boundary, into a `RequestDescriptor`.
//
// Examples:
//   "https://api.example.com/v1/items?page=2"
//   Url::parse("http://localhost:8080/health")
//   RequestOptions::new().method("POST").hostname("svc.internal").path("/ingest")

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Transport flavor of an entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain transport
    Http,
    /// Encrypted transport
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    fn from_url_scheme(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured call options
///
/// Every field is optional; missing values fall back to `GET`, `localhost`,
/// the entry point's scheme and `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: Option<String>,
    pub scheme: Option<Scheme>,
    pub hostname: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }
}

/// Every accepted call shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Bare address string
    Address(String),
    /// Parsed URL
    Url(Url),
    /// Options structure
    Options(RequestOptions),
    /// Address string followed by options
    AddressWithOptions(String, RequestOptions),
    /// URL followed by options
    UrlWithOptions(Url, RequestOptions),
}

impl From<&str> for CallTarget {
    fn from(s: &str) -> Self {
        CallTarget::Address(s.to_string())
    }
}

impl From<String> for CallTarget {
    fn from(s: String) -> Self {
        CallTarget::Address(s)
    }
}

impl From<Url> for CallTarget {
    fn from(url: Url) -> Self {
        CallTarget::Url(url)
    }
}

impl From<RequestOptions> for CallTarget {
    fn from(options: RequestOptions) -> Self {
        CallTarget::Options(options)
    }
}

impl From<(&str, RequestOptions)> for CallTarget {
    fn from((s, options): (&str, RequestOptions)) -> Self {
        CallTarget::AddressWithOptions(s.to_string(), options)
    }
}

impl From<(Url, RequestOptions)> for CallTarget {
    fn from((url, options): (Url, RequestOptions)) -> Self {
        CallTarget::UrlWithOptions(url, options)
    }
}

/// Normalized request description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Upper-cased HTTP method
    pub method: String,
    pub scheme: Scheme,
    pub host: String,
    /// Explicit port, `None` for the scheme default
    pub port: Option<u16>,
    /// Path plus query string, always starting with `/`
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Best-effort descriptor used when a target cannot be resolved
    pub fn fallback(scheme: Scheme) -> Self {
        Self {
            method: "GET".to_string(),
            scheme,
            host: "localhost".to_string(),
            port: None,
            path: "/".to_string(),
            headers: BTreeMap::new(),
        }
    }

    /// `scheme://host[:port]/path?query`
    pub fn url(&self) -> String {
        match self.port {
            Some(port) if port != self.scheme.default_port() => {
                format!("{}://{}:{}{}", self.scheme, self.host, port, self.path)
            }
            _ => format!("{}://{}{}", self.scheme, self.host, self.path),
        }
    }
}

/// Call target resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

impl CallTarget {
    /// Normalize into a descriptor, with `entry` as the scheme used when the
    /// target does not carry one itself
    pub fn resolve(&self, entry: Scheme) -> Result<RequestDescriptor, TargetError> {
        match self {
            CallTarget::Address(address) => from_url(&parse_address(address)?, None),
            CallTarget::Url(url) => from_url(url, None),
            CallTarget::Options(options) => Ok(from_options(options, entry)),
            CallTarget::AddressWithOptions(address, options) => {
                from_url(&parse_address(address)?, Some(options))
            }
            CallTarget::UrlWithOptions(url, options) => from_url(url, Some(options)),
        }
    }

    /// Like [`resolve`](Self::resolve), but never fails
    ///
    /// Used for logging metadata only: an unresolvable target yields the
    /// fallback descriptor and the call goes ahead untouched.
    pub fn resolve_lossy(&self, entry: Scheme) -> RequestDescriptor {
        self.resolve(entry).unwrap_or_else(|e| {
            tracing::debug!("call target resolution fell back to defaults: {}", e);
            RequestDescriptor::fallback(entry)
        })
    }

    /// Scheme named by the target, if any
    pub fn scheme_hint(&self) -> Option<Scheme> {
        match self {
            CallTarget::Address(address) | CallTarget::AddressWithOptions(address, _) => {
                Url::parse(address)
                    .ok()
                    .and_then(|u| Scheme::from_url_scheme(u.scheme()))
            }
            CallTarget::Url(url) | CallTarget::UrlWithOptions(url, _) => {
                Scheme::from_url_scheme(url.scheme())
            }
            CallTarget::Options(options) => options.scheme,
        }
    }
}

fn parse_address(address: &str) -> Result<Url, TargetError> {
    Url::parse(address).map_err(|e| TargetError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn normalize_method(method: Option<&String>) -> String {
    method
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "GET".to_string())
}

fn from_url(url: &Url, options: Option<&RequestOptions>) -> Result<RequestDescriptor, TargetError> {
    let scheme = Scheme::from_url_scheme(url.scheme())
        .ok_or_else(|| TargetError::UnsupportedScheme(url.scheme().to_string()))?;

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => options
            .and_then(|o| o.hostname.clone().or_else(|| o.host.clone()))
            .ok_or_else(|| TargetError::MissingHost(url.to_string()))?,
    };

    let mut path = url.path().to_string();
    if path.is_empty() {
        path.push('/');
    }
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    Ok(RequestDescriptor {
        method: normalize_method(options.and_then(|o| o.method.as_ref())),
        scheme,
        host,
        port: url.port().or_else(|| options.and_then(|o| o.port)),
        path,
        headers: options.map(|o| o.headers.clone()).unwrap_or_default(),
    })
}

fn from_options(options: &RequestOptions, entry: Scheme) -> RequestDescriptor {
    let path = match options.path.as_deref() {
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) if !p.is_empty() => format!("/{}", p),
        _ => "/".to_string(),
    };

    RequestDescriptor {
        method: normalize_method(options.method.as_ref()),
        scheme: options.scheme.unwrap_or(entry),
        host: options
            .hostname
            .clone()
            .or_else(|| options.host.clone())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string()),
        port: options.port,
        path,
        headers: options.headers.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_string() {
        let target = CallTarget::from("https://api.example.com/v1/items?page=2");
        let d = target.resolve(Scheme::Http).unwrap();
        assert_eq!(d.method, "GET");
        assert_eq!(d.scheme, Scheme::Https);
        assert_eq!(d.host, "api.example.com");
        assert_eq!(d.path, "/v1/items?page=2");
        assert_eq!(d.url(), "https://api.example.com/v1/items?page=2");
    }

    #[test]
    fn test_url_value_keeps_non_default_port() {
        let url = Url::parse("http://localhost:8080/health").unwrap();
        let d = CallTarget::from(url).resolve(Scheme::Http).unwrap();
        assert_eq!(d.port, Some(8080));
        assert_eq!(d.url(), "http://localhost:8080/health");
    }

    #[test]
    fn test_options_defaults() {
        let d = CallTarget::from(RequestOptions::new()).resolve(Scheme::Https).unwrap();
        assert_eq!(d, RequestDescriptor::fallback(Scheme::Https));
        assert_eq!(d.url(), "https://localhost/");
    }

    #[test]
    fn test_options_hostname_wins_over_host() {
        let options = RequestOptions::new()
            .method("post")
            .host("ignored.example")
            .hostname("svc.internal")
            .path("ingest");
        let d = CallTarget::from(options).resolve(Scheme::Http).unwrap();
        assert_eq!(d.method, "POST");
        assert_eq!(d.host, "svc.internal");
        assert_eq!(d.path, "/ingest");
    }

    #[test]
    fn test_address_with_options_overrides_method_and_headers() {
        let options = RequestOptions::new()
            .method("DELETE")
            .header("Authorization", "Bearer t");
        let d = CallTarget::from(("http://example.com/x", options))
            .resolve(Scheme::Http)
            .unwrap();
        assert_eq!(d.method, "DELETE");
        assert_eq!(d.headers.get("authorization").map(String::as_str), Some("Bearer t"));
    }

    #[test]
    fn test_invalid_address_is_an_error() {
        let err = CallTarget::from("not a url").resolve(Scheme::Http).unwrap_err();
        assert!(matches!(err, TargetError::InvalidAddress { .. }));
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = CallTarget::from("ftp://files.example.com/a")
            .resolve(Scheme::Http)
            .unwrap_err();
        assert_eq!(err, TargetError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn test_resolve_lossy_falls_back() {
        let d = CallTarget::from("::::").resolve_lossy(Scheme::Https);
        assert_eq!(d.url(), "https://localhost/");
    }

    #[test]
    fn test_scheme_hint() {
        assert_eq!(CallTarget::from("https://a.b/").scheme_hint(), Some(Scheme::Https));
        assert_eq!(CallTarget::from(RequestOptions::new()).scheme_hint(), None);
        assert_eq!(
            CallTarget::from(RequestOptions::new().scheme(Scheme::Http)).scheme_hint(),
            Some(Scheme::Http)
        );
    }
}
