use crate::error::{Result, ScanError};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::timeout;
use url::Url;

/// Hostname -> address lookup.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> impl Future<Output = Result<IpAddr>> + Send;
}

/// Uses the operating system resolver. IPv4 answers win over IPv6 when
/// both come back.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        let addrs: Vec<IpAddr> = timeout(self.timeout, lookup_host((host, 0)))
            .await
            .map_err(|_| ScanError::Timeout {
                host: host.to_string(),
                after: self.timeout,
            })?
            .map_err(|e| ScanError::Resolve {
                host: host.to_string(),
                reason: e.to_string(),
            })?
            .map(|sock| sock.ip())
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ScanError::Resolve {
                host: host.to_string(),
                reason: "no addresses returned".to_string(),
            })
    }
}

/// Fixed host table. Anything not listed fails to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, host: &str, ip: IpAddr) -> Self {
        self.entries.insert(host.to_ascii_lowercase(), ip);
        self
    }
}

impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        self.entries
            .get(&host.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ScanError::Resolve {
                host: host.to_string(),
                reason: "not in host table".to_string(),
            })
    }
}

/// Where a URL sits relative to the root domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    Internal,
    External,
    Unknown,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            HostKind::Internal => "internal",
            HostKind::External => "external",
            HostKind::Unknown => "unknown",
        })
    }
}

/// Hostname of an absolute URL, lower-cased.
pub fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Hostname of a bare domain such as `example.com`.
pub fn domain_host(domain: &str) -> Option<String> {
    url_host(&format!("https://{}", domain))
}

/// True when `host` is `root` or one of its subdomains. Matches whole
/// labels: `notexample.com` is not under `example.com`.
pub fn is_under_domain(host: &str, root: &str) -> bool {
    let host = host.trim_end_matches('.').as_bytes();
    let root = root.trim_end_matches('.').as_bytes();
    if root.is_empty() || host.len() < root.len() {
        return false;
    }
    let split = host.len() - root.len();
    host[split..].eq_ignore_ascii_case(root) && (split == 0 || host[split - 1] == b'.')
}

pub fn classify(url: &str, root_domain: &str) -> HostKind {
    match (url_host(url), domain_host(root_domain)) {
        (Some(host), Some(root)) if is_under_domain(&host, &root) => HostKind::Internal,
        (Some(_), Some(_)) => HostKind::External,
        _ => HostKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn classify_same_host_and_subdomains_as_internal() {
        assert_eq!(classify("https://example.com/about", "example.com"), HostKind::Internal);
        assert_eq!(classify("http://blog.example.com/", "example.com"), HostKind::Internal);
        assert_eq!(classify("https://A.Example.COM/x", "example.com"), HostKind::Internal);
    }

    #[test]
    fn classify_label_suffix_not_substring() {
        assert_eq!(classify("https://notexample.com/", "example.com"), HostKind::External);
        assert_eq!(classify("https://example.com.evil.io/", "example.com"), HostKind::External);
        assert_eq!(classify("https://other.org/", "example.com"), HostKind::External);
    }

    #[test]
    fn classify_unparsable_as_unknown() {
        assert_eq!(classify("not a url", "example.com"), HostKind::Unknown);
        assert_eq!(classify("https://example.com/", "exa mple.com"), HostKind::Unknown);
    }

    #[tokio::test]
    async fn system_lookup_past_its_budget_is_a_timeout() {
        let resolver = SystemResolver::new(Duration::ZERO);
        let err = resolver.resolve("slow.scout-test.invalid").await.unwrap_err();
        assert!(
            matches!(&err, ScanError::Timeout { host, after } if host == "slow.scout-test.invalid" && *after == Duration::ZERO),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn kind_labels_fit_the_type_column() {
        for kind in [HostKind::Internal, HostKind::External, HostKind::Unknown] {
            assert!(kind.to_string().len() <= 8);
        }
    }

    #[tokio::test]
    async fn static_resolver_is_case_insensitive() {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let resolver = StaticResolver::new().with_entry("WWW.example.test", ip);
        assert_eq!(resolver.resolve("www.EXAMPLE.test").await.unwrap(), ip);
        assert!(resolver.resolve("mail.example.test").await.is_err());
    }

    #[tokio::test]
    async fn system_resolver_handles_literals() {
        let resolver = SystemResolver::default();
        let ip = resolver.resolve("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn system_resolver_rejects_invalid_names() {
        let resolver = SystemResolver::new(Duration::from_secs(2));
        assert!(resolver.resolve("definitely not a host").await.is_err());
    }
}
