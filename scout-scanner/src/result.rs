use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Outbound links discovered on one visited page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteMapEntry {
    pub url: String,
    pub links: Vec<String>,
}

/// Visited URL -> sorted outbound links, kept in visit order.
///
/// The key set is exactly the set of URLs the crawl dequeued for fetching;
/// a page whose fetch failed is still present with no links.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteMap {
    entries: Vec<SiteMapEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SiteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a page. Returns false (and leaves the map untouched) if the
    /// URL is already a key.
    pub fn insert(&mut self, url: String, links: Vec<String>) -> bool {
        if self.index.contains_key(&url) {
            return false;
        }
        self.index.insert(url.clone(), self.entries.len());
        self.entries.push(SiteMapEntry { url, links });
        true
    }

    pub fn get(&self, url: &str) -> Option<&[String]> {
        self.index
            .get(url)
            .map(|&i| self.entries[i].links.as_slice())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteMapEntry> {
        self.entries.iter()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.url.as_str())
    }

    pub fn total_links(&self) -> usize {
        self.entries.iter().map(|e| e.links.len()).sum()
    }
}

impl PartialEq for SiteMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for SiteMap {}

/// Counters describing how the frontier was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub fetched: usize,
    pub failed: usize,
    pub discarded_depth: usize,
    pub discarded_visited: usize,
}

/// Everything a crawl produced.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub site_map: SiteMap,
    pub stats: CrawlStats,
    pub cancelled: bool,
}

/// HTTP outcome as it appears in report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpStatus {
    Code(u16),
    /// Request failed while building a crawl report row.
    Error,
    /// Neither HTTPS nor HTTP answered for a subdomain.
    NoResponse,
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpStatus::Code(code) => f.pad(&code.to_string()),
            HttpStatus::Error => f.pad("Error"),
            HttpStatus::NoResponse => f.pad("No Response"),
        }
    }
}

/// A subdomain from the wordlist that resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubdomainRecord {
    /// Zero-based position of the label in the wordlist.
    pub position: usize,
    pub label: String,
    pub fqdn: String,
    pub ip: IpAddr,
    pub status: HttpStatus,
    pub title: String,
    pub open_ports: Vec<u16>,
}

impl SubdomainRecord {
    pub fn ports_summary(&self) -> String {
        if self.open_ports.is_empty() {
            "No open ports".to_string()
        } else {
            let ports: Vec<String> = self.open_ports.iter().map(|p| p.to_string()).collect();
            format!("Open ports: {}", ports.join(","))
        }
    }
}
