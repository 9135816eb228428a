// Run configuration shared by every phase of a scan

use crate::report::ReportFormat;
use scout_scanner::DepthOverflow;
use scout_scanner::ports::{DEFAULT_PORTS, DEFAULT_PROBE_TIMEOUT};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORDLIST: &str = "wordlist.txt";
pub const DEFAULT_OUTPUT: &str = "ipsocket.txt";

/// Which phases of a run are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    pub crawl: bool,
    pub whois: bool,
    pub subdomains: bool,
}

impl Default for Phases {
    fn default() -> Self {
        Self {
            crawl: true,
            whois: true,
            subdomains: true,
        }
    }
}

/// Every tunable of a scan, with the defaults the CLI falls back to
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Bare root domain, e.g. `example.com`
    pub domain: String,
    pub max_depth: usize,
    /// Concurrent page fetches while crawling and while building report rows
    pub workers: usize,
    pub subdomain_workers: usize,
    pub crawl_timeout: Duration,
    pub report_timeout: Duration,
    pub subdomain_timeout: Duration,
    pub probe_timeout: Duration,
    /// Concurrent connect attempts against one host
    pub probe_concurrency: usize,
    /// Concurrent connect attempts across all hosts
    pub global_probe_limit: usize,
    pub ports: Vec<u16>,
    pub wordlist: PathBuf,
    pub output: PathBuf,
    pub format: ReportFormat,
    pub depth_overflow: DepthOverflow,
    /// Wall-clock budget for the whole run
    pub deadline: Option<Duration>,
    pub phases: Phases,
    pub show_progress: bool,
}

impl ScanConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            max_depth: 1,
            workers: 10,
            subdomain_workers: 10,
            crawl_timeout: Duration::from_secs(10),
            report_timeout: Duration::from_secs(5),
            subdomain_timeout: Duration::from_secs(5),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_concurrency: DEFAULT_PORTS.len(),
            global_probe_limit: 256,
            ports: DEFAULT_PORTS.to_vec(),
            wordlist: PathBuf::from(DEFAULT_WORDLIST),
            output: PathBuf::from(DEFAULT_OUTPUT),
            format: ReportFormat::Text,
            depth_overflow: DepthOverflow::Requeue,
            deadline: None,
            phases: Phases::default(),
            show_progress: true,
        }
    }

    /// The crawl always starts from the HTTPS root of the domain
    pub fn start_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}
