use crate::extract::{NO_TITLE, extract_title};
use crate::fetch::PageFetcher;
use crate::ports::PortProber;
use crate::resolve::{HostResolver, SystemResolver};
use crate::result::{HttpStatus, SubdomainRecord};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Wordlist-driven subdomain discovery.
///
/// Every label becomes `label.root`; labels that resolve get an HTTPS (then
/// HTTP) request for status and title plus a TCP connect sweep of the
/// prober's ports. Labels run concurrently, records come out in wordlist
/// order.
pub struct SubdomainEnumerator<R = SystemResolver> {
    resolver: R,
    fetcher: PageFetcher,
    prober: PortProber,
    workers: usize,
    cancel: CancellationToken,
}

impl SubdomainEnumerator<SystemResolver> {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self {
            resolver: SystemResolver::default(),
            fetcher,
            prober: PortProber::default(),
            workers: 10,
            cancel: CancellationToken::new(),
        }
    }
}

impl<R: HostResolver> SubdomainEnumerator<R> {
    pub fn with_resolver<T: HostResolver>(self, resolver: T) -> SubdomainEnumerator<T> {
        SubdomainEnumerator {
            resolver,
            fetcher: self.fetcher,
            prober: self.prober,
            workers: self.workers,
            cancel: self.cancel,
        }
    }

    pub fn with_prober(mut self, prober: PortProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Labels not yet started when the token fires are skipped.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Streams one record per resolved label, in wordlist order. Blank
    /// labels are ignored; labels that fail to resolve produce nothing.
    pub fn enumerate<'a>(
        &'a self,
        root_domain: &'a str,
        labels: &'a [String],
    ) -> impl Stream<Item = SubdomainRecord> + 'a {
        stream::iter(labels.iter().enumerate())
            .filter(|entry| future::ready(!entry.1.trim().is_empty()))
            .map(move |(position, label)| self.scan_label(position, label.trim(), root_domain))
            .buffered(self.workers)
            .filter_map(future::ready)
    }

    pub async fn enumerate_all(&self, root_domain: &str, labels: &[String]) -> Vec<SubdomainRecord> {
        self.enumerate(root_domain, labels).collect().await
    }

    async fn scan_label(
        &self,
        position: usize,
        label: &str,
        root_domain: &str,
    ) -> Option<SubdomainRecord> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let fqdn = format!("{}.{}", label, root_domain);
        let ip = match self.resolver.resolve(&fqdn).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!("Skipping {}: {}", fqdn, e);
                return None;
            }
        };

        let (status, title) = match self.fetcher.fetch_host(&fqdn).await {
            Ok(page) => (HttpStatus::Code(page.status), extract_title(&page.body)),
            Err(e) => {
                debug!("No HTTP(S) response from {}: {}", fqdn, e);
                (HttpStatus::NoResponse, NO_TITLE.to_string())
            }
        };

        let open_ports = self.prober.probe(ip).await;
        debug!("{} -> {} open ports {:?}", fqdn, ip, open_ports);

        Some(SubdomainRecord {
            position,
            label: label.to_string(),
            fqdn,
            ip,
            status,
            title,
            open_ports,
        })
    }
}
