use crate::error::{Result, ScanError};
use crate::fetch::PageFetcher;
use crate::result::{CrawlReport, CrawlStats, SiteMap};
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Called with `(depth, url)` right before a page is fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Social networks, messengers and other hosts that only add noise to a
/// site map. Matched as substrings of the absolute URL.
pub const DEFAULT_BLOCKLIST: &[&str] = &[
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "facebook.com",
    "t.me",
    "youtube.com",
    "cyberpolice.ir",
    "youtu.be",
    "l.vrgl.ir",
    "x.com",
    "www.netspi.com",
    "book.hacktricks.xyz",
];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// What happens to frontier entries that are deeper than `max_depth`.
///
/// They are never fetched either way and the site map comes out the same.
/// `Requeue` queues every rediscovery and discards each one separately;
/// `Dedupe` queues an over-depth URL only the first time it shows up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DepthOverflow {
    #[default]
    Requeue,
    Dedupe,
}

pub struct Crawler {
    fetcher: PageFetcher,
    max_depth: usize,
    workers: usize,
    blocklist: Vec<String>,
    depth_overflow: DepthOverflow,
    progress_callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self {
            fetcher,
            max_depth: 1,
            workers: 10,
            blocklist: DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect(),
            depth_overflow: DepthOverflow::default(),
            progress_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self::new(PageFetcher::new(timeout)?))
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_blocklist(mut self, blocklist: Vec<String>) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn with_depth_overflow(mut self, policy: DepthOverflow) -> Self {
        self.depth_overflow = policy;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Once the token fires no new page fetch starts; fetches already in
    /// flight finish (or time out) and the partial site map is returned.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Breadth-first crawl from `start_url`.
    ///
    /// Each depth level is fetched concurrently (up to `workers` at a time)
    /// but folded into the session in queue order, so the resulting site
    /// map is the same one a one-page-at-a-time traversal would build.
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlReport> {
        let start = normalize_url(start_url)
            .ok_or_else(|| ScanError::InvalidUrl(format!("not an http(s) URL: {}", start_url)))?;

        info!(
            "Starting crawl of {} (max depth {}, {} workers)",
            start, self.max_depth, self.workers
        );

        let mut session = CrawlSession::new(start, self.max_depth, self.depth_overflow);
        let mut cancelled = false;

        while let Some((depth, batch)) = session.next_batch() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if batch.is_empty() {
                continue;
            }
            debug!("Depth {}: fetching {} page(s)", depth, batch.len());

            let outcomes: Vec<(String, Option<FetchOutcome>)> = stream::iter(batch)
                .map(|url| async move {
                    if self.cancel.is_cancelled() {
                        return (url, None);
                    }
                    if let Some(ref callback) = self.progress_callback {
                        callback(depth, url.clone());
                    }
                    let outcome = self.visit(&url).await;
                    (url, Some(outcome))
                })
                .buffered(self.workers)
                .collect()
                .await;

            for (url, outcome) in outcomes {
                match outcome {
                    Some(outcome) => session.record(url, depth, outcome),
                    None => cancelled = true,
                }
            }
        }

        if cancelled {
            warn!("Crawl cancelled; keeping {} page(s)", session.site_map.len());
        }
        info!(
            "Crawl complete. Visited {} pages ({} failed)",
            session.site_map.len(),
            session.stats.failed
        );

        Ok(CrawlReport {
            site_map: session.site_map,
            stats: session.stats,
            cancelled,
        })
    }

    async fn visit(&self, url: &str) -> FetchOutcome {
        match self.fetcher.fetch(url).await {
            Ok(page) => FetchOutcome::Fetched(extract_links(&page.body, url, &self.blocklist)),
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                FetchOutcome::Failed(e.to_string())
            }
        }
    }
}

#[derive(Debug)]
enum FetchOutcome {
    /// Candidate links in document order.
    Fetched(Vec<String>),
    Failed(String),
}

/// Traversal state for a single crawl: frontier, visited set and the site
/// map being built. Nothing outlives the `crawl` call.
struct CrawlSession {
    queue: VecDeque<(String, usize)>,
    visited: HashSet<String>,
    overflow: HashSet<String>,
    site_map: SiteMap,
    stats: CrawlStats,
    max_depth: usize,
    policy: DepthOverflow,
}

impl CrawlSession {
    fn new(start: String, max_depth: usize, policy: DepthOverflow) -> Self {
        let mut session = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            overflow: HashSet::new(),
            site_map: SiteMap::new(),
            stats: CrawlStats::default(),
            max_depth,
            policy,
        };
        session.enqueue(start, 0);
        session
    }

    fn enqueue(&mut self, url: String, depth: usize) {
        if depth > self.max_depth
            && self.policy == DepthOverflow::Dedupe
            && !self.overflow.insert(url.clone())
        {
            return;
        }
        self.queue.push_back((url, depth));
    }

    /// Pops every entry sharing the front entry's depth and returns the
    /// ones that still need fetching, in FIFO order. Depths in the queue
    /// never decrease, so this is exactly one BFS level.
    fn next_batch(&mut self) -> Option<(usize, Vec<String>)> {
        let depth = self.queue.front()?.1;
        let mut batch = Vec::new();
        let mut in_batch = HashSet::new();

        while self.queue.front().is_some_and(|(_, d)| *d == depth) {
            let Some((url, _)) = self.queue.pop_front() else {
                break;
            };
            if depth > self.max_depth {
                self.stats.discarded_depth += 1;
                continue;
            }
            if self.visited.contains(&url) || !in_batch.insert(url.clone()) {
                self.stats.discarded_visited += 1;
                continue;
            }
            batch.push(url);
        }

        Some((depth, batch))
    }

    fn record(&mut self, url: String, depth: usize, outcome: FetchOutcome) {
        self.visited.insert(url.clone());

        let links: Vec<String> = match outcome {
            FetchOutcome::Fetched(candidates) => {
                self.stats.fetched += 1;
                candidates
                    .into_iter()
                    .filter(|link| !self.visited.contains(link))
                    .collect()
            }
            FetchOutcome::Failed(reason) => {
                debug!("Recording {} with no links: {}", url, reason);
                self.stats.failed += 1;
                Vec::new()
            }
        };

        for link in &links {
            if !self.visited.contains(link) {
                self.enqueue(link.clone(), depth + 1);
            }
        }

        let sorted: BTreeSet<String> = links.into_iter().collect();
        self.site_map.insert(url, sorted.into_iter().collect());
    }
}

/// Parses an absolute http(s) URL and drops its fragment.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Anchor targets of `html`, resolved against `current_url`, keeping only
/// http(s) URLs that contain no blocklisted substring. Duplicates are
/// dropped; first-seen order is kept.
pub fn extract_links(html: &str, current_url: &str, blocklist: &[String]) -> Vec<String> {
    let Ok(base) = Url::parse(current_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href").map(str::trim) else {
            continue;
        };
        let Some(absolute) = resolve_href(&base, href) else {
            continue;
        };
        if blocklist.iter().any(|blocked| absolute.contains(blocked.as_str())) {
            debug!("Skipping blocklisted link {}", absolute);
            continue;
        }
        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }

    links
}

fn resolve_href(base: &Url, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn blocklist() -> Vec<String> {
        DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect()
    }

    fn crawler() -> Crawler {
        Crawler::with_timeout(Duration::from_secs(5)).unwrap()
    }

    async fn mount_page(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn extract_links_resolves_and_filters() {
        let html = r##"<html><body>
            <a href="/about">About</a>
            <a href="contact#form">Contact</a>
            <a href="https://www.facebook.com/acme">FB</a>
            <a href="https://t.me/acme">TG</a>
            <a href="mailto:hi@acme.test">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="#top">Top</a>
            <a href="ftp://files.acme.test/">FTP</a>
            <a href=" /about ">Again</a>
            <a>No href</a>
        </body></html>"##;

        let links = extract_links(html, "https://acme.test/team/", &blocklist());
        assert_eq!(
            links,
            vec![
                "https://acme.test/about".to_string(),
                "https://acme.test/team/contact".to_string(),
            ]
        );
    }

    #[test]
    fn blocklist_is_substring_based() {
        let html = r#"<a href="https://youtu.be/abc">v</a><a href="https://blog.acme.test/">b</a>"#;
        let custom = vec!["blog.".to_string()];
        assert_eq!(
            extract_links(html, "https://acme.test/", &custom),
            vec!["https://youtu.be/abc".to_string()]
        );
        assert!(extract_links(html, "https://acme.test/", &blocklist())
            .iter()
            .all(|l| !l.contains("youtu.be")));
    }

    #[test]
    fn normalize_url_requires_http_and_drops_fragment() {
        assert_eq!(
            normalize_url("https://example.com"),
            Some("https://example.com/".to_string())
        );
        assert_eq!(
            normalize_url("http://example.com/a#b"),
            Some("http://example.com/a".to_string())
        );
        assert_eq!(normalize_url("ftp://example.com/"), None);
        assert_eq!(normalize_url("example.com"), None);
    }

    #[test]
    fn session_records_failures_and_filters_visited() {
        let mut session = CrawlSession::new("http://a.test/".into(), 1, DepthOverflow::Requeue);
        let (depth, batch) = session.next_batch().unwrap();
        assert_eq!((depth, batch.clone()), (0, vec!["http://a.test/".to_string()]));

        session.record(
            "http://a.test/".into(),
            0,
            FetchOutcome::Fetched(vec![
                "http://a.test/z".into(),
                "http://a.test/".into(),
                "http://a.test/b".into(),
            ]),
        );
        assert_eq!(
            session.site_map.get("http://a.test/").unwrap(),
            &["http://a.test/b".to_string(), "http://a.test/z".to_string()]
        );

        let (_, batch) = session.next_batch().unwrap();
        // Enqueued in document order, not sorted order.
        assert_eq!(batch, vec!["http://a.test/z".to_string(), "http://a.test/b".to_string()]);
        session.record("http://a.test/z".into(), 1, FetchOutcome::Failed("refused".into()));
        assert_eq!(session.site_map.get("http://a.test/z"), Some(&[][..]));
        assert_eq!(session.stats.failed, 1);
        assert_eq!(session.visited.len(), session.site_map.len());
    }

    #[test]
    fn duplicate_frontier_entries_are_discarded_once_visited() {
        let mut session = CrawlSession::new("http://a.test/".into(), 2, DepthOverflow::Requeue);
        session.queue.push_back(("http://a.test/".into(), 0));
        let (_, batch) = session.next_batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(session.stats.discarded_visited, 1);
    }

    #[test]
    fn overflow_policies_differ_only_in_queue_churn() {
        for (policy, expected_discards) in [(DepthOverflow::Requeue, 2), (DepthOverflow::Dedupe, 1)] {
            let mut session = CrawlSession::new("http://a.test/".into(), 0, policy);
            session.next_batch();
            session.record(
                "http://a.test/".into(),
                0,
                FetchOutcome::Fetched(vec!["http://a.test/deep".into()]),
            );
            // Rediscovered from a second page at the same level.
            session.enqueue("http://a.test/deep".into(), 1);

            let (_, batch) = session.next_batch().unwrap();
            assert!(batch.is_empty());
            assert_eq!(session.stats.discarded_depth, expected_discards, "{:?}", policy);
            assert!(session.next_batch().is_none());
            assert_eq!(session.site_map.len(), 1);
        }
    }

    /// Page A links to B on the same host and to a blocklisted host C.
    #[tokio::test]
    async fn test_blocklisted_links_are_excluded() {
        let mock_server = MockServer::start().await;
        let root = format!("{}/", mock_server.uri());

        mount_page(
            &mock_server,
            "/",
            format!(
                r#"<html><body>
                    <a href="{}/b">B</a>
                    <a href="https://www.facebook.com/acme">C</a>
                </body></html>"#,
                mock_server.uri()
            ),
        )
        .await;
        mount_page(&mock_server, "/b", "<html><body>leaf</body></html>".into()).await;

        let report = crawler().with_max_depth(1).crawl(&mock_server.uri()).await.unwrap();
        let site_map = report.site_map;
        let b = format!("{}/b", mock_server.uri());

        assert_eq!(site_map.urls().collect::<Vec<_>>(), vec![root.as_str(), b.as_str()]);
        assert_eq!(site_map.get(&root).unwrap(), &[b.clone()]);
        assert_eq!(site_map.get(&b), Some(&[][..]));
        for entry in site_map.iter() {
            assert!(!entry.url.contains("facebook.com"));
            assert!(entry.links.iter().all(|l| !l.contains("facebook.com")));
        }
    }

    #[tokio::test]
    async fn test_custom_blocklist_replaces_default() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="/admin/login">admin</a><a href="/news">news</a>"#.into(),
        )
        .await;
        mount_page(&mock_server, "/news", "news".into()).await;

        let report = crawler()
            .with_blocklist(vec!["/admin".to_string()])
            .crawl(&mock_server.uri())
            .await
            .unwrap();

        let root = format!("{}/", mock_server.uri());
        assert_eq!(
            report.site_map.get(&root).unwrap(),
            &[format!("{}/news", mock_server.uri())]
        );
    }

    #[tokio::test]
    async fn test_pages_beyond_max_depth_are_never_fetched() {
        let mock_server = MockServer::start().await;

        mount_page(&mock_server, "/", r#"<a href="/one">1</a>"#.into()).await;
        mount_page(&mock_server, "/one", r#"<a href="/two">2</a>"#.into()).await;
        Mock::given(method("GET"))
            .and(path("/two"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let report = crawler().with_max_depth(1).crawl(&mock_server.uri()).await.unwrap();

        assert_eq!(report.site_map.len(), 2);
        let two = format!("{}/two", mock_server.uri());
        assert!(!report.site_map.contains(&two));
        assert_eq!(
            report.site_map.get(&format!("{}/one", mock_server.uri())).unwrap(),
            &[two]
        );
        assert_eq!(report.stats.discarded_depth, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_entry_and_continues() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<a href="http://127.0.0.1:1/dead">dead</a><a href="/alive">alive</a>"#.into(),
        )
        .await;
        mount_page(&mock_server, "/alive", "ok".into()).await;

        let report = crawler().with_max_depth(1).crawl(&mock_server.uri()).await.unwrap();

        assert_eq!(report.site_map.get("http://127.0.0.1:1/dead"), Some(&[][..]));
        assert!(report.site_map.contains(&format!("{}/alive", mock_server.uri())));
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.fetched + report.stats.failed, report.site_map.len());
    }

    #[tokio::test]
    async fn test_cycles_do_not_revisit() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, "/", r#"<a href="/b">b</a>"#.into()).await;
        mount_page(&mock_server, "/b", r#"<a href="/">home</a><a href="/b">self</a>"#.into()).await;

        let report = crawler().with_max_depth(5).crawl(&mock_server.uri()).await.unwrap();

        assert_eq!(report.site_map.len(), 2);
        assert_eq!(
            report.site_map.get(&format!("{}/b", mock_server.uri())),
            Some(&[][..])
        );
    }

    #[tokio::test]
    async fn test_concurrent_fetches_keep_queue_order() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::from("<html><body>");
        for i in 1..=8 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        root_html.push_str("</body></html>");
        mount_page(&mock_server, "/", root_html).await;

        for i in 1..=8u64 {
            // Earlier pages answer later so completions arrive out of order.
            Mock::given(method("GET"))
                .and(path(format!("/page{}", i)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(format!(r#"<a href="/leaf{}">leaf</a>"#, i))
                        .set_delay(Duration::from_millis(10 * (9 - i))),
                )
                .mount(&mock_server)
                .await;
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let report = crawler()
            .with_max_depth(1)
            .with_workers(4)
            .with_progress_callback(Arc::new(move |depth, url| {
                seen_clone.lock().unwrap().push((depth, url));
            }))
            .crawl(&mock_server.uri())
            .await
            .unwrap();

        let mut expected = vec![format!("{}/", mock_server.uri())];
        expected.extend((1..=8).map(|i| format!("{}/page{}", mock_server.uri(), i)));
        let keys: Vec<String> = report.site_map.urls().map(String::from).collect();
        assert_eq!(keys, expected);

        for i in 1..=8 {
            let page = format!("{}/page{}", mock_server.uri(), i);
            assert_eq!(
                report.site_map.get(&page).unwrap(),
                &[format!("{}/leaf{}", mock_server.uri(), i)]
            );
        }
        assert_eq!(seen.lock().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_returns_partial_map() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let report = crawler()
            .with_cancellation(token)
            .crawl(&mock_server.uri())
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report.site_map.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_start_url_is_rejected() {
        let result = crawler().crawl("example.com").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
    }
}
