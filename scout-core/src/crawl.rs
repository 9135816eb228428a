use crate::config::ScanConfig;
use indicatif::{ProgressBar, ProgressStyle};
use scout_scanner::{CrawlReport, Crawler, PageFetcher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

/// Crawl the configured domain from its HTTPS root.
/// Returns the site map plus traversal counters
pub async fn execute_crawl(
    config: &ScanConfig,
    cancel: CancellationToken,
) -> Result<CrawlReport, String> {
    let fetcher = PageFetcher::new(config.crawl_timeout)
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    // Single spinner for the whole crawl (only if enabled)
    let progress_bar = config.show_progress.then(|| Arc::new(spinner("Starting crawl...")));
    let processed_count = Arc::new(AtomicUsize::new(0));

    let pb_clone = progress_bar.clone();
    let count_clone = processed_count.clone();
    let progress_callback: scout_scanner::ProgressCallback =
        Arc::new(move |depth: usize, url: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb_clone {
                pb.set_message(format!(
                    "Crawling... {} pages (depth {}) {}",
                    count,
                    depth,
                    extract_url_path(&url)
                ));
            }
        });

    let crawler = Crawler::new(fetcher)
        .with_max_depth(config.max_depth)
        .with_workers(config.workers)
        .with_depth_overflow(config.depth_overflow)
        .with_progress_callback(progress_callback)
        .with_cancellation(cancel);

    let result = crawler.crawl(&config.start_url()).await;

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} pages fetched", total));
    }

    result.map_err(|e| format!("Crawl of {} failed: {}", config.start_url(), e))
}

/// Short human summary of a finished crawl
pub fn summarize_crawl(report: &CrawlReport) -> String {
    let stats = &report.stats;
    let mut summary = format!(
        "Pages visited: {} ({} fetched, {} failed)\nLinks recorded: {}\nFrontier entries discarded: {} over depth, {} already visited",
        report.site_map.len(),
        stats.fetched,
        stats.failed,
        report.site_map.total_links(),
        stats.discarded_depth,
        stats.discarded_visited
    );
    if report.cancelled {
        summary.push_str("\nCrawl was cancelled before the frontier emptied");
    }
    summary
}
