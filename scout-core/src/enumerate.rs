// Subdomain enumeration: wordlist loading and streaming records into the report

use crate::config::ScanConfig;
use crate::report::ReportSink;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use scout_scanner::resolve::HostResolver;
use scout_scanner::{PageFetcher, PortProber, SubdomainEnumerator};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Load wordlist from file. Blank lines are skipped.
pub fn load_wordlist(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read wordlist {}: {}", path.display(), e))?;

    let words: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Ok(words)
}

/// Builds the enumerator for a run: one shared socket budget across hosts,
/// per-host probe concurrency and the configured port list.
pub fn build_enumerator(
    config: &ScanConfig,
    cancel: CancellationToken,
) -> Result<SubdomainEnumerator, String> {
    let fetcher = PageFetcher::new(config.subdomain_timeout)
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let prober = PortProber::new()
        .with_ports(config.ports.clone())
        .with_timeout(config.probe_timeout)
        .with_concurrency(config.probe_concurrency)
        .with_global_limit(Arc::new(Semaphore::new(config.global_probe_limit.max(1))));

    Ok(SubdomainEnumerator::new(fetcher)
        .with_prober(prober)
        .with_workers(config.subdomain_workers)
        .with_cancellation(cancel))
}

/// Streams every resolved subdomain into the sink as soon as it (and every
/// label before it) is done. Returns how many subdomains were found.
pub async fn execute_enumeration<R: HostResolver, W: Write>(
    enumerator: &SubdomainEnumerator<R>,
    root_domain: &str,
    labels: &[String],
    sink: &mut ReportSink<W>,
    show_progress: bool,
) -> io::Result<usize> {
    let pb = if show_progress {
        let bar = ProgressBar::new(labels.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        sink.attach_progress(bar.clone());
        Some(bar)
    } else {
        None
    };

    let records = enumerator.enumerate(root_domain, labels);
    futures::pin_mut!(records);

    let mut found = 0;
    while let Some(record) = records.next().await {
        found += 1;
        sink.write_subdomain(found, &record)?;
        if let Some(ref bar) = pb {
            // Records arrive in wordlist order, so this is the furthest label done.
            bar.set_position(record.position as u64 + 1);
            bar.set_message(record.fqdn.clone());
        }
    }

    if let Some(bar) = sink.detach_progress() {
        bar.finish_and_clear();
    }
    info!("Subdomain scan complete: {} of {} labels resolved", found, labels.len());
    Ok(found)
}
