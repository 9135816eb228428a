use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use scout_core::config::{Phases, ScanConfig};
use scout_core::crawl::{execute_crawl, summarize_crawl};
use scout_core::enumerate::{build_enumerator, execute_enumeration, load_wordlist};
use scout_core::report::{ReportFormat, ReportSink, number_urls, write_crawl_report};
use scout_core::whois::WhoisClient;
use scout_scanner::{DepthOverflow, PageFetcher, SystemResolver};
use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use url::Url;

// Helper functions for the scan handler

/// Reduce user input to a bare lower-case host. A pasted URL is accepted
/// and stripped down to its host.
pub fn normalize_domain(input: &str) -> Result<String, String> {
    let trimmed = input.trim().trim_end_matches('/').to_lowercase();
    if trimmed.is_empty() {
        return Err("Domain must not be empty".to_string());
    }

    let candidate = if trimmed.contains("://") {
        trimmed
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| format!("Invalid domain '{}': {}", input.trim(), e))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.trim_end_matches('.').to_string()),
        _ => Err(format!("Invalid domain '{}': no host", input.trim())),
    }
}

/// Parse `22,80,8000-8010` into an ordered port list without duplicates
pub fn parse_port_list(list: &str) -> Result<Vec<u16>, String> {
    fn port(s: &str) -> Result<u16, String> {
        match s.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(format!("Invalid port '{}'", s.trim())),
            Ok(p) => Ok(p),
        }
    }

    let mut ports = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let range = match item.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (port(start)?, port(end)?);
                if start > end {
                    return Err(format!("Invalid port range '{}'", item));
                }
                start..=end
            }
            None => {
                let p = port(item)?;
                p..=p
            }
        };
        for p in range {
            if !ports.contains(&p) {
                ports.push(p);
            }
        }
    }

    if ports.is_empty() {
        return Err("Port list is empty".to_string());
    }
    Ok(ports)
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Build the run configuration from parsed arguments
pub fn build_config(args: &ArgMatches) -> Result<ScanConfig, String> {
    let domain = args
        .get_one::<String>("domain")
        .ok_or_else(|| "--domain is required".to_string())?;
    let mut config = ScanConfig::new(normalize_domain(domain)?);

    if let Some(depth) = args.get_one::<usize>("depth") {
        config.max_depth = *depth;
    }
    if let Some(threads) = args.get_one::<usize>("threads") {
        config.workers = (*threads).max(1);
    }
    if let Some(threads) = args.get_one::<usize>("subdomain-threads") {
        config.subdomain_workers = (*threads).max(1);
    }
    if let Some(wordlist) = args.get_one::<String>("wordlist") {
        config.wordlist = expand_path(wordlist);
    }
    if let Some(output) = args.get_one::<String>("output") {
        config.output = expand_path(output);
    }
    if let Some(format) = args.get_one::<String>("format") {
        config.format = ReportFormat::from_str(format)
            .ok_or_else(|| format!("Unsupported report format '{}'", format))?;
    }
    if let Some(ports) = args.get_one::<String>("ports") {
        config.ports = parse_port_list(ports)?;
        config.probe_concurrency = config.ports.len().min(64);
    }
    config.deadline = args.get_one::<u64>("deadline").map(|s| Duration::from_secs(*s));
    if args.get_flag("dedupe-overflow") {
        config.depth_overflow = DepthOverflow::Dedupe;
    }
    config.phases = Phases {
        crawl: !args.get_flag("no-crawl"),
        whois: !args.get_flag("no-whois"),
        subdomains: !args.get_flag("no-subdomains"),
    };
    config.show_progress = !args.get_flag("quiet");

    Ok(config)
}

pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the stderr log subscriber. Safe to call more than once.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Cancel `token` on Ctrl-C or once `deadline` elapses, whichever is first.
/// The task ends quietly if the token is cancelled elsewhere.
pub fn spawn_cancellation(token: CancellationToken, deadline: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let watch = token.clone();
        let deadline_elapsed = async {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Interrupted; finishing in-flight work"),
            _ = deadline_elapsed => warn!("Deadline reached; finishing in-flight work"),
            _ = watch.cancelled() => return,
        }
        token.cancel();
    })
}

/// What a run produced, for the closing summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub pages: Option<usize>,
    pub rows: Option<usize>,
    pub subdomains: Option<usize>,
    pub cancelled: bool,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn count(value: Option<usize>) -> String {
            value.map_or_else(|| "skipped".to_string(), |n| n.to_string())
        }
        writeln!(f, "  Pages crawled: {}", count(self.pages))?;
        writeln!(f, "  Report rows: {}", count(self.rows))?;
        write!(f, "  Subdomains found: {}", count(self.subdomains))?;
        if self.cancelled {
            write!(f, "\n  Run was cancelled; results are partial")?;
        }
        Ok(())
    }
}

fn print_heading(title: &str) {
    println!();
    println!("{}", title.bright_white().bold());
    println!("{}", "═".repeat(60).bright_blue());
}

async fn crawl_phase(
    config: &ScanConfig,
    sink: &mut ReportSink<File>,
    cancel: &CancellationToken,
    summary: &mut ScanSummary,
) -> anyhow::Result<()> {
    print_heading(&format!("Crawling {}", config.start_url()));

    let report = execute_crawl(config, cancel.clone())
        .await
        .map_err(anyhow::Error::msg)?;
    println!("{}", summarize_crawl(&report));
    summary.pages = Some(report.site_map.len());

    let numbered = number_urls(&report.site_map);
    let fetcher = PageFetcher::new(config.report_timeout)
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
    let resolver = SystemResolver::new(config.report_timeout);

    print_heading(&format!("Report ({} URLs)", numbered.len()));
    let rows = write_crawl_report(
        &numbered,
        &config.domain,
        &resolver,
        &fetcher,
        config.workers,
        sink,
        cancel,
    )
    .await
    .with_context(|| format!("Failed to write report to {}", config.output.display()))?;
    summary.rows = Some(rows);

    Ok(())
}

async fn whois_phase(config: &ScanConfig, cancel: &CancellationToken) {
    print_heading("Registration");

    let client = WhoisClient::new();
    tokio::select! {
        result = client.lookup(&config.domain) => match result {
            Ok(info) => println!("{}", info.render()),
            Err(e) => println!("{} Failed to fetch WHOIS info: {}", "✗".red().bold(), e),
        },
        _ = cancel.cancelled() => println!("{} WHOIS lookup cancelled", "✗".red().bold()),
    }
}

async fn subdomain_phase(
    config: &ScanConfig,
    sink: &mut ReportSink<File>,
    cancel: &CancellationToken,
    summary: &mut ScanSummary,
) -> anyhow::Result<()> {
    print_heading(&format!("Subdomains of {}", config.domain));

    let labels = match load_wordlist(&config.wordlist) {
        Ok(labels) => labels,
        Err(e) => {
            println!("{} {}; skipping subdomain enumeration", "⚠".yellow().bold(), e);
            summary.subdomains = Some(0);
            return Ok(());
        }
    };
    if labels.is_empty() {
        println!("{} Wordlist {} has no labels", "⚠".yellow().bold(), config.wordlist.display());
        summary.subdomains = Some(0);
        return Ok(());
    }
    info!("Loaded {} labels from {}", labels.len(), config.wordlist.display());

    let enumerator = build_enumerator(config, cancel.clone()).map_err(anyhow::Error::msg)?;
    let found = execute_enumeration(&enumerator, &config.domain, &labels, sink, config.show_progress)
        .await
        .with_context(|| format!("Failed to write report to {}", config.output.display()))?;
    summary.subdomains = Some(found);

    Ok(())
}

/// Run every enabled phase against the configured domain. Individual
/// fetch, resolve and probe failures end up in the report; only an
/// unusable output file or invalid input is an error.
pub async fn handle_scan(config: &ScanConfig) -> anyhow::Result<ScanSummary> {
    if config.workers == 0 || config.subdomain_workers == 0 {
        bail!("Worker counts must be at least 1");
    }

    let mut sink = ReportSink::append_to(&config.output, config.format, true)
        .with_context(|| format!("Cannot open report file {}", config.output.display()))?;

    let cancel = CancellationToken::new();
    let watcher = spawn_cancellation(cancel.clone(), config.deadline);
    let mut summary = ScanSummary::default();

    let result = async {
        if config.phases.crawl {
            crawl_phase(config, &mut sink, &cancel, &mut summary).await?;
        }
        if config.phases.whois && !cancel.is_cancelled() {
            whois_phase(config, &cancel).await;
        }
        if config.phases.subdomains && !cancel.is_cancelled() {
            subdomain_phase(config, &mut sink, &cancel, &mut summary).await?;
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    summary.cancelled = cancel.is_cancelled();
    watcher.abort();
    result?;

    print_heading("Summary");
    println!("{}", summary);
    println!(
        "{} Report appended to {}",
        "✓".green().bold(),
        config.output.display().to_string().bright_white()
    );

    Ok(summary)
}
