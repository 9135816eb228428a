// Crawl report: URL numbering, per-URL row building and the report sink

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use scout_scanner::extract::{NO_EMAIL, NO_TITLE, extract_contacts, extract_title};
use scout_scanner::resolve::{HostKind, HostResolver, classify, url_host};
use scout_scanner::{HttpStatus, PageFetcher, SiteMap, SubdomainRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NOT_RESOLVED: &str = "Not Resolved";
/// Phone column when the page could not be fetched at all
pub const NO_PHONE_ON_ERROR: &str = "No phone found";
pub const SEPARATOR_WIDTH: usize = 205;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" | "jsonl" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// A URL with its stable 1-based report index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedUrl {
    pub index: usize,
    pub url: String,
}

/// Flattens a site map into first-seen order: each visited page, then its
/// links that have not been numbered yet. Every URL gets exactly one index.
pub fn number_urls(site_map: &SiteMap) -> Vec<NumberedUrl> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut numbered = Vec::new();

    for entry in site_map.iter() {
        let candidates = std::iter::once(&entry.url).chain(entry.links.iter());
        for url in candidates {
            if seen.insert(url.as_str()) {
                numbered.push(NumberedUrl {
                    index: numbered.len() + 1,
                    url: url.clone(),
                });
            }
        }
    }

    numbered
}

/// One line of the crawl report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub index: usize,
    pub url: String,
    pub ip: String,
    pub status: HttpStatus,
    pub kind: HostKind,
    pub title: String,
    pub emails: String,
    pub phones: String,
}

/// Resolves, classifies and re-fetches one URL. Failures turn into
/// sentinel values; nothing here returns an error.
pub async fn build_row<R: HostResolver>(
    numbered: &NumberedUrl,
    root_domain: &str,
    resolver: &R,
    fetcher: &PageFetcher,
) -> ReportRow {
    let url = numbered.url.as_str();

    let ip = match url_host(url) {
        Some(host) => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            match resolver.resolve(host).await {
                Ok(ip) => ip.to_string(),
                Err(e) => {
                    debug!("{}", e);
                    NOT_RESOLVED.to_string()
                }
            }
        }
        None => NOT_RESOLVED.to_string(),
    };

    let kind = classify(url, root_domain);

    let (status, title, emails, phones) = match fetcher.fetch(url).await {
        Ok(page) => {
            let (emails, phones) = extract_contacts(&page.body).summary();
            (
                HttpStatus::Code(page.status),
                extract_title(&page.body),
                emails,
                phones,
            )
        }
        Err(e) => {
            debug!("Report fetch failed for {}: {}", url, e);
            (
                HttpStatus::Error,
                NO_TITLE.to_string(),
                NO_EMAIL.to_string(),
                NO_PHONE_ON_ERROR.to_string(),
            )
        }
    };

    ReportRow {
        index: numbered.index,
        url: numbered.url.clone(),
        ip,
        status,
        kind,
        title,
        emails,
        phones,
    }
}

pub fn render_header() -> String {
    format!(
        "| {:<5} | {:<50} | {:<15} | {:<6} | {:<8} | {:<30} | {:<30} | {:<20} |",
        "Index", "URL", "IP Address", "Status", "Type", "Title", "Emails", "Phones"
    )
}

pub fn render_separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

pub fn render_row(row: &ReportRow) -> String {
    format!(
        "| {:<5} | {:<50} | {:<15} | {:<6} | {:<8} | {:<30} | {:<30} | {:<20} |",
        row.index, row.url, row.ip, row.status, row.kind, row.title, row.emails, row.phones
    )
}

/// Subdomain line as written to the report file
pub fn render_subdomain_line(count: usize, record: &SubdomainRecord) -> String {
    format!(
        "{}  {}  {}  {}  Ports: {}  Title: {}",
        count,
        record.fqdn,
        record.ip,
        record.status,
        record.ports_summary(),
        record.title
    )
}

/// Subdomain line as shown on the terminal
pub fn render_subdomain_console(count: usize, record: &SubdomainRecord) -> String {
    format!(
        "{} [+] {} -> {} | Status: {} | Open Ports: {} | Title: {}",
        count,
        record.fqdn,
        record.ip,
        record.status,
        record.ports_summary(),
        record.title
    )
}

#[derive(Serialize)]
struct SubdomainLine<'a> {
    count: usize,
    #[serde(flatten)]
    record: &'a SubdomainRecord,
}

/// Append-only report output. Every line goes to the writer in the chosen
/// format and, when echo is on, to the terminal as text.
pub struct ReportSink<W: Write> {
    writer: W,
    format: ReportFormat,
    echo: bool,
    progress: Option<ProgressBar>,
}

impl ReportSink<File> {
    /// Opens (creating if needed) `path` in append mode
    pub fn append_to(path: &Path, format: ReportFormat, echo: bool) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file, format, echo))
    }
}

impl<W: Write> ReportSink<W> {
    pub fn new(writer: W, format: ReportFormat, echo: bool) -> Self {
        Self {
            writer,
            format,
            echo,
            progress: None,
        }
    }

    /// Terminal lines are printed above this bar instead of through it
    pub fn attach_progress(&mut self, progress: ProgressBar) {
        self.progress = Some(progress);
    }

    pub fn detach_progress(&mut self) -> Option<ProgressBar> {
        self.progress.take()
    }

    fn echo(&self, line: &str) {
        if !self.echo {
            return;
        }
        match self.progress {
            Some(ref pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }

    pub fn write_table_header(&mut self) -> io::Result<()> {
        let header = render_header();
        let separator = render_separator();
        self.echo(&header);
        self.echo(&separator);
        if self.format == ReportFormat::Text {
            self.write_line(&header)?;
            self.write_line(&separator)?;
        }
        Ok(())
    }

    pub fn write_row(&mut self, row: &ReportRow) -> io::Result<()> {
        let line = render_row(row);
        self.echo(&line);
        match self.format {
            ReportFormat::Text => self.write_line(&line),
            ReportFormat::Json => {
                let json = serde_json::to_string(row).map_err(io::Error::other)?;
                self.write_line(&json)
            }
        }
    }

    pub fn write_subdomain(&mut self, count: usize, record: &SubdomainRecord) -> io::Result<()> {
        self.echo(&render_subdomain_console(count, record));
        match self.format {
            ReportFormat::Text => self.write_line(&render_subdomain_line(count, record)),
            ReportFormat::Json => {
                let json = serde_json::to_string(&SubdomainLine { count, record })
                    .map_err(io::Error::other)?;
                self.write_line(&json)
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Row for a URL that was collected but never looked at again: the host
/// is classified, everything that needs the network gets its sentinel.
pub fn unvisited_row(numbered: &NumberedUrl, root_domain: &str) -> ReportRow {
    ReportRow {
        index: numbered.index,
        url: numbered.url.clone(),
        ip: NOT_RESOLVED.to_string(),
        status: HttpStatus::Error,
        kind: classify(&numbered.url, root_domain),
        title: NO_TITLE.to_string(),
        emails: NO_EMAIL.to_string(),
        phones: NO_PHONE_ON_ERROR.to_string(),
    }
}

/// Writes the header and one row per numbered URL, strictly in index
/// order. Rows are built up to `workers` at a time. Once `cancel` fires,
/// rows not yet started skip resolution and fetching and are written with
/// sentinels, so every collected URL still appears. Returns the number of
/// rows written.
pub async fn write_crawl_report<R: HostResolver, W: Write>(
    numbered: &[NumberedUrl],
    root_domain: &str,
    resolver: &R,
    fetcher: &PageFetcher,
    workers: usize,
    sink: &mut ReportSink<W>,
    cancel: &CancellationToken,
) -> io::Result<usize> {
    sink.write_table_header()?;

    let mut rows = stream::iter(numbered)
        .map(|n| async move {
            if cancel.is_cancelled() {
                return (unvisited_row(n, root_domain), false);
            }
            (build_row(n, root_domain, resolver, fetcher).await, true)
        })
        .buffered(workers.max(1));

    let mut written = 0;
    let mut skipped = 0;
    while let Some((row, visited)) = rows.next().await {
        sink.write_row(&row)?;
        written += 1;
        if !visited {
            skipped += 1;
        }
    }

    if skipped > 0 {
        warn!("{} of {} report rows were written without fetching (cancelled)", skipped, written);
    }
    info!("Wrote {} report rows", written);
    Ok(written)
}
