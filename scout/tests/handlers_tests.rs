use scout::commands::command_argument_builder;
use scout::handlers::*;
use scout_core::config::ScanConfig;
use scout_core::report::ReportFormat;
use scout_scanner::DepthOverflow;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::Level;

fn parse(args: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["scout"];
    argv.extend_from_slice(args);
    command_argument_builder()
        .try_get_matches_from(argv)
        .expect("arguments should parse")
}

#[test]
fn test_normalize_domain_bare_host() {
    assert_eq!(normalize_domain("Example.COM"), Ok("example.com".to_string()));
    assert_eq!(normalize_domain("  example.com  "), Ok("example.com".to_string()));
}

#[test]
fn test_normalize_domain_strips_scheme_and_path() {
    assert_eq!(
        normalize_domain("https://www.example.com/fa/index.html"),
        Ok("www.example.com".to_string())
    );
    assert_eq!(normalize_domain("example.com/"), Ok("example.com".to_string()));
}

#[test]
fn test_normalize_domain_invalid() {
    assert!(normalize_domain("").is_err());
    assert!(normalize_domain("   ").is_err());
    assert!(normalize_domain("exa mple.com").is_err());
}

#[test]
fn test_parse_port_list() {
    assert_eq!(parse_port_list("22,80,443"), Ok(vec![22, 80, 443]));
    assert_eq!(parse_port_list("8000-8002, 80, 8001"), Ok(vec![8000, 8001, 8002, 80]));
}

#[test]
fn test_parse_port_list_invalid() {
    assert!(parse_port_list("").is_err());
    assert!(parse_port_list("0").is_err());
    assert!(parse_port_list("70000").is_err());
    assert!(parse_port_list("90-80").is_err());
    assert!(parse_port_list("http").is_err());
}

#[test]
fn test_build_config_defaults() {
    let config = build_config(&parse(&["-d", "Example.com"])).unwrap();
    let defaults = ScanConfig::new("example.com");

    assert_eq!(config.domain, "example.com");
    assert_eq!(config.max_depth, defaults.max_depth);
    assert_eq!(config.workers, 10);
    assert_eq!(config.ports, defaults.ports);
    assert_eq!(config.output, PathBuf::from("ipsocket.txt"));
    assert_eq!(config.wordlist, PathBuf::from("wordlist.txt"));
    assert_eq!(config.format, ReportFormat::Text);
    assert_eq!(config.depth_overflow, DepthOverflow::Requeue);
    assert!(config.deadline.is_none());
    assert!(config.show_progress);
}

#[test]
fn test_build_config_all_flags() {
    let config = build_config(&parse(&[
        "--domain",
        "example.com",
        "--depth",
        "3",
        "-t",
        "4",
        "--subdomain-threads",
        "2",
        "-f",
        "json",
        "--deadline",
        "30",
        "--dedupe-overflow",
        "--ports",
        "22,443",
        "--no-whois",
        "--quiet",
    ]))
    .unwrap();

    assert_eq!(config.max_depth, 3);
    assert_eq!(config.workers, 4);
    assert_eq!(config.subdomain_workers, 2);
    assert_eq!(config.format, ReportFormat::Json);
    assert_eq!(config.deadline, Some(Duration::from_secs(30)));
    assert_eq!(config.depth_overflow, DepthOverflow::Dedupe);
    assert_eq!(config.ports, vec![22, 443]);
    assert!(config.phases.crawl && !config.phases.whois && config.phases.subdomains);
    assert!(!config.show_progress);
}

#[test]
fn test_build_config_zero_threads_clamped() {
    let config = build_config(&parse(&["-d", "example.com", "-t", "0"])).unwrap();
    assert_eq!(config.workers, 1);
}

#[test]
fn test_domain_is_required() {
    assert!(command_argument_builder().try_get_matches_from(["scout"]).is_err());
}

#[test]
fn test_unknown_format_rejected_by_parser() {
    assert!(
        command_argument_builder()
            .try_get_matches_from(["scout", "-d", "example.com", "-f", "csv"])
            .is_err()
    );
}

#[test]
fn test_log_level_from_verbosity() {
    assert_eq!(log_level(0), Level::WARN);
    assert_eq!(log_level(1), Level::INFO);
    assert_eq!(log_level(2), Level::DEBUG);
    assert_eq!(log_level(9), Level::TRACE);
}

#[test]
fn test_scan_summary_display() {
    let summary = ScanSummary {
        pages: Some(3),
        rows: Some(7),
        subdomains: None,
        cancelled: false,
    };
    let text = summary.to_string();
    assert!(text.contains("Pages crawled: 3"));
    assert!(text.contains("Report rows: 7"));
    assert!(text.contains("Subdomains found: skipped"));
}

#[tokio::test]
async fn test_deadline_cancels_token() {
    let token = CancellationToken::new();
    let watcher = spawn_cancellation(token.clone(), Some(Duration::from_millis(50)));

    tokio::time::timeout(Duration::from_secs(5), token.cancelled())
        .await
        .expect("deadline should cancel the run");
    watcher.await.unwrap();
}

#[tokio::test]
async fn test_watcher_exits_when_cancelled_elsewhere() {
    let token = CancellationToken::new();
    let watcher = spawn_cancellation(token.clone(), None);
    token.cancel();

    tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .expect("watcher should stop")
        .unwrap();
}

#[tokio::test]
async fn test_handle_scan_with_missing_wordlist_is_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let output = NamedTempFile::new()?;

    let mut config = ScanConfig::new("scout-test.invalid");
    config.phases.crawl = false;
    config.phases.whois = false;
    config.wordlist = PathBuf::from("/nonexistent/scout/wordlist.txt");
    config.output = output.path().to_path_buf();
    config.show_progress = false;

    let summary = handle_scan(&config).await?;
    assert_eq!(summary.pages, None);
    assert_eq!(summary.subdomains, Some(0));
    assert!(fs::read_to_string(output.path())?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_handle_scan_unwritable_output_is_fatal() {
    let mut config = ScanConfig::new("scout-test.invalid");
    config.output = PathBuf::from("/nonexistent/dir/report.txt");

    let err = handle_scan(&config).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Cannot open report file"));
}
