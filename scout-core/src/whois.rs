//! Domain registration lookup over the WHOIS protocol (TCP/43).
//!
//! The bootstrap server (IANA) answers with a `refer:` line naming the
//! registry that actually holds the record; that server is queried once.
//! Responses are free-form `key: value` text, so parsing is best-effort.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub const IANA_WHOIS: &str = "whois.iana.org";
pub const WHOIS_PORT: u16 = 43;

const MAX_RESPONSE: u64 = 256 * 1024;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("static email pattern")
});

const REGISTRAR_KEYS: &[&str] = &["registrar", "registrar name", "sponsoring registrar"];
const CREATED_KEYS: &[&str] = &[
    "creation date",
    "created",
    "created on",
    "registered on",
    "registration time",
    "domain registration date",
];
const EXPIRES_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "expire-date",
    "expires on",
    "expires",
    "paid-till",
];
const NAME_SERVER_KEYS: &[&str] = &["name server", "nserver", "nameserver", "name servers"];
const COUNTRY_KEYS: &[&str] = &["registrant country", "country"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisInfo {
    pub domain: String,
    /// Server that produced the parsed record
    pub server: String,
    pub registrar: Option<String>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub name_servers: Vec<String>,
    pub emails: Vec<String>,
    pub country: Option<String>,
}

impl WhoisInfo {
    pub fn render(&self) -> String {
        fn or_none(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("None")
        }
        fn list(values: &[String]) -> String {
            if values.is_empty() {
                "None".to_string()
            } else {
                values.join(", ")
            }
        }

        format!(
            "Domain: {}\nRegistrar: {}\nCreation Date: {}\nExpiration Date: {}\nName Servers: {}\nEmails: {}\nCountry: {}",
            self.domain,
            or_none(&self.registrar),
            or_none(&self.creation_date),
            or_none(&self.expiration_date),
            list(&self.name_servers),
            list(&self.emails),
            or_none(&self.country),
        )
    }
}

#[derive(Debug, Clone)]
pub struct WhoisClient {
    server: String,
    port: u16,
    timeout: Duration,
}

impl WhoisClient {
    pub fn new() -> Self {
        Self {
            server: IANA_WHOIS.to_string(),
            port: WHOIS_PORT,
            timeout: Duration::from_secs(10),
        }
    }

    /// Bootstrap server to ask first. Referrals are contacted on the same port.
    pub fn with_server(mut self, server: &str, port: u16) -> Self {
        self.server = server.to_string();
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn lookup(&self, domain: &str) -> Result<WhoisInfo, String> {
        let mut server = self.server.clone();
        let mut raw = self.query(&server, domain).await?;

        if let Some(referral) = find_referral(&raw) {
            if !referral.eq_ignore_ascii_case(&server) {
                debug!("WHOIS referral for {}: {}", domain, referral);
                raw = self.query(&referral, domain).await?;
                server = referral;
            }
        }

        Ok(parse_whois(domain, &server, &raw))
    }

    async fn query(&self, server: &str, domain: &str) -> Result<String, String> {
        let io = async {
            let mut stream = TcpStream::connect((server, self.port)).await?;
            stream.write_all(format!("{}\r\n", domain).as_bytes()).await?;

            let mut response = Vec::new();
            (&mut stream).take(MAX_RESPONSE).read_to_end(&mut response).await?;
            Ok::<_, std::io::Error>(response)
        };

        let bytes = timeout(self.timeout, io)
            .await
            .map_err(|_| format!("{} did not answer within {:?}", server, self.timeout))?
            .map_err(|e| format!("{}: {}", server, e))?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

fn split_field(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((key.trim().to_ascii_lowercase(), value))
}

/// `refer:` (IANA) or `whois:` naming the next server to ask
pub fn find_referral(raw: &str) -> Option<String> {
    raw.lines()
        .filter_map(split_field)
        .find(|(key, _)| key == "refer" || key == "whois")
        .map(|(_, value)| value.to_string())
}

/// Renders recognizable timestamps as `YYYY-MM-DD HH:MM:SS` (UTC when the
/// source carried an offset). Anything else is passed through untouched.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.to_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    for fmt in ["%Y-%m-%d", "%d-%b-%Y", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    raw.to_string()
}

pub fn parse_whois(domain: &str, server: &str, raw: &str) -> WhoisInfo {
    let fields: Vec<(String, &str)> = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with('%') && !line.trim_start().starts_with('#'))
        .filter_map(split_field)
        .collect();

    let first = |keys: &[&str]| {
        fields
            .iter()
            .find(|(key, _)| keys.contains(&key.as_str()))
            .map(|(_, value)| value.to_string())
    };

    let name_servers: BTreeSet<String> = fields
        .iter()
        .filter(|(key, _)| NAME_SERVER_KEYS.contains(&key.as_str()))
        .filter_map(|(_, value)| value.split_whitespace().next())
        .map(|ns| ns.trim_end_matches('.').to_ascii_lowercase())
        .collect();

    let emails: BTreeSet<String> = EMAIL_RE
        .find_iter(raw)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect();

    WhoisInfo {
        domain: domain.to_string(),
        server: server.to_string(),
        registrar: first(REGISTRAR_KEYS),
        creation_date: first(CREATED_KEYS).map(|d| normalize_date(&d)),
        expiration_date: first(EXPIRES_KEYS).map(|d| normalize_date(&d)),
        name_servers: name_servers.into_iter().collect(),
        emails: emails.into_iter().collect(),
        country: first(COUNTRY_KEYS),
    }
}
