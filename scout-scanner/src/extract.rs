//! Page metadata extraction: bounded titles, Gmail addresses and Iranian
//! mobile numbers.
//!
//! Everything here is pure. The compiled patterns live in [`ContactPatterns`]
//! so callers can swap them out, and [`is_valid_phone`] is a plain predicate
//! that can be tested without any network I/O.

use crate::error::{Result, ScanError};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const NO_TITLE: &str = "No Title";
pub const NO_EMAIL: &str = "No email found";
pub const NO_PHONE: &str = "No valid Iranian phone number found";

const TITLE_LIMIT: usize = 30;
const TITLE_KEEP: usize = 27;

pub const DEFAULT_EMAIL_PATTERN: &str = r"[a-zA-Z0-9_.+-]+@gmail\.[a-zA-Z]{2,}";
pub const DEFAULT_PHONE_PATTERN: &str = r"(?:\+98|0098|0)?(9\d{9})\b";

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));

static DEFAULT_PATTERNS: LazyLock<ContactPatterns> = LazyLock::new(ContactPatterns::default);

/// Returns the first `<title>`, trimmed and capped at 30 characters
/// (27 kept plus `...`). Missing or blank titles yield [`NO_TITLE`].
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    bound_title(title.trim())
}

fn bound_title(title: &str) -> String {
    if title.is_empty() {
        return NO_TITLE.to_string();
    }
    if title.chars().count() > TITLE_LIMIT {
        let kept: String = title.chars().take(TITLE_KEEP).collect();
        format!("{}...", kept)
    } else {
        title.to_string()
    }
}

/// A phone candidate is the 10 digits after the optional country/trunk
/// prefix. Valid means: exactly ten ASCII digits, leading `9`, and not one
/// digit repeated ten times.
pub fn is_valid_phone(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    bytes.len() == 10
        && bytes.iter().all(u8::is_ascii_digit)
        && bytes[0] == b'9'
        && !bytes.iter().all(|&b| b == bytes[0])
}

/// Deduplicated, sorted contact details found in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contacts {
    pub emails: Vec<String>,
    /// Normalized to the domestic `0XXXXXXXXXX` form.
    pub phones: Vec<String>,
}

impl Contacts {
    pub fn email_summary(&self) -> String {
        if self.emails.is_empty() {
            NO_EMAIL.to_string()
        } else {
            self.emails.join(", ")
        }
    }

    pub fn phone_summary(&self) -> String {
        if self.phones.is_empty() {
            NO_PHONE.to_string()
        } else {
            self.phones.join(", ")
        }
    }

    pub fn summary(&self) -> (String, String) {
        (self.email_summary(), self.phone_summary())
    }
}

/// Compiled extraction rules.
#[derive(Debug, Clone)]
pub struct ContactPatterns {
    email: Regex,
    phone: Regex,
}

impl ContactPatterns {
    /// The phone pattern must expose the 10-digit block as capture group 1.
    pub fn new(email_pattern: &str, phone_pattern: &str) -> Result<Self> {
        let email = Regex::new(email_pattern)
            .map_err(|e| ScanError::ParseError(format!("email pattern: {}", e)))?;
        let phone = Regex::new(phone_pattern)
            .map_err(|e| ScanError::ParseError(format!("phone pattern: {}", e)))?;
        if phone.captures_len() < 2 {
            return Err(ScanError::ParseError(
                "phone pattern needs a capture group for the digits".to_string(),
            ));
        }
        Ok(Self { email, phone })
    }

    pub fn extract(&self, text: &str) -> Contacts {
        let emails: BTreeSet<String> = self
            .email
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();

        let phones: BTreeSet<String> = self
            .phone
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|digits| is_valid_phone(digits))
            .map(|digits| format!("0{}", digits))
            .collect();

        Contacts {
            emails: emails.into_iter().collect(),
            phones: phones.into_iter().collect(),
        }
    }
}

impl Default for ContactPatterns {
    fn default() -> Self {
        Self {
            email: Regex::new(DEFAULT_EMAIL_PATTERN).expect("static email pattern"),
            phone: Regex::new(DEFAULT_PHONE_PATTERN).expect("static phone pattern"),
        }
    }
}

/// Runs the default patterns over raw page text.
pub fn extract_contacts(text: &str) -> Contacts {
    DEFAULT_PATTERNS.extract(text)
}
