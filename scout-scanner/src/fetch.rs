use crate::error::Result;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

/// Status and decoded body of a completed HTTP exchange. Any status counts:
/// a 404 page is still a page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Plain GET with a hard per-request timeout.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }

    /// Tries `https://{host}` and falls back to `http://{host}` on any
    /// failure. No other retries.
    pub async fn fetch_host(&self, host: &str) -> Result<FetchedPage> {
        match self.fetch(&format!("https://{}", host)).await {
            Ok(page) => Ok(page),
            Err(e) => {
                debug!("HTTPS failed for {} ({}), trying HTTP", host, e);
                self.fetch(&format!("http://{}", host)).await
            }
        }
    }
}
