use futures::stream::{self, StreamExt};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::trace;

/// FTP, SSH, Telnet, SMTP, DNS, HTTP, POP3, IMAP, HTTPS, MySQL, HTTP-alt.
pub const DEFAULT_PORTS: [u16; 11] = [21, 22, 23, 25, 53, 80, 110, 143, 443, 3306, 8080];

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP connect scanner over a fixed port list.
///
/// Probes for one host run concurrently (bounded by `concurrency`); an
/// optional shared semaphore caps sockets across every host being probed.
/// The open-port list always follows the configured port order.
#[derive(Debug, Clone)]
pub struct PortProber {
    ports: Vec<u16>,
    timeout: Duration,
    concurrency: usize,
    global_limit: Option<Arc<Semaphore>>,
}

impl PortProber {
    pub fn new() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            timeout: DEFAULT_PROBE_TIMEOUT,
            concurrency: DEFAULT_PORTS.len(),
            global_limit: None,
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_global_limit(mut self, limit: Arc<Semaphore>) -> Self {
        self.global_limit = Some(limit);
        self
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub async fn probe(&self, ip: IpAddr) -> Vec<u16> {
        self.sweep(ip, |addr| probe_port(addr, self.timeout)).await
    }

    /// Runs `connect` for every configured port and keeps the open ones in
    /// port-list order, however the attempts finish.
    async fn sweep<F, Fut>(&self, ip: IpAddr, connect: F) -> Vec<u16>
    where
        F: Fn(SocketAddr) -> Fut,
        Fut: Future<Output = bool>,
    {
        let connect = &connect;
        stream::iter(self.ports.iter().copied())
            .map(|port| async move {
                let _permit = match &self.global_limit {
                    Some(limit) => limit.acquire().await.ok(),
                    None => None,
                };
                let open = connect(SocketAddr::new(ip, port)).await;
                (port, open)
            })
            .buffered(self.concurrency)
            .filter_map(|(port, open)| async move { open.then_some(port) })
            .collect()
            .await
    }
}

impl Default for PortProber {
    fn default() -> Self {
        Self::new()
    }
}

/// One connect attempt. Refused, unreachable and timed out all read as
/// closed. The stream is dropped before returning.
pub async fn probe_port(addr: SocketAddr, probe_timeout: Duration) -> bool {
    match timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            trace!("{} open", addr);
            true
        }
        Ok(Err(e)) => {
            trace!("{} closed: {}", addr, e);
            false
        }
        Err(_elapsed) => {
            trace!("{} filtered (timeout)", addr);
            false
        }
    }
}
