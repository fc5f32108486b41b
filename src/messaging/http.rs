//! HTTP collector transport

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ConnectionState, Result, Transport, TransportError};

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Collector base URL, e.g. `http://collector:8086`
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8086".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            user_agent: "meterbox/0.1.0".to_string(),
        }
    }
}

/// Publishes payloads as `POST {endpoint}/{topic}` and tracks reachability
///
/// The connection flag follows publish outcomes: a transport-level failure
/// marks the link down, any HTTP response marks it up. While down, only the
/// probe started by [`HttpTransport::spawn_probe`] can bring it back.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    state: ConnectionState,
}

impl HttpTransport {
    /// Create a new HTTP transport; starts disconnected until the first probe
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            config,
            state: ConnectionState::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn topic_url(&self, topic: &str) -> String {
        join_url(&self.config.endpoint, topic)
    }

    fn mark(&self, connected: bool) {
        if self.state.set_connected(connected) {
            if connected {
                info!(endpoint = %self.config.endpoint, "Collector connected");
            } else {
                warn!(endpoint = %self.config.endpoint, "Collector disconnected");
            }
        }
    }

    /// Check collector reachability once and update the connection state
    pub async fn probe(&self) -> bool {
        let url = join_url(&self.config.endpoint, "health");
        let reachable = match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "Collector probe failed");
                false
            }
        };
        self.mark(reachable);
        reachable
    }

    /// Probe the collector every `interval` in the background
    pub fn spawn_probe(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                transport.probe().await;
            }
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn connection(&self) -> &ConnectionState {
        &self.state
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let url = self.topic_url(topic);
        debug!(url, size = payload.len(), "Publishing payload");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    self.mark(false);
                }
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::PublishFailed(e.to_string())
                }
            })?;

        self.mark(true);

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::PublishFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(())
    }
}

fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
