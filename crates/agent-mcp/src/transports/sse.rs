use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, Url,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{HeaderConfig, SseConfig};
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// MCP over HTTP+SSE: a long-lived `GET` carries server messages, each client
/// message is `POST`ed to the endpoint announced by the server.
pub struct SseTransport {
    config: SseConfig,
    client: Client,
    connected: Arc<AtomicBool>,
    sse_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    endpoint_url: Mutex<Option<Url>>,
}

impl SseTransport {
    pub fn new(config: SseConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            sse_handle: Mutex::new(None),
            endpoint_url: Mutex::new(None),
        }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.config.connect_timeout_ms)
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for HeaderConfig { name, value } in &self.config.headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
            let header_value = value.parse::<HeaderValue>().map_err(|e| {
                McpError::InvalidConfig(format!("Invalid header value: {}", e))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    fn stop_reader(&self) {
        if let Some(handle) = self.sse_handle.lock().take() {
            handle.abort();
        }
    }
}

/// Resolve the `endpoint` event payload against the SSE URL. Servers usually
/// send a path such as `/messages?sessionId=...`.
pub fn resolve_endpoint(base: &Url, data: &str) -> Result<Url> {
    base.join(data.trim())
        .map_err(|e| McpError::Protocol(format!("Invalid endpoint '{}': {}", data, e)))
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<String>> {
        info!("Connecting to MCP SSE endpoint: {}", self.config.url);

        let base = Url::parse(&self.config.url)
            .map_err(|e| McpError::InvalidConfig(format!("Invalid SSE url: {}", e)))?;
        let headers = self.build_headers()?;

        // The body is the event stream itself, so only the handshake is bounded.
        let request = self
            .client
            .get(base.clone())
            .headers(headers)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(self.connect_timeout(), request)
            .await
            .map_err(|_| {
                McpError::Timeout(format!("No response from {}", self.config.url))
            })??;

        if !response.status().is_success() {
            return Err(McpError::Connection(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let (message_tx, message_rx) = mpsc::channel(100);
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<Result<Url>>();
        let connected = self.connected.clone();
        let url = self.config.url.clone();

        let handle = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let mut stream = response.bytes_stream().eventsource();

            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) => {
                        debug!("SSE event: {}", event.event);
                        if event.event == "endpoint" {
                            let resolved = resolve_endpoint(&base, &event.data);
                            match endpoint_tx.take() {
                                Some(tx) => {
                                    let _ = tx.send(resolved);
                                }
                                None => debug!("Ignoring repeated endpoint event"),
                            }
                        } else if event.event == "message" || event.event.is_empty() {
                            if message_tx.send(event.data).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("SSE stream error: {}", e);
                        break;
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            warn!("SSE stream ended for {}", url);
        });
        *self.sse_handle.lock() = Some(handle);

        let endpoint = match tokio::time::timeout(self.connect_timeout(), endpoint_rx).await {
            Ok(Ok(Ok(endpoint))) => endpoint,
            Ok(Ok(Err(e))) => {
                self.stop_reader();
                return Err(e);
            }
            Ok(Err(_)) => {
                self.stop_reader();
                return Err(McpError::Connection(
                    "SSE stream ended before endpoint event".to_string(),
                ));
            }
            Err(_) => {
                self.stop_reader();
                return Err(McpError::Timeout(
                    "Timed out waiting for endpoint event".to_string(),
                ));
            }
        };

        debug!("Got endpoint: {}", endpoint);
        *self.endpoint_url.lock() = Some(endpoint);
        self.connected.store(true, Ordering::SeqCst);

        info!("MCP SSE transport connected");
        Ok(message_rx)
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting MCP SSE transport");

        self.connected.store(false, Ordering::SeqCst);
        self.stop_reader();
        self.endpoint_url.lock().take();

        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let post_url = self
            .endpoint_url
            .lock()
            .clone()
            .ok_or(McpError::Disconnected)?;
        let headers = self.build_headers()?;

        let request = self
            .client
            .post(post_url.clone())
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message)
            .timeout(self.connect_timeout())
            .send();
        let response = request.await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST failed: {} - {}",
                status, body
            )));
        }

        debug!("Sent message via POST to {}", post_url);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.sse_handle.get_mut().take() {
            handle.abort();
        }
    }
}
