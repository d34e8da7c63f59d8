use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;
use crate::types::{McpCallResult, McpTool};

/// Transport trait for MCP communication.
///
/// `connect` hands back the inbound channel; the transport drops its sender
/// when the underlying stream ends.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&self) -> Result<mpsc::Receiver<String>>;
    async fn disconnect(&self) -> Result<()>;
    async fn send(&self, message: String) -> Result<()>;
    fn is_connected(&self) -> bool;
}

type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// MCP protocol client
pub struct McpProtocolClient {
    transport: Arc<dyn McpTransport>,
    next_id: AtomicU64,
    pending_requests: PendingRequests,
    message_handler: Mutex<Option<JoinHandle<()>>>,
}

impl McpProtocolClient {
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending_requests: Arc::new(Mutex::new(HashMap::new())),
            message_handler: Mutex::new(None),
        }
    }

    pub async fn connect(&self) -> Result<()> {
        let inbound = self.transport.connect().await?;
        self.start_message_handler(inbound);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        if let Some(handler) = self.message_handler.lock().take() {
            handler.abort();
        }
        // Dropping the senders fails every in-flight request with Disconnected.
        self.pending_requests.lock().clear();

        self.transport.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn start_message_handler(&self, mut inbound: mpsc::Receiver<String>) {
        let transport = self.transport.clone();
        let pending_requests = self.pending_requests.clone();

        let handler = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                debug!("Received message: {}", message);
                if let Err(e) =
                    Self::handle_message(&message, &pending_requests, transport.as_ref()).await
                {
                    warn!("Failed to handle message: {}", e);
                }
            }
            debug!("MCP inbound channel closed");
            pending_requests.lock().clear();
        });

        if let Some(previous) = self.message_handler.lock().replace(handler) {
            previous.abort();
        }
    }

    async fn handle_message(
        message: &str,
        pending_requests: &Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>,
        transport: &dyn McpTransport,
    ) -> Result<()> {
        match IncomingMessage::parse(message)? {
            IncomingMessage::Response(response) => {
                let sender = pending_requests.lock().remove(&response.id);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(response);
                    }
                    None => debug!("Dropping response for unknown request {}", response.id),
                }
                Ok(())
            }
            IncomingMessage::Notification(notification) => {
                debug!("Ignoring server notification: {}", notification.method);
                Ok(())
            }
            IncomingMessage::Request(request) => {
                let reply = Self::reply_to_server_request(&request);
                transport.send(serde_json::to_string(&reply)?).await
            }
        }
    }

    fn reply_to_server_request(request: &JsonRpcServerRequest) -> Value {
        match request.method.as_str() {
            "ping" => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": request.id,
                "result": {},
            }),
            other => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": request.id,
                "error": {
                    "code": METHOD_NOT_FOUND,
                    "message": format!("Method not found: {}", other),
                },
            }),
        }
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout_ms: u64,
    ) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests.lock().insert(id, tx);

        if let Err(e) = self.transport.send(request_json).await {
            self.pending_requests.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(tokio::time::Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    Err(McpError::Protocol(format!("{}: {}", error.code, error.message)))
                } else {
                    Ok(response)
                }
            }
            Ok(Err(_)) => Err(McpError::Disconnected),
            Err(_) => {
                self.pending_requests.lock().remove(&id);
                Err(McpError::Timeout(format!(
                    "Request {} ({}) timed out after {}ms",
                    id, method, timeout_ms
                )))
            }
        }
    }

    fn take_result(response: JsonRpcResponse) -> Result<Value> {
        response
            .result
            .ok_or_else(|| McpError::Protocol("Missing result".to_string()))
    }

    pub async fn initialize(&self, timeout_ms: u64) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;

        let response = self
            .send_request("initialize", Some(params), timeout_ms)
            .await?;
        let result: McpInitializeResult = serde_json::from_value(Self::take_result(response)?)?;

        let initialized = JsonRpcNotification::new("notifications/initialized");
        self.transport
            .send(serde_json::to_string(&initialized)?)
            .await?;

        Ok(result)
    }

    /// Fetch every page of `tools/list`.
    pub async fn list_tools(&self, timeout_ms: u64) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let params = cursor.take().map(|cursor| json!({ "cursor": cursor }));
            let response = self.send_request("tools/list", params, timeout_ms).await?;
            let page: McpToolListResult = serde_json::from_value(Self::take_result(response)?)?;

            tools.extend(page.tools.into_iter().map(|t| McpTool {
                name: t.name,
                description: t.description.unwrap_or_default(),
                parameters: t
                    .input_schema
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            }));

            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(McpError::Protocol(format!(
                            "tools/list repeated cursor '{}'",
                            next
                        )));
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout_ms: u64,
    ) -> Result<McpCallResult> {
        let request = McpToolCallRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let params = serde_json::to_value(request)?;

        let response = self
            .send_request("tools/call", Some(params), timeout_ms)
            .await?;
        let result: McpToolCallResult = serde_json::from_value(Self::take_result(response)?)?;

        Ok(McpCallResult {
            content: result.content,
            is_error: result.is_error,
        })
    }

    #[cfg(test)]
    pub(crate) async fn ping(&self, timeout_ms: u64) -> Result<()> {
        self.send_request("ping", None, timeout_ms).await?;
        Ok(())
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        if let Some(handler) = self.message_handler.get_mut().take() {
            handler.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport standing in for an MCP server.

    use super::*;
    use std::sync::atomic::AtomicBool;

    pub type Responder = Box<dyn Fn(&JsonRpcRequest) -> Option<Value> + Send + Sync>;

    pub struct ScriptedTransport {
        responder: Responder,
        inbound: Mutex<Option<mpsc::Sender<String>>>,
        connected: AtomicBool,
        pub sent: Mutex<Vec<String>>,
        pub disconnects: AtomicU64,
        pub fail_connect: Option<McpError>,
    }

    impl ScriptedTransport {
        /// `responder` returns the `result` for each request, or `None` to
        /// leave it unanswered.
        pub fn new(responder: Responder) -> Self {
            Self {
                responder,
                inbound: Mutex::new(None),
                connected: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
                disconnects: AtomicU64::new(0),
                fail_connect: None,
            }
        }

        pub fn failing(error: McpError) -> Self {
            let mut transport = Self::new(Box::new(|_| None));
            transport.fail_connect = Some(error);
            transport
        }

        pub fn push(&self, raw: String) {
            if let Some(tx) = self.inbound.lock().as_ref() {
                let _ = tx.try_send(raw);
            }
        }

        pub fn sent_methods(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
                .filter_map(|v| v.get("method").and_then(|m| m.as_str()).map(str::to_string))
                .collect()
        }
    }

    #[async_trait]
    impl McpTransport for ScriptedTransport {
        async fn connect(&self) -> Result<mpsc::Receiver<String>> {
            if let Some(error) = &self.fail_connect {
                return Err(error.clone());
            }
            let (tx, rx) = mpsc::channel(16);
            *self.inbound.lock() = Some(tx);
            self.connected.store(true, Ordering::SeqCst);
            Ok(rx)
        }

        async fn disconnect(&self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            self.inbound.lock().take();
            Ok(())
        }

        async fn send(&self, message: String) -> Result<()> {
            if !self.is_connected() {
                return Err(McpError::Disconnected);
            }
            self.sent.lock().push(message.clone());

            if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(&message) {
                if let Some(result) = (self.responder)(&request) {
                    let reply = if let Some(error) = result.get("__error") {
                        json!({"jsonrpc": "2.0", "id": request.id, "error": error})
                    } else {
                        json!({"jsonrpc": "2.0", "id": request.id, "result": result})
                    };
                    self.push(reply.to_string());
                }
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }
}
