//! One connection to one external tool server.
//!
//! Each connection runs on a dedicated task that owns the transport
//! session for its entire lifetime: the underlying session is not
//! safely shared across arbitrary schedulers, so all calls against a
//! server are messages into that task's inbox, with the result coming
//! back over a oneshot channel.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
};
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use td_domain::config::ServerSpec;

use crate::catalog::{CatalogBuilder, ToolDescriptor};
use crate::error::McpError;

/// Timeout applied to a single tool call inside the connection's own
/// execution context. The session-level dispatch bound is strictly
/// larger, so this layer reports its own timeout first.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Capacity of the per-connection call inbox.
const INBOX_CAPACITY: usize = 32;

/// Lifecycle state of a server connection.
///
/// `Connecting → Ready` on successful handshake plus tool listing,
/// `Connecting → Failed` on any connect error, `Ready → Closed` only
/// via an explicit stop request. There is no automatic reconnection
/// at this level: reconnection is always a whole-session operation,
/// since partial reconnects would leave catalog ownership stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Failed,
    Closed,
}

/// A call submitted into the connection's inbox.
struct CallRequest {
    tool: String,
    arguments: Option<serde_json::Map<String, serde_json::Value>>,
    reply: oneshot::Sender<Result<CallToolResult, McpError>>,
}

/// Handle to one tool-server connection.
///
/// Dropping the handle cancels the connection task, so an abandoned
/// session cannot leak child processes.
pub struct ServerConnection {
    name: String,
    state: Arc<Mutex<ConnectionState>>,
    calls: mpsc::Sender<CallRequest>,
    cancel: CancellationToken,
}

impl ServerConnection {
    /// Start a connection attempt for `spec`.
    ///
    /// Returns the handle immediately (state `Connecting`) plus a
    /// receiver that fires once the attempt reaches a terminal state
    /// (`Ready` or `Failed`). On success the server's tools have been
    /// published into `catalog` before the receiver fires.
    pub(crate) fn spawn(
        index: usize,
        spec: ServerSpec,
        catalog: Arc<Mutex<CatalogBuilder>>,
    ) -> (Self, oneshot::Receiver<()>) {
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let (calls_tx, calls_rx) = mpsc::channel(INBOX_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let connection = Self {
            name: spec.name.clone(),
            state: Arc::clone(&state),
            calls: calls_tx,
            cancel: cancel.clone(),
        };

        tokio::spawn(run(index, spec, catalog, state, calls_rx, cancel, done_tx));

        (connection, done_rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Submit a call to this connection's task and wait for the result.
    ///
    /// Fails with [`McpError::ServerUnavailable`] when the connection
    /// is not ready or its task has already shut down.
    pub async fn call(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        if self.state() != ConnectionState::Ready {
            return Err(McpError::ServerUnavailable(self.name.clone()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = CallRequest {
            tool: tool.to_string(),
            arguments,
            reply: reply_tx,
        };

        if self.calls.send(request).await.is_err() {
            return Err(McpError::ServerUnavailable(self.name.clone()));
        }

        // A dropped reply sender means the task shut down mid-call.
        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(McpError::ServerUnavailable(self.name.clone())),
        }
    }

    /// Request the connection task to stop. Idempotent. An in-flight
    /// call is allowed to finish or hit its own timeout first; queued
    /// calls fail with an unavailability error.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The connection task: connect, publish tools, then serve the inbox
/// until cancelled.
async fn run(
    index: usize,
    spec: ServerSpec,
    catalog: Arc<Mutex<CatalogBuilder>>,
    state: Arc<Mutex<ConnectionState>>,
    mut calls: mpsc::Receiver<CallRequest>,
    cancel: CancellationToken,
    done: oneshot::Sender<()>,
) {
    tracing::info!(server = %spec.name, command = %spec.command, "connecting to tool server");

    let service = match establish(index, &spec).await {
        Ok((service, tools)) => {
            let tool_count = tools.len();
            // The builder is the one structure shared between
            // concurrently connecting servers; hold the lock only for
            // this server's insertions.
            catalog.lock().publish(index, tools);
            *state.lock() = ConnectionState::Ready;
            tracing::info!(server = %spec.name, tool_count, "tool server connected");
            service
        }
        Err(e) => {
            *state.lock() = ConnectionState::Failed;
            tracing::warn!(server = %spec.name, error = %e, "tool server connection failed");
            let _ = done.send(());
            return;
        }
    };
    let _ = done.send(());

    let peer = service.peer().clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            request = calls.recv() => match request {
                Some(request) => handle_call(&peer, request).await,
                None => break,
            },
        }
    }

    *state.lock() = ConnectionState::Closed;
    drop(calls);
    if let Err(e) = service.cancel().await {
        tracing::debug!(server = %spec.name, error = ?e, "error shutting down tool server transport");
    }
    tracing::debug!(server = %spec.name, "tool server connection closed");
}

/// Launch the process, perform the handshake, and list tools.
///
/// All-or-nothing: any failure here leaves no partial entries behind,
/// the caller publishes the returned descriptors only on success.
async fn establish(
    index: usize,
    spec: &ServerSpec,
) -> Result<(RunningService<RoleClient, ClientInfo>, Vec<ToolDescriptor>), McpError> {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);
    for (key, value) in resolve_env(&spec.env) {
        cmd.env(key, value);
    }
    // Tool servers tend to log freely on stderr; keep that out of our
    // own output.
    cmd.stderr(Stdio::null());

    let transport = TokioChildProcess::new(cmd)
        .map_err(|e| McpError::Launch(format!("{}: {e}", spec.command)))?;

    let service = client_info()
        .serve(transport)
        .await
        .map_err(|e| McpError::Handshake(e.to_string()))?;

    let listed = service
        .peer()
        .list_tools(None)
        .await
        .map_err(|e| McpError::Handshake(format!("tools/list failed: {e}")))?;

    let tools = listed
        .tools
        .into_iter()
        .map(|tool| ToolDescriptor::from_tool(index, tool))
        .collect();

    Ok((service, tools))
}

/// Execute one call on the connection's own task, bounded by
/// [`CALL_TIMEOUT`]. The reply receiver may be gone (dispatch timeout
/// on the session side); that is not an error here.
async fn handle_call(peer: &Peer<RoleClient>, request: CallRequest) {
    let params = CallToolRequestParams {
        name: request.tool.clone().into(),
        arguments: Some(request.arguments.unwrap_or_default()),
        meta: None,
        task: None,
    };

    let outcome = match tokio::time::timeout(CALL_TIMEOUT, peer.call_tool(params)).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(McpError::Protocol(e.to_string())),
        Err(_) => Err(McpError::Timeout(request.tool)),
    };

    let _ = request.reply.send(outcome);
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "tooldock".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: None,
            website_url: None,
        },
    }
}

/// Resolve environment overrides for a server process.
///
/// A non-empty value is passed through as-is. An empty value means
/// "inherit": forward the variable from the parent environment when
/// it is set there, omit it otherwise.
fn resolve_env(overrides: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut resolved = Vec::with_capacity(overrides.len());
    for (key, value) in overrides {
        if value.is_empty() {
            if let Ok(ambient) = std::env::var(key) {
                if !ambient.is_empty() {
                    resolved.push((key.clone(), ambient));
                }
            }
        } else {
            resolved.push((key.clone(), value.clone()));
        }
    }
    resolved
}
