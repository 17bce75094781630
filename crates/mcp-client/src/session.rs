//! Session lifecycle: parallel connection establishment, the unified
//! call surface, and configuration-drift detection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rmcp::model::CallToolResult;
use serde_json::{json, Value};

use td_domain::config::ServerSpec;

use crate::catalog::{CatalogBuilder, FunctionSpec, ToolCatalog};
use crate::connection::{ConnectionState, ServerConnection};
use crate::error::McpError;
use crate::fingerprint::fingerprint;

/// Bounded wait for all connection attempts to reach a terminal
/// state. Attempts still connecting when this elapses count as failed
/// for the cycle; no single slow server can starve the rest.
pub const CONNECT_WAIT: Duration = Duration::from_secs(120);

/// Session-level bound on one dispatched call. Strictly greater than
/// [`crate::connection::CALL_TIMEOUT`] so the connection's own
/// timeout reports first and distinctly.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(125);

/// Provider of the currently effective server list.
///
/// Injected into [`SessionManager`] so the manager can detect
/// configuration drift on every access without owning config loading
/// itself. Implemented for any `Fn() -> Vec<ServerSpec>` closure.
pub trait ServerSpecSource: Send + Sync {
    fn server_specs(&self) -> Vec<ServerSpec>;
}

impl<F> ServerSpecSource for F
where
    F: Fn() -> Vec<ServerSpec> + Send + Sync,
{
    fn server_specs(&self) -> Vec<ServerSpec> {
        self()
    }
}

/// The live aggregation of all currently reachable tool servers and
/// their combined catalog.
pub struct Session {
    catalog: ToolCatalog,
    /// Indexed by position in the configured server list; `None` for
    /// entries that were skipped (empty command).
    connections: Vec<Option<ServerConnection>>,
    fingerprint: String,
}

impl Session {
    fn empty(fingerprint: String) -> Self {
        Self {
            catalog: ToolCatalog::default(),
            connections: Vec::new(),
            fingerprint,
        }
    }

    /// The tool list in the calling model's function-calling shape.
    pub fn tools(&self) -> Vec<FunctionSpec> {
        self.catalog.function_specs()
    }

    pub fn tool_count(&self) -> usize {
        self.catalog.len()
    }

    /// A session with no tools is treated as "no session" by the
    /// manager: handed to the caller for graceful degradation, never
    /// cached.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Call a tool by name and return opaque text for the model turn.
    ///
    /// Always returns text, never the protocol's native result type.
    /// Errors are embedded as `{"error": …}` JSON text rather than
    /// raised, so the chat loop can feed the string straight back
    /// into the conversation.
    pub async fn call(&self, name: &str, arguments: Value) -> String {
        let Some(descriptor) = self.catalog.lookup(name) else {
            return error_text(&McpError::ToolNotFound(name.to_string()));
        };
        let Some(connection) = self
            .connections
            .get(descriptor.server)
            .and_then(Option::as_ref)
        else {
            return error_text(&McpError::ServerUnavailable(format!(
                "server #{}",
                descriptor.server
            )));
        };

        let args = arguments.as_object().cloned();
        match tokio::time::timeout(DISPATCH_TIMEOUT, connection.call(name, args)).await {
            Ok(Ok(result)) => render_result(&result),
            Ok(Err(e)) => error_text(&e),
            Err(_) => error_text(&McpError::Timeout(name.to_string())),
        }
    }

    /// Request every connection to stop. Safe with calls in flight
    /// (they finish or hit their own timeout) and safe to call twice.
    pub fn close(&self) {
        for connection in self.connections.iter().flatten() {
            connection.close();
        }
    }
}

/// Render a raw call result as opaque text: the concatenated text
/// blocks, or `{"result":"ok"}` when the server returned no text.
fn render_result(result: &CallToolResult) -> String {
    let mut blocks = Vec::new();
    for content in &result.content {
        if let Ok(value) = serde_json::to_value(content) {
            if let Some(text) = value.get("text").and_then(Value::as_str) {
                if !text.is_empty() {
                    blocks.push(text.to_string());
                }
            }
        }
    }
    if blocks.is_empty() {
        json!({ "result": "ok" }).to_string()
    } else {
        blocks.join("\n")
    }
}

fn error_text(error: &McpError) -> String {
    json!({ "error": error.to_string() }).to_string()
}

/// Owns the session cache and orchestrates reconnects.
///
/// The cache slot is a `tokio::sync::Mutex`, held across the
/// reconnect await on purpose: concurrent `get_or_create` callers
/// serialize instead of racing to build duplicate sessions.
pub struct SessionManager {
    source: Arc<dyn ServerSpecSource>,
    current: tokio::sync::Mutex<Option<Arc<Session>>>,
}

impl SessionManager {
    pub fn new(source: Arc<dyn ServerSpecSource>) -> Self {
        Self {
            source,
            current: tokio::sync::Mutex::new(None),
        }
    }

    /// Return a ready-to-use session.
    ///
    /// If the cached session's fingerprint matches the current
    /// configuration it is returned unchanged (no I/O). Otherwise the
    /// old session is closed before any new connection attempt
    /// begins, and the rebuilt session is cached only when it
    /// registered at least one tool.
    pub async fn get_or_create(&self) -> Arc<Session> {
        let specs = self.source.server_specs();
        let fp = fingerprint(&specs);

        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref() {
            if session.fingerprint() == fp {
                return Arc::clone(session);
            }
            tracing::info!("tool server configuration changed, rebuilding session");
            session.close();
            *current = None;
        }

        let session = Arc::new(connect_all(specs, fp).await);
        if !session.is_empty() {
            *current = Some(Arc::clone(&session));
        }
        session
    }

    /// Drop the cached session so the next access reconnects, even if
    /// the configuration content is unchanged. Does not reconnect
    /// synchronously.
    pub async fn reload(&self) {
        let mut current = self.current.lock().await;
        if let Some(session) = current.take() {
            session.close();
        }
    }

    pub async fn has_cached_session(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

/// Fan out one connection attempt per launchable server entry,
/// concurrently, and collect everything advertised into one catalog.
async fn connect_all(specs: Vec<ServerSpec>, fp: String) -> Session {
    let launchable = specs.iter().filter(|s| s.is_launchable()).count();
    if launchable == 0 {
        tracing::info!("no tool servers configured");
        return Session::empty(fp);
    }
    tracing::info!(servers = launchable, "connecting to tool servers");

    // The one shared mutable structure during the connect phase; each
    // attempt publishes its tools here under the lock.
    let catalog = Arc::new(Mutex::new(CatalogBuilder::default()));
    let mut connections: Vec<Option<ServerConnection>> = Vec::with_capacity(specs.len());
    let mut completions = Vec::new();

    for (index, spec) in specs.into_iter().enumerate() {
        if !spec.is_launchable() {
            connections.push(None);
            continue;
        }
        let (connection, completion) = ServerConnection::spawn(index, spec, Arc::clone(&catalog));
        connections.push(Some(connection));
        completions.push(completion);
    }

    if tokio::time::timeout(CONNECT_WAIT, join_all(completions))
        .await
        .is_err()
    {
        tracing::warn!("timed out waiting for tool servers; stragglers count as failed this cycle");
    }

    // Snapshot now: attempts finishing after the bound publish into
    // the abandoned builder and stay unreachable. The merge resolves
    // name collisions in configuration order, later server wins.
    let catalog = std::mem::take(&mut *catalog.lock()).build();

    if catalog.is_empty() {
        tracing::warn!(
            "no tools registered by any server; check that the configured commands \
             exist (e.g. node/npx or uv on PATH) and that the server entries are valid"
        );
        // An uncached session's connections would leak child
        // processes, so stop them before handing back the empty shell.
        for connection in connections.iter().flatten() {
            connection.close();
        }
        return Session::empty(fp);
    }

    let ready = connections
        .iter()
        .flatten()
        .filter(|c| c.state() == ConnectionState::Ready)
        .count();
    tracing::info!(servers = ready, tools = catalog.len(), "tool catalog built");

    Session {
        catalog,
        connections,
        fingerprint: fp,
    }
}
