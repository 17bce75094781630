//! Error taxonomy for tool-server connections and calls.

/// Errors produced while connecting to or calling tool servers.
///
/// None of these cross the session boundary as panics or raised
/// errors: below the whole-session level they become connection state
/// transitions or error-shaped strings in
/// [`Session::call`](crate::session::Session::call).
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The server command could not be started. Non-fatal to the
    /// session: that server is marked failed, others proceed.
    #[error("failed to launch tool server: {0}")]
    Launch(String),

    /// The process started but protocol initialization failed.
    #[error("tool server handshake failed: {0}")]
    Handshake(String),

    /// The server rejected or failed a request after the handshake.
    #[error("tool protocol error: {0}")]
    Protocol(String),

    /// Dispatch requested a name absent from the catalog.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The owning connection is not ready (closed, failed, or never
    /// connected).
    #[error("tool server '{0}' is unavailable")]
    ServerUnavailable(String),

    /// The call exceeded its bound. The server process is left
    /// running; a timeout does not necessarily mean it is wedged.
    #[error("tool call '{0}' timed out")]
    Timeout(String),
}

impl From<McpError> for td_domain::error::Error {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Timeout(tool) => td_domain::error::Error::Timeout(tool),
            other => td_domain::error::Error::Other(other.to_string()),
        }
    }
}
