//! `td-mcp-client` — multi-server MCP (Model Context Protocol) client.
//!
//! This crate provides:
//! - A [`ServerConnection`] per configured tool server, running on its
//!   own dedicated task that owns the transport session for its whole
//!   lifetime.
//! - A [`ToolCatalog`] aggregating every server's advertised tools
//!   into a single callable surface.
//! - A [`SessionManager`] that connects to all servers concurrently,
//!   routes calls by name, and rebuilds the whole session
//!   transparently when the configuration changes (detected via
//!   [`fingerprint`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use td_mcp_client::SessionManager;
//!
//! let manager = SessionManager::new(Arc::new(move || load_server_specs()));
//!
//! let session = manager.get_or_create().await;
//! for spec in session.tools() {
//!     println!("{}", spec.function.name);
//! }
//!
//! // Always returns text; errors come back as `{"error": …}` JSON.
//! let text = session.call("read_file", serde_json::json!({"path": "/tmp/x"})).await;
//! ```

pub mod catalog;
pub mod connection;
pub mod error;
pub mod fingerprint;
pub mod session;

// Re-exports for convenience.
pub use catalog::{FunctionSpec, ToolCatalog, ToolDescriptor};
pub use connection::{ConnectionState, ServerConnection};
pub use error::McpError;
pub use fingerprint::fingerprint;
pub use session::{ServerSpecSource, Session, SessionManager};
