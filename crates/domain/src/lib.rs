//! `td-domain` — shared types for ToolDock.
//!
//! Holds the configuration structs and the workspace-wide error enum.
//! The config types live here rather than in `td-mcp-client` so that
//! embedders can deserialize a config section without depending on
//! the full MCP client machinery.

pub mod config;
pub mod error;

pub use config::{ServerSpec, ToolServersConfig};
pub use error::{Error, Result};
