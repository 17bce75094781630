//! Tool-server configuration types for the domain layer.
//!
//! These are lightweight config structs used to deserialize the
//! `tool_servers` section of a config file. The actual connection
//! logic lives in the `td-mcp-client` crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level tool-server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolServersConfig {
    /// Ordered list of tool-server definitions. Order matters: on a
    /// tool-name collision the later server owns the name.
    #[serde(default)]
    pub servers: Vec<ServerSpec>,
}

/// Configuration for a single external tool server.
///
/// Immutable once read for a connection attempt; the session
/// fingerprint is computed over the serialized form, so every field
/// participates in change detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSpec {
    /// Human-readable identifier, used in log output.
    pub name: String,

    /// The command to spawn (e.g. `"npx"`). An empty command means
    /// the entry is skipped entirely.
    #[serde(default)]
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variable overrides for the spawned process.
    ///
    /// An empty value means "inherit from the parent process
    /// environment when set, omit otherwise". `BTreeMap` keeps the
    /// serialized form canonical for fingerprinting.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ServerSpec {
    /// Whether this entry describes a launchable server.
    pub fn is_launchable(&self) -> bool {
        !self.command.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_defaults() {
        let cfg: ToolServersConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.servers.is_empty());
    }

    #[test]
    fn deserialize_server_spec() {
        let raw = r#"{
            "name": "filesystem",
            "command": "npx",
            "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
        }"#;
        let spec: ServerSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.name, "filesystem");
        assert_eq!(spec.command, "npx");
        assert_eq!(spec.args.len(), 3);
        assert!(spec.is_launchable());
    }

    #[test]
    fn deserialize_with_env() {
        let raw = r#"{
            "name": "github",
            "command": "npx",
            "args": ["-y", "@modelcontextprotocol/server-github"],
            "env": { "GITHUB_TOKEN": "ghp_xxx", "HOME": "" }
        }"#;
        let spec: ServerSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.env.get("GITHUB_TOKEN").unwrap(), "ghp_xxx");
        assert_eq!(spec.env.get("HOME").unwrap(), "");
    }

    #[test]
    fn missing_command_is_not_launchable() {
        let raw = r#"{ "name": "placeholder" }"#;
        let spec: ServerSpec = serde_json::from_str(raw).unwrap();
        assert!(!spec.is_launchable());
    }
}
