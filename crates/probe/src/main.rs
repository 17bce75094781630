//! Probe CLI for exercising a tool-server configuration.
//!
//! Connects to every server in a YAML config file, then either lists
//! the aggregated tools or invokes one of them and prints the result
//! text. Useful for checking a config before wiring it into a host
//! application:
//!
//!   td-probe --config tool_servers.yaml list
//!   td-probe --config tool_servers.yaml call search --args '{"query":"rust"}'

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use td_domain::config::{ServerSpec, ToolServersConfig};
use td_mcp_client::SessionManager;

#[derive(Debug, Parser)]
#[command(name = "td-probe", version, about)]
struct Cli {
    /// Path to the tool server configuration (YAML).
    #[arg(long, default_value = "tool_servers.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to all configured servers and list the aggregated tools.
    List {
        /// Print the model-facing function specs as JSON instead of a
        /// readable listing.
        #[arg(long)]
        json: bool,
    },
    /// Connect and invoke a single tool by name.
    Call {
        /// Tool name as advertised in the catalog.
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let specs = load_specs(&cli.config)?;
    if specs.is_empty() {
        anyhow::bail!("no servers configured in {}", cli.config.display());
    }
    tracing::info!(
        config = %cli.config.display(),
        servers = specs.len(),
        "configuration loaded"
    );

    let manager = SessionManager::new(Arc::new(move || specs.clone()));
    let session = manager.get_or_create().await;

    let outcome = match cli.command {
        Command::List { json } => {
            let tools = session.tools();
            if tools.is_empty() {
                anyhow::bail!("no tools registered by any configured server");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
            } else {
                for spec in &tools {
                    println!("{}\t{}", spec.function.name, spec.function.description);
                }
            }
            Ok(())
        }
        Command::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be a JSON object")?;
            anyhow::ensure!(arguments.is_object(), "--args must be a JSON object");

            let text = session.call(&tool, arguments).await;
            println!("{text}");
            Ok(())
        }
    };

    session.close();
    outcome
}

fn load_specs(path: &PathBuf) -> anyhow::Result<Vec<ServerSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: ToolServersConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config.servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_specs_parses_a_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "servers:\n  - name: fs\n    command: npx\n    args: [\"-y\", \"server-filesystem\"]\n"
        )
        .unwrap();

        let specs = load_specs(&file.path().to_path_buf()).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "fs");
        assert_eq!(specs[0].command, "npx");
        assert_eq!(specs[0].args, vec!["-y", "server-filesystem"]);
    }

    #[test]
    fn load_specs_rejects_missing_files() {
        let missing = PathBuf::from("/nonexistent/tool_servers.yaml");
        let err = load_specs(&missing).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}
