//! Stdio tool server used by the end-to-end tests.
//!
//! Speaks MCP over stdin/stdout and exposes three tools:
//!
//! - `echo`   — return the given text unchanged
//! - `search` — return a canned result line prefixed with this
//!              instance's label
//! - `sleep`  — sleep for the given number of milliseconds, then
//!              confirm
//!
//! The `--label` flag makes two instances distinguishable from their
//! call results, which the duplicate-tool-name tests rely on.

use std::time::Duration;

use clap::Parser;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};

#[derive(Debug, Parser)]
#[command(name = "td-test-server", version, about)]
struct Cli {
    /// Label prefixed to `search` results.
    #[arg(long, default_value = "test-server")]
    label: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct EchoParams {
    /// Text to echo back.
    text: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct SearchParams {
    /// Query to "search" for.
    query: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct SleepParams {
    /// How long to sleep, in milliseconds.
    millis: u64,
}

#[derive(Clone)]
struct TestServer {
    label: String,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TestServer {
    fn new(label: String) -> Self {
        Self {
            label,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Echo the given text back unchanged.")]
    async fn echo(
        &self,
        Parameters(params): Parameters<EchoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(params.text)]))
    }

    #[tool(description = "Return a canned result line for the given query.")]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(format!(
            "{}: results for '{}'",
            self.label, params.query
        ))]))
    }

    #[tool(description = "Sleep for the given number of milliseconds, then confirm.")]
    async fn sleep(
        &self,
        Parameters(params): Parameters<SleepParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tokio::time::sleep(Duration::from_millis(params.millis)).await;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "slept {}ms",
            params.millis
        ))]))
    }
}

#[tool_handler]
impl ServerHandler for TestServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let service = TestServer::new(cli.label)
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await?;
    service.waiting().await?;
    Ok(())
}
