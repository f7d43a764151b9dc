use rmcp::{ErrorData as McpError, ServerHandler, model::*};
use std::{sync::Arc, time::Instant};

use crate::{
    app::dispatcher::{Dispatcher, Outcome},
    domain::error::ToolError,
    infra::metrics,
};

const SERVER_NAME: &str = "mcp-atlassian";
/// Metric label shared by every call whose name matched no registered tool.
const UNKNOWN_TOOL_LABEL: &str = "unknown";

fn metric_tool<'a>(name: &'a str, outcome: &Outcome) -> &'a str {
    match outcome {
        Outcome::Failed {
            error: ToolError::UnknownTool(_),
            ..
        } => UNKNOWN_TOOL_LABEL,
        _ => name,
    }
}

#[derive(Clone)]
pub struct AtlassianServer {
    dispatcher: Arc<Dispatcher>,
}

impl AtlassianServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn implementation() -> Implementation {
        Implementation {
            name: SERVER_NAME.into(),
            title: Some("Atlassian MCP".into()),
            version: env!("CARGO_PKG_VERSION").into(),
            icons: None,
            website_url: None,
        }
    }

    fn instructions(&self) -> String {
        let mut text =
            String::from("Tools for Confluence pages and Jira issues on the configured sites.");
        if self.dispatcher.read_only() {
            text.push_str(" Read-only mode: write operations are not offered.");
        }
        text
    }
}

impl ServerHandler for AtlassianServer {
    fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<InitializeResult, McpError>> + Send + '_ {
        tracing::info!(?request.client_info, %request.protocol_version, "initialize received");
        let capabilities = ServerCapabilities::builder().enable_tools().build();
        let init = ServerInfo {
            // echo back the protocol requested by client for compatibility
            protocol_version: request.protocol_version,
            capabilities,
            server_info: Self::implementation(),
            instructions: Some(self.instructions()),
        };
        async move { Ok(init) }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.dispatcher.list_tools();
        tracing::info!(
            count = tools.len(),
            read_only = self.dispatcher.read_only(),
            "list_tools called"
        );
        async move {
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let dispatcher = self.dispatcher.clone();
        async move {
            let _inflight = metrics::InflightGuard::new();
            let timer = Instant::now();
            let name = request.name.to_string();
            tracing::info!(tool = %name, "call_tool received");

            let outcome = dispatcher
                .execute(&name, request.arguments.unwrap_or_default())
                .await;
            metrics::record_call(
                metric_tool(&name, &outcome),
                outcome.label(),
                timer.elapsed(),
            );
            Ok(outcome.into_call_result())
        }
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Self::implementation(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }
}
