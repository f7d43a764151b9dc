//! Single entry point for tool calls across both product areas.
//!
//! A call walks `received → resolved → policy_checked → args_coerced →
//! collaborator_invoked → formatted`; read-only blocks and faults end it
//! early. Every outcome, including faults, becomes a well-formed result.

use crate::{
    app::{
        handlers::{
            confluence::{self, ConfluenceHandler},
            jira::{self, JiraHandler},
        },
        registry::Toolbox,
    },
    domain::{
        error::{ProductArea, ToolError},
        ports::{ConfluenceApi, JiraApi},
        run::DispatchRun,
        schema::{Access, ToolSchema},
    },
    shared::text::pretty_json,
};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};

#[derive(Clone, Copy)]
enum Handler {
    Jira(JiraHandler),
    Confluence(ConfluenceHandler),
}

#[derive(Clone, Copy)]
struct Route {
    access: Access,
    handler: Handler,
}

fn route_table() -> HashMap<&'static str, Route> {
    let jira_routes = jira::routes().into_iter().map(|r| {
        (
            r.name,
            Route {
                access: r.access,
                handler: Handler::Jira(r.handler),
            },
        )
    });
    let confluence_routes = confluence::routes().into_iter().map(|r| {
        (
            r.name,
            Route {
                access: r.access,
                handler: Handler::Confluence(r.handler),
            },
        )
    });
    jira_routes.chain(confluence_routes).collect()
}

pub fn read_only_notice(name: &str) -> String {
    format!("Operation '{name}' is not available in read-only mode.")
}

/// Uniform failure document returned for every fault.
pub fn error_payload(tool: &str, error: &ToolError) -> Value {
    let mut payload = json!({
        "error": format!("Error executing {tool}: {error}"),
        "tool": tool,
        "code": error.code(),
    });
    if let Some(field) = error.field() {
        payload["field"] = field.into();
    }
    payload
}

#[derive(Debug)]
pub enum Outcome {
    Success(String),
    Blocked(String),
    Failed { tool: String, error: ToolError },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Blocked(_) => "blocked",
            Outcome::Failed { .. } => "failed",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn text(&self) -> String {
        match self {
            Outcome::Success(text) | Outcome::Blocked(text) => text.clone(),
            Outcome::Failed { tool, error } => pretty_json(&error_payload(tool, error)),
        }
    }

    pub fn into_call_result(self) -> CallToolResult {
        let content = vec![Content::text(self.text())];
        if self.is_error() {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

pub struct Dispatcher {
    jira_tools: Toolbox,
    confluence_tools: Toolbox,
    jira: Option<Arc<dyn JiraApi>>,
    confluence: Option<Arc<dyn ConfluenceApi>>,
    read_only: bool,
    routes: HashMap<&'static str, Route>,
}

impl Dispatcher {
    pub fn new(
        jira: Option<Arc<dyn JiraApi>>,
        confluence: Option<Arc<dyn ConfluenceApi>>,
        read_only: bool,
    ) -> Self {
        Self::with_toolboxes(
            Toolbox::jira(),
            Toolbox::confluence(),
            jira,
            confluence,
            read_only,
        )
    }

    pub fn with_toolboxes(
        jira_tools: Toolbox,
        confluence_tools: Toolbox,
        jira: Option<Arc<dyn JiraApi>>,
        confluence: Option<Arc<dyn ConfluenceApi>>,
        read_only: bool,
    ) -> Self {
        Self {
            jira_tools,
            confluence_tools,
            jira,
            confluence,
            read_only,
            routes: route_table(),
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Toolboxes in listing order.
    pub fn toolboxes(&self) -> [&Toolbox; 2] {
        [&self.confluence_tools, &self.jira_tools]
    }

    pub fn route_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.routes.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn route_access(&self, name: &str) -> Option<Access> {
        self.routes.get(name).map(|route| route.access)
    }

    pub fn is_configured(&self, area: ProductArea) -> bool {
        match area {
            ProductArea::Jira => self.jira.is_some(),
            ProductArea::Confluence => self.confluence.is_some(),
        }
    }

    /// Catalog advertised to callers: configured areas only, filtered by mode.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.toolboxes()
            .into_iter()
            .filter(|toolbox| self.is_configured(toolbox.area()))
            .flat_map(|toolbox| toolbox.describe_all(self.read_only))
            .collect()
    }

    fn resolve(&self, name: &str) -> Option<(ProductArea, &ToolSchema)> {
        [&self.jira_tools, &self.confluence_tools]
            .into_iter()
            .find_map(|toolbox| toolbox.lookup(name).map(|tool| (toolbox.area(), tool)))
    }

    pub async fn execute(&self, name: &str, raw: JsonObject) -> Outcome {
        let mut run = DispatchRun::new();
        tracing::debug!(run_id = %run.id, tool = name, "dispatch received");

        let failed = |run: &mut DispatchRun, error: ToolError| {
            run.fail();
            match &error {
                ToolError::Collaborator(err) => {
                    tracing::error!(run_id = %run.id, tool = name, error = %format!("{err:#}"), "collaborator call failed")
                }
                other => {
                    tracing::warn!(run_id = %run.id, tool = name, code = other.code(), %other, "tool call rejected")
                }
            }
            Outcome::Failed {
                tool: name.to_string(),
                error,
            }
        };

        let Some((area, schema)) = self.resolve(name) else {
            return failed(&mut run, ToolError::UnknownTool(name.to_string()));
        };
        run.resolve();

        if self.read_only && schema.is_write() {
            run.block();
            tracing::info!(run_id = %run.id, tool = name, "write blocked by read-only mode");
            return Outcome::Blocked(read_only_notice(name));
        }
        run.check_policy();

        let Some(route) = self.routes.get(name).copied() else {
            return failed(&mut run, ToolError::NotImplemented(name.to_string()));
        };
        if !self.is_configured(area) {
            return failed(&mut run, ToolError::NotConfigured(area));
        }
        if self.read_only && route.access == Access::Write {
            run.block();
            tracing::info!(run_id = %run.id, tool = name, "write blocked at route");
            return Outcome::Blocked(read_only_notice(name));
        }

        let args = schema.coerce(&raw);
        run.coerce();
        if let Some(missing) = schema.missing_required(&args) {
            return failed(&mut run, ToolError::missing(missing));
        }

        run.invoke();
        let result = match route.handler {
            Handler::Jira(handler) => match &self.jira {
                Some(api) => handler(api.as_ref(), args).await,
                None => Err(ToolError::NotConfigured(ProductArea::Jira)),
            },
            Handler::Confluence(handler) => match &self.confluence {
                Some(api) => handler(api.as_ref(), args).await,
                None => Err(ToolError::NotConfigured(ProductArea::Confluence)),
            },
        };

        match result {
            Ok(reply) => {
                run.format();
                tracing::info!(
                    run_id = %run.id,
                    tool = name,
                    elapsed_ms = run.elapsed().as_millis() as u64,
                    "tool call completed"
                );
                Outcome::Success(reply.render())
            }
            Err(error) => failed(&mut run, error),
        }
    }

    pub async fn call(&self, name: &str, raw: JsonObject) -> CallToolResult {
        self.execute(name, raw).await.into_call_result()
    }
}
