use anyhow::Result;
use rmcp::{
    ServiceExt,
    model::CallToolRequestParam,
    transport::child_process::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;
use tokio::process::Command;

/// Lists the advertised tools of a locally built server and issues one
/// read call. Credentials come from the caller's environment.
#[tokio::main]
async fn main() -> Result<()> {
    let target_dir = std::env::var("CARGO_TARGET_DIR").unwrap_or_else(|_| "target".into());
    let profile = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    let server_bin = format!("{}/{}/mcp-atlassian", target_dir, profile);

    let service = ()
        .serve(TokioChildProcess::new(
            Command::new(&server_bin).configure(|c| {
                c.arg("--read-only");
                c.env("RUST_LOG", "info");
            }),
        )?)
        .await?;

    let tools = service.list_tools(Default::default()).await?.tools;
    println!(
        "tools_count={} names={:?}",
        tools.len(),
        tools.iter().map(|t| t.name.to_string()).collect::<Vec<_>>()
    );

    let probe = if tools.iter().any(|t| t.name == "confluence_search") {
        Some(("confluence_search", json!({ "query": "type = page", "limit": 1 })))
    } else if tools.iter().any(|t| t.name == "jira_search") {
        Some(("jira_search", json!({ "jql": "order by created DESC", "limit": 1 })))
    } else {
        None
    };

    match probe {
        Some((name, arguments)) => {
            let result = service
                .call_tool(CallToolRequestParam {
                    name: name.into(),
                    arguments: arguments.as_object().cloned(),
                })
                .await?;
            let text = result
                .content
                .first()
                .and_then(|c| c.as_text().map(|t| t.text.clone()))
                .unwrap_or_default();
            println!(
                "probe={} is_error={} bytes={}",
                name,
                result.is_error.unwrap_or(false),
                text.len()
            );
        }
        None => println!("probe_skipped=no_configured_area"),
    }

    service.cancel().await?;
    Ok(())
}
