//! Tracker operations: argument shaping, collaborator call, result shape.

use crate::{
    app::catalog::jira::ESSENTIAL_FIELDS,
    domain::{
        error::ToolError,
        models::{SimplifiedView, TransitionRef},
        ports::{
            BoardQuery, IssueDraft, IssueQuery, IssueUpdate, JiraApi, Page, SearchQuery,
            TransitionRequest, WorklogEntry,
        },
        query::{apply_projects_filter, parse_attachment_paths},
        reply::Reply,
        schema::{Access, CoercedArgs},
    },
    shared::text::split_csv,
};
use futures::future::BoxFuture;
use serde_json::json;
use std::path::{Path, PathBuf};

pub type JiraHandler =
    for<'a> fn(&'a dyn JiraApi, CoercedArgs) -> BoxFuture<'a, Result<Reply, ToolError>>;

pub struct JiraRoute {
    pub name: &'static str,
    pub access: Access,
    pub handler: JiraHandler,
}

fn route(name: &'static str, access: Access, handler: JiraHandler) -> JiraRoute {
    JiraRoute {
        name,
        access,
        handler,
    }
}

pub fn routes() -> Vec<JiraRoute> {
    vec![
        route("jira_get_issue", Access::Read, get_issue),
        route("jira_search", Access::Read, search),
        route("jira_get_project_issues", Access::Read, project_issues),
        route("jira_get_epic_issues", Access::Read, epic_issues),
        route("jira_get_transitions", Access::Read, transitions),
        route("jira_get_worklog", Access::Read, worklog),
        route("jira_download_attachments", Access::Read, download_attachments),
        route("jira_get_agile_boards", Access::Read, agile_boards),
        route("jira_get_board_issues", Access::Read, board_issues),
        route("jira_get_sprints_from_board", Access::Read, sprints_from_board),
        route("jira_get_sprint_issues", Access::Read, sprint_issues),
        route("jira_create_issue", Access::Write, create_issue),
        route("jira_update_issue", Access::Write, update_issue),
        route("jira_delete_issue", Access::Write, delete_issue),
        route("jira_add_comment", Access::Write, add_comment),
        route("jira_add_worklog", Access::Write, add_worklog),
        route("jira_link_to_epic", Access::Write, link_to_epic),
        route("jira_transition_issue", Access::Write, transition_issue),
    ]
}

fn page(args: &CoercedArgs) -> Result<Page, ToolError> {
    Ok(Page {
        start_at: args.count("startAt", 0)?,
        limit: args.count("limit", 10)?,
    })
}

fn get_issue(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let query = IssueQuery {
            issue_key: args.require_str("issue_key")?,
            fields: args.str("fields").unwrap_or_else(|| ESSENTIAL_FIELDS.to_string()),
            expand: args.str("expand"),
            comment_limit: args.count("comment_limit", 10)?,
            properties: args.str("properties"),
            update_history: args.flag("update_history").unwrap_or(true),
        };
        let issue = api.get_issue(query).await?;
        Ok(Reply::json(json!({ "content": issue.to_simplified() })))
    })
}

fn search(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let mut jql = args.require_str("jql")?;
        if let Some(filter) = args.str("projects_filter").or_else(|| api.projects_filter()) {
            jql = apply_projects_filter(&jql, &filter);
        }
        let query = SearchQuery {
            jql,
            fields: args.str("fields").unwrap_or_else(|| ESSENTIAL_FIELDS.to_string()),
            page: page(&args)?,
            expand: None,
        };
        let result = api.search_issues(query).await?;
        Ok(Reply::view(&result))
    })
}

fn project_issues(
    api: &dyn JiraApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let project_key = args.require_str("project_key")?;
        let result = api.project_issues(&project_key, page(&args)?).await?;
        Ok(Reply::view(&result))
    })
}

fn epic_issues(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let epic_key = args.require_str("epic_key")?;
        let result = api.epic_issues(&epic_key, page(&args)?).await?;
        Ok(Reply::view(&result))
    })
}

fn transitions(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let transitions = api.transitions(&issue_key).await?;
        Ok(Reply::view(&transitions))
    })
}

fn worklog(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let worklogs = api.worklogs(&issue_key).await?;
        Ok(Reply::json(json!({ "worklogs": worklogs.to_simplified() })))
    })
}

fn download_attachments(
    api: &dyn JiraApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let target_dir = args.require_str("target_dir")?;
        let report = api
            .download_attachments(&issue_key, Path::new(&target_dir))
            .await?;
        Ok(Reply::view(&report))
    })
}

fn agile_boards(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let query = BoardQuery {
            board_name: args.str("board_name"),
            project_key: args.str("project_key"),
            board_type: args.str("board_type"),
            start_at: args.count("startAt", 0)?,
            limit: args.count("limit", 10)?,
        };
        let boards = api.boards(query).await?;
        Ok(Reply::view(&boards))
    })
}

fn board_issues(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let board_id = args.require_str("board_id")?;
        let query = SearchQuery {
            jql: args.require_str("jql")?,
            fields: args.text_or("fields", "*all"),
            page: page(&args)?,
            expand: args.str("expand"),
        };
        let result = api.board_issues(&board_id, query).await?;
        Ok(Reply::view(&result))
    })
}

fn sprints_from_board(
    api: &dyn JiraApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let board_id = args.require_str("board_id")?;
        let state = args.str("state").unwrap_or_else(|| "active".to_string());
        let sprints = api.sprints(&board_id, &state, page(&args)?).await?;
        Ok(Reply::view(&sprints))
    })
}

fn sprint_issues(
    api: &dyn JiraApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let sprint_id = args.require_str("sprint_id")?;
        let fields = args.text_or("fields", "*all");
        let result = api.sprint_issues(&sprint_id, &fields, page(&args)?).await?;
        Ok(Reply::view(&result))
    })
}

fn create_issue(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let draft = IssueDraft {
            project_key: args.require_str("project_key")?,
            summary: args.require_str("summary")?,
            issue_type: args.require_str("issue_type")?,
            description: args.text_or("description", ""),
            assignee: args.str("assignee"),
            components: split_csv(&args.text_or("components", "")),
            additional_fields: args.json_object("additional_fields")?,
        };
        let issue = api.create_issue(draft).await?;
        Ok(Reply::announced("Issue created successfully:", &issue))
    })
}

/// Keeps the paths that exist; the rest are dropped with a warning.
async fn existing_paths(paths: Vec<String>) -> Vec<PathBuf> {
    let mut kept = Vec::with_capacity(paths.len());
    for path in paths {
        let candidate = PathBuf::from(&path);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            kept.push(candidate);
        } else {
            tracing::warn!(%path, "attachment file not found; skipping");
        }
    }
    kept
}

fn update_issue(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let fields = args.json_object("fields")?;
        let additional_fields = args.json_object("additional_fields")?;
        let attachments = match args.get("attachments") {
            Some(raw) => existing_paths(parse_attachment_paths(raw)?).await,
            None => Vec::new(),
        };
        let update = IssueUpdate {
            issue_key,
            fields,
            additional_fields,
            attachments,
        };
        let outcome = api.update_issue(update).await?;
        Ok(Reply::announced("Issue updated successfully:", &outcome))
    })
}

fn delete_issue(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        api.delete_issue(&issue_key).await?;
        Ok(Reply::json(json!({
            "message": format!("Issue {issue_key} has been deleted successfully.")
        })))
    })
}

fn add_comment(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let body = args.require_str("comment")?;
        let comment = api.add_comment(&issue_key, &body).await?;
        Ok(Reply::view(&comment))
    })
}

fn add_worklog(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let entry = WorklogEntry {
            issue_key: args.require_str("issue_key")?,
            time_spent: args.require_str("time_spent")?,
            comment: args.str("comment"),
            started: args.str("started"),
        };
        let worklog = api.add_worklog(entry).await?;
        Ok(Reply::json(json!({
            "message": "Worklog added successfully",
            "worklog": worklog.to_simplified(),
        })))
    })
}

fn link_to_epic(api: &dyn JiraApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let epic_key = args.require_str("epic_key")?;
        let issue = api.link_to_epic(&issue_key, &epic_key).await?;
        Ok(Reply::json(json!({
            "message": format!("Issue {issue_key} has been linked to epic {epic_key}."),
            "issue": issue.to_simplified(),
        })))
    })
}

fn transition_issue(
    api: &dyn JiraApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let issue_key = args.require_str("issue_key")?;
        let transition = TransitionRef::parse(&args.require_str("transition_id")?);
        let request = TransitionRequest {
            issue_key: issue_key.clone(),
            transition: transition.clone(),
            fields: args.json_object("fields")?,
            comment: args.str("comment"),
        };
        let applied = api.transition_issue(request).await?;
        Ok(Reply::json(json!({
            "success": applied,
            "message": format!(
                "Issue {issue_key} has been transitioned with transition ID {transition}"
            ),
        })))
    })
}
