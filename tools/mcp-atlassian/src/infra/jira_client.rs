//! Tracker collaborator over Jira REST v2 and Agile 1.0.

use crate::{
    domain::{
        models::{
            AttachmentReport, DownloadedFile, FailedFile, JiraBoard, JiraComment, JiraIssue,
            JiraSearchResult, JiraSprint, JiraTransition, JiraUpdateOutcome, JiraWorklog,
            TransitionRef, UploadResult,
        },
        ports::{
            BoardQuery, IssueDraft, IssueQuery, IssueUpdate, JiraApi, Page, SearchQuery,
            TransitionRequest, WorklogEntry,
        },
    },
    infra::{
        config::ServiceSettings,
        rest::{Endpoint, RestClient, i64_at, id_at, str_at},
    },
    shared::text::split_csv,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::Path;

const API: &str = "rest/api/2";
const AGILE: &str = "rest/agile/1.0";

fn api(route: &str) -> Endpoint {
    Endpoint::route(API).then(route)
}

fn agile(route: &str) -> Endpoint {
    Endpoint::route(AGILE).then(route)
}

fn issue_endpoint(key: &str) -> Endpoint {
    api("issue").id(key)
}

/// Field ids that map onto dedicated [`JiraIssue`] slots.
const KNOWN_FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "issuetype",
    "priority",
    "assignee",
    "reporter",
    "labels",
    "created",
    "updated",
    "comment",
];

pub struct JiraClient {
    rest: RestClient,
    is_cloud: bool,
    projects_filter: Option<String>,
}

impl JiraClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(settings)?,
            is_cloud: settings.is_cloud,
            projects_filter: settings.filter.clone(),
        })
    }

    /// Cloud identifies users by account id, Server/DC by user name.
    fn user_ref(&self, user: &str) -> Value {
        if self.is_cloud {
            json!({ "accountId": user })
        } else {
            json!({ "name": user })
        }
    }

    async fn fetch_issue(&self, issue_key: &str) -> Result<JiraIssue> {
        self.get_issue(IssueQuery {
            issue_key: issue_key.to_string(),
            fields: "*all".to_string(),
            expand: None,
            comment_limit: 10,
            properties: None,
            update_history: false,
        })
        .await
    }

    async fn search_path(&self, endpoint: Endpoint, query: SearchQuery) -> Result<JiraSearchResult> {
        let mut params = vec![
            ("jql", query.jql),
            ("fields", query.fields.clone()),
            ("startAt", query.page.start_at.to_string()),
            ("maxResults", query.page.limit.to_string()),
        ];
        if let Some(expand) = query.expand {
            params.push(("expand", expand));
        }
        let raw = self.rest.get_json(&endpoint, &params).await?;
        Ok(parse_search(&raw, self.rest.base_url(), &split_csv(&query.fields)))
    }

    async fn resolve_transition(&self, issue_key: &str, transition: &TransitionRef) -> Result<String> {
        match transition {
            TransitionRef::Id(id) => Ok(id.to_string()),
            TransitionRef::Name(name) => {
                let available = self.transitions(issue_key).await?;
                available
                    .iter()
                    .find(|t| {
                        t.name.eq_ignore_ascii_case(name)
                            || t.to_status
                                .as_deref()
                                .is_some_and(|status| status.eq_ignore_ascii_case(name))
                    })
                    .map(|t| t.id.clone())
                    .ok_or_else(|| {
                        let names: Vec<&str> = available.iter().map(|t| t.name.as_str()).collect();
                        anyhow!(
                            "Transition '{name}' is not available for {issue_key}. Available: {}",
                            names.join(", ")
                        )
                    })
            }
        }
    }

    /// String assignee values are turned into user references.
    fn normalize_fields(&self, mut fields: Map<String, Value>) -> Map<String, Value> {
        if let Some(Value::String(user)) = fields.get("assignee").cloned() {
            fields.insert("assignee".into(), self.user_ref(&user));
        }
        fields
    }
}

#[async_trait]
impl JiraApi for JiraClient {
    async fn get_issue(&self, query: IssueQuery) -> Result<JiraIssue> {
        let mut params = vec![("fields", query.fields.clone())];
        if let Some(expand) = query.expand {
            params.push(("expand", expand));
        }
        if let Some(properties) = query.properties {
            params.push(("properties", properties));
        }
        if query.update_history {
            params.push(("updateHistory", "true".to_string()));
        }
        let raw = self
            .rest
            .get_json(&issue_endpoint(&query.issue_key), &params)
            .await?;
        let mut issue = parse_issue(&raw, self.rest.base_url(), &split_csv(&query.fields));
        let keep = query.comment_limit as usize;
        if issue.comments.len() > keep {
            issue.comments.drain(..issue.comments.len() - keep);
        }
        Ok(issue)
    }

    async fn search_issues(&self, query: SearchQuery) -> Result<JiraSearchResult> {
        self.search_path(api("search"), query).await
    }

    async fn project_issues(&self, project_key: &str, page: Page) -> Result<JiraSearchResult> {
        let query = SearchQuery {
            jql: format!("project = \"{project_key}\" ORDER BY created DESC"),
            fields: "*all".to_string(),
            page,
            expand: None,
        };
        self.search_issues(query).await
    }

    async fn epic_issues(&self, epic_key: &str, page: Page) -> Result<JiraSearchResult> {
        let query = SearchQuery {
            jql: format!("parent = \"{epic_key}\""),
            fields: "*all".to_string(),
            page,
            expand: None,
        };
        self.search_issues(query).await
    }

    async fn transitions(&self, issue_key: &str) -> Result<Vec<JiraTransition>> {
        let raw = self
            .rest
            .get_json(&issue_endpoint(issue_key).then("transitions"), &[])
            .await?;
        Ok(items(&raw, "/transitions")
            .map(|t| JiraTransition {
                id: id_at(t, "/id").unwrap_or_default(),
                name: str_at(t, "/name").unwrap_or_default(),
                to_status: str_at(t, "/to/name"),
            })
            .collect())
    }

    async fn worklogs(&self, issue_key: &str) -> Result<Vec<JiraWorklog>> {
        let raw = self
            .rest
            .get_json(&issue_endpoint(issue_key).then("worklog"), &[])
            .await?;
        Ok(items(&raw, "/worklogs").map(parse_worklog).collect())
    }

    async fn download_attachments(
        &self,
        issue_key: &str,
        target_dir: &Path,
    ) -> Result<AttachmentReport> {
        let raw = self
            .rest
            .get_json(
                &issue_endpoint(issue_key),
                &[("fields", "attachment".to_string())],
            )
            .await?;
        tokio::fs::create_dir_all(target_dir)
            .await
            .with_context(|| format!("create directory {}", target_dir.display()))?;

        let mut report = AttachmentReport {
            issue_key: issue_key.to_string(),
            ..Default::default()
        };
        for attachment in items(&raw, "/fields/attachment") {
            let filename = str_at(attachment, "/filename").unwrap_or_else(|| "attachment".into());
            let Some(content_url) = str_at(attachment, "/content") else {
                report.failed.push(FailedFile {
                    filename,
                    error: "attachment has no content URL".into(),
                });
                continue;
            };
            let safe_name = Path::new(&filename)
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "attachment".into());
            let path = target_dir.join(safe_name);
            let fetched = match self.rest.get_bytes(&content_url).await {
                Ok(bytes) => tokio::fs::write(&path, &bytes)
                    .await
                    .map(|_| bytes.len() as u64)
                    .with_context(|| format!("write {}", path.display())),
                Err(err) => Err(err),
            };
            match fetched {
                Ok(size) => report.downloaded.push(DownloadedFile {
                    filename,
                    path: path.display().to_string(),
                    size,
                }),
                Err(err) => {
                    tracing::warn!(%issue_key, %filename, error = %format!("{err:#}"), "attachment download failed");
                    report.failed.push(FailedFile {
                        filename,
                        error: format!("{err:#}"),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn boards(&self, query: BoardQuery) -> Result<Vec<JiraBoard>> {
        let mut params = vec![
            ("startAt", query.start_at.to_string()),
            ("maxResults", query.limit.to_string()),
        ];
        if let Some(name) = query.board_name {
            params.push(("name", name));
        }
        if let Some(project) = query.project_key {
            params.push(("projectKeyOrId", project));
        }
        if let Some(kind) = query.board_type {
            params.push(("type", kind));
        }
        let raw = self.rest.get_json(&agile("board"), &params).await?;
        Ok(items(&raw, "/values")
            .map(|b| JiraBoard {
                id: i64_at(b, "/id").unwrap_or_default(),
                name: str_at(b, "/name").unwrap_or_default(),
                board_type: str_at(b, "/type").unwrap_or_default(),
            })
            .collect())
    }

    async fn board_issues(&self, board_id: &str, query: SearchQuery) -> Result<JiraSearchResult> {
        self.search_path(agile("board").id(board_id).then("issue"), query)
            .await
    }

    async fn sprints(&self, board_id: &str, state: &str, page: Page) -> Result<Vec<JiraSprint>> {
        let mut params = vec![
            ("startAt", page.start_at.to_string()),
            ("maxResults", page.limit.to_string()),
        ];
        if !state.trim().is_empty() {
            params.push(("state", state.to_string()));
        }
        let raw = self
            .rest
            .get_json(&agile("board").id(board_id).then("sprint"), &params)
            .await?;
        Ok(items(&raw, "/values")
            .map(|s| JiraSprint {
                id: i64_at(s, "/id").unwrap_or_default(),
                name: str_at(s, "/name").unwrap_or_default(),
                state: str_at(s, "/state").unwrap_or_default(),
                start_date: str_at(s, "/startDate"),
                end_date: str_at(s, "/endDate"),
                goal: str_at(s, "/goal"),
                board_id: i64_at(s, "/originBoardId"),
            })
            .collect())
    }

    async fn sprint_issues(
        &self,
        sprint_id: &str,
        fields: &str,
        page: Page,
    ) -> Result<JiraSearchResult> {
        let params = [
            ("fields", fields.to_string()),
            ("startAt", page.start_at.to_string()),
            ("maxResults", page.limit.to_string()),
        ];
        let raw = self
            .rest
            .get_json(&agile("sprint").id(sprint_id).then("issue"), &params)
            .await?;
        Ok(parse_search(&raw, self.rest.base_url(), &split_csv(fields)))
    }

    async fn create_issue(&self, draft: IssueDraft) -> Result<JiraIssue> {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": draft.project_key }));
        fields.insert("summary".into(), draft.summary.into());
        fields.insert("issuetype".into(), json!({ "name": draft.issue_type }));
        if !draft.description.is_empty() {
            fields.insert("description".into(), draft.description.into());
        }
        if let Some(assignee) = draft.assignee {
            fields.insert("assignee".into(), self.user_ref(&assignee));
        }
        if !draft.components.is_empty() {
            let components: Vec<Value> = draft
                .components
                .iter()
                .map(|name| json!({ "name": name }))
                .collect();
            fields.insert("components".into(), components.into());
        }
        for (key, value) in draft.additional_fields {
            fields.insert(key, value);
        }

        let created = self
            .rest
            .post_json(&api("issue"), &json!({ "fields": fields }))
            .await?;
        let key = str_at(&created, "/key").context("create response carried no issue key")?;
        tracing::info!(issue_key = %key, "issue created");
        self.fetch_issue(&key).await
    }

    async fn update_issue(&self, update: IssueUpdate) -> Result<JiraUpdateOutcome> {
        let mut fields = self.normalize_fields(update.fields);
        for (key, value) in update.additional_fields {
            fields.insert(key, value);
        }
        if !fields.is_empty() {
            self.rest
                .put_json(
                    &issue_endpoint(&update.issue_key),
                    &json!({ "fields": fields }),
                )
                .await?;
        }

        let attachment_results = if update.attachments.is_empty() {
            None
        } else {
            let mut results = Vec::with_capacity(update.attachments.len());
            for path in &update.attachments {
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let uploaded = match tokio::fs::read(path).await {
                    Ok(bytes) => {
                        self.rest
                            .post_multipart(
                                &issue_endpoint(&update.issue_key).then("attachments"),
                                &filename,
                                bytes,
                            )
                            .await
                    }
                    Err(err) => Err(anyhow!("read {}: {err}", path.display())),
                };
                results.push(match uploaded {
                    Ok(_) => UploadResult {
                        filename,
                        success: true,
                        error: None,
                    },
                    Err(err) => UploadResult {
                        filename,
                        success: false,
                        error: Some(format!("{err:#}")),
                    },
                });
            }
            Some(results)
        };

        Ok(JiraUpdateOutcome {
            issue: self.fetch_issue(&update.issue_key).await?,
            attachment_results,
        })
    }

    async fn delete_issue(&self, issue_key: &str) -> Result<()> {
        self.rest.delete(&issue_endpoint(issue_key)).await?;
        Ok(())
    }

    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<JiraComment> {
        let raw = self
            .rest
            .post_json(
                &issue_endpoint(issue_key).then("comment"),
                &json!({ "body": body }),
            )
            .await?;
        Ok(parse_comment(&raw))
    }

    async fn add_worklog(&self, entry: WorklogEntry) -> Result<JiraWorklog> {
        let mut body = json!({ "timeSpent": entry.time_spent });
        if let Some(comment) = entry.comment {
            body["comment"] = comment.into();
        }
        if let Some(started) = entry.started {
            body["started"] = started.into();
        }
        let raw = self
            .rest
            .post_json(&issue_endpoint(&entry.issue_key).then("worklog"), &body)
            .await?;
        Ok(parse_worklog(&raw))
    }

    async fn link_to_epic(&self, issue_key: &str, epic_key: &str) -> Result<JiraIssue> {
        self.rest
            .put_json(
                &issue_endpoint(issue_key),
                &json!({ "fields": { "parent": { "key": epic_key } } }),
            )
            .await?;
        self.fetch_issue(issue_key).await
    }

    async fn transition_issue(&self, request: TransitionRequest) -> Result<bool> {
        let id = self
            .resolve_transition(&request.issue_key, &request.transition)
            .await?;
        let mut body = json!({ "transition": { "id": id } });
        if !request.fields.is_empty() {
            body["fields"] = Value::Object(self.normalize_fields(request.fields));
        }
        if let Some(comment) = request.comment {
            body["update"] = json!({ "comment": [{ "add": { "body": comment } }] });
        }
        self.rest
            .post_json(&issue_endpoint(&request.issue_key).then("transitions"), &body)
            .await?;
        Ok(true)
    }

    fn projects_filter(&self) -> Option<String> {
        self.projects_filter.clone()
    }
}

fn items<'a>(value: &'a Value, pointer: &str) -> impl Iterator<Item = &'a Value> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Plain text from either a string body or an ADF document.
fn body_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        doc @ Value::Object(_) => {
            let mut out = String::new();
            collect_adf_text(doc, &mut out);
            Some(out.trim().to_string())
        }
        other => Some(other.to_string()),
    }
}

fn collect_adf_text(node: &Value, out: &mut String) {
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            collect_adf_text(child, out);
        }
        if node.get("type").and_then(Value::as_str) == Some("paragraph") {
            out.push('\n');
        }
    }
}

fn parse_comment(raw: &Value) -> JiraComment {
    JiraComment {
        id: id_at(raw, "/id").unwrap_or_default(),
        author: str_at(raw, "/author/displayName"),
        body: body_text(raw.get("body")).unwrap_or_default(),
        created: str_at(raw, "/created"),
        updated: str_at(raw, "/updated"),
    }
}

fn parse_worklog(raw: &Value) -> JiraWorklog {
    JiraWorklog {
        id: id_at(raw, "/id").unwrap_or_default(),
        author: str_at(raw, "/author/displayName"),
        comment: body_text(raw.get("comment")),
        time_spent: str_at(raw, "/timeSpent").unwrap_or_default(),
        time_spent_seconds: i64_at(raw, "/timeSpentSeconds").unwrap_or_default(),
        started: str_at(raw, "/started"),
        created: str_at(raw, "/created"),
        updated: str_at(raw, "/updated"),
    }
}

fn parse_search(raw: &Value, base_url: &str, requested: &[String]) -> JiraSearchResult {
    let issues: Vec<JiraIssue> = items(raw, "/issues")
        .map(|issue| parse_issue(issue, base_url, requested))
        .collect();
    JiraSearchResult {
        total: i64_at(raw, "/total").unwrap_or(issues.len() as i64),
        start_at: i64_at(raw, "/startAt").unwrap_or_default(),
        max_results: i64_at(raw, "/maxResults").unwrap_or_default(),
        issues,
    }
}

/// `requested` decides which unmapped fields are carried over; `*all` keeps
/// every non-null one.
fn parse_issue(raw: &Value, base_url: &str, requested: &[String]) -> JiraIssue {
    let key = str_at(raw, "/key").unwrap_or_default();
    let fields = raw.get("fields").and_then(Value::as_object);
    let want_all = requested.iter().any(|f| f == "*all");

    let mut extra_fields = Map::new();
    if let Some(fields) = fields {
        for (name, value) in fields {
            if value.is_null() || KNOWN_FIELDS.contains(&name.as_str()) {
                continue;
            }
            if want_all || requested.iter().any(|f| f == name) {
                extra_fields.insert(name.clone(), value.clone());
            }
        }
    }

    JiraIssue {
        id: id_at(raw, "/id").unwrap_or_default(),
        summary: str_at(raw, "/fields/summary").unwrap_or_default(),
        description: body_text(raw.pointer("/fields/description")),
        status: str_at(raw, "/fields/status/name"),
        issue_type: str_at(raw, "/fields/issuetype/name"),
        priority: str_at(raw, "/fields/priority/name"),
        assignee: str_at(raw, "/fields/assignee/displayName"),
        reporter: str_at(raw, "/fields/reporter/displayName"),
        labels: items(raw, "/fields/labels")
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        created: str_at(raw, "/fields/created"),
        updated: str_at(raw, "/fields/updated"),
        url: (!key.is_empty()).then(|| format!("{base_url}/browse/{key}")),
        comments: items(raw, "/fields/comment/comments")
            .map(parse_comment)
            .collect(),
        extra_fields,
        key,
    }
}
