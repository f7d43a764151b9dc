//! Entities returned by the collaborators and their simplified projections.

use serde_json::{Map, Value, json};
use std::fmt;

/// Canonical, serialization-ready projection of a collaborator entity.
pub trait SimplifiedView {
    fn to_simplified(&self) -> Value;
}

impl<T: SimplifiedView> SimplifiedView for Vec<T> {
    fn to_simplified(&self) -> Value {
        Value::Array(self.iter().map(SimplifiedView::to_simplified).collect())
    }
}

impl SimplifiedView for Value {
    fn to_simplified(&self) -> Value {
        self.clone()
    }
}

fn put_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.into(), value.clone().into());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraComment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl SimplifiedView for JiraComment {
    fn to_simplified(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), self.id.clone().into());
        map.insert("body".into(), self.body.clone().into());
        put_opt(&mut map, "author", &self.author);
        put_opt(&mut map, "created", &self.created);
        put_opt(&mut map, "updated", &self.updated);
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraIssue {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub labels: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub url: Option<String>,
    pub comments: Vec<JiraComment>,
    /// Requested fields without a dedicated slot, keyed by field id.
    pub extra_fields: Map<String, Value>,
}

impl SimplifiedView for JiraIssue {
    fn to_simplified(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), self.id.clone().into());
        map.insert("key".into(), self.key.clone().into());
        map.insert("summary".into(), self.summary.clone().into());
        put_opt(&mut map, "url", &self.url);
        put_opt(&mut map, "description", &self.description);
        if let Some(status) = &self.status {
            map.insert("status".into(), json!({ "name": status }));
        }
        if let Some(issue_type) = &self.issue_type {
            map.insert("issue_type".into(), json!({ "name": issue_type }));
        }
        if let Some(priority) = &self.priority {
            map.insert("priority".into(), json!({ "name": priority }));
        }
        if let Some(assignee) = &self.assignee {
            map.insert("assignee".into(), json!({ "display_name": assignee }));
        }
        if let Some(reporter) = &self.reporter {
            map.insert("reporter".into(), json!({ "display_name": reporter }));
        }
        if !self.labels.is_empty() {
            map.insert("labels".into(), self.labels.clone().into());
        }
        put_opt(&mut map, "created", &self.created);
        put_opt(&mut map, "updated", &self.updated);
        if !self.comments.is_empty() {
            map.insert("comments".into(), self.comments.to_simplified());
        }
        for (field, value) in &self.extra_fields {
            map.entry(field.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(map)
    }
}

/// One page of issues from any paginated query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraSearchResult {
    pub total: i64,
    pub start_at: i64,
    pub max_results: i64,
    pub issues: Vec<JiraIssue>,
}

impl SimplifiedView for JiraSearchResult {
    fn to_simplified(&self) -> Value {
        json!({
            "total": self.total,
            "start_at": self.start_at,
            "max_results": self.max_results,
            "issues": self.issues.to_simplified(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
    pub to_status: Option<String>,
}

impl SimplifiedView for JiraTransition {
    fn to_simplified(&self) -> Value {
        json!({ "id": self.id, "name": self.name, "to_status": self.to_status })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraWorklog {
    pub id: String,
    pub author: Option<String>,
    pub comment: Option<String>,
    pub time_spent: String,
    pub time_spent_seconds: i64,
    pub started: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl SimplifiedView for JiraWorklog {
    fn to_simplified(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), self.id.clone().into());
        map.insert("time_spent".into(), self.time_spent.clone().into());
        map.insert("time_spent_seconds".into(), self.time_spent_seconds.into());
        put_opt(&mut map, "author", &self.author);
        put_opt(&mut map, "comment", &self.comment);
        put_opt(&mut map, "started", &self.started);
        put_opt(&mut map, "created", &self.created);
        put_opt(&mut map, "updated", &self.updated);
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraBoard {
    pub id: i64,
    pub name: String,
    pub board_type: String,
}

impl SimplifiedView for JiraBoard {
    fn to_simplified(&self) -> Value {
        json!({ "id": self.id.to_string(), "name": self.name, "type": self.board_type })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraSprint {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub goal: Option<String>,
    pub board_id: Option<i64>,
}

impl SimplifiedView for JiraSprint {
    fn to_simplified(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), self.id.to_string().into());
        map.insert("name".into(), self.name.clone().into());
        map.insert("state".into(), self.state.clone().into());
        put_opt(&mut map, "start_date", &self.start_date);
        put_opt(&mut map, "end_date", &self.end_date);
        put_opt(&mut map, "goal", &self.goal);
        if let Some(board_id) = self.board_id {
            map.insert("board_id".into(), board_id.to_string().into());
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub filename: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Outcome of fetching every attachment of an issue into a directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentReport {
    pub issue_key: String,
    pub downloaded: Vec<DownloadedFile>,
    pub failed: Vec<FailedFile>,
}

impl SimplifiedView for AttachmentReport {
    fn to_simplified(&self) -> Value {
        let total = self.downloaded.len() + self.failed.len();
        json!({
            "success": self.failed.is_empty(),
            "issue_key": self.issue_key,
            "total": total,
            "downloaded": self.downloaded.iter().map(|file| json!({
                "filename": file.filename,
                "path": file.path,
                "size": file.size,
            })).collect::<Vec<_>>(),
            "failed": self.failed.iter().map(|file| json!({
                "filename": file.filename,
                "error": file.error,
            })).collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub filename: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Updated issue plus per-file results when uploads were attempted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JiraUpdateOutcome {
    pub issue: JiraIssue,
    pub attachment_results: Option<Vec<UploadResult>>,
}

impl SimplifiedView for JiraUpdateOutcome {
    fn to_simplified(&self) -> Value {
        let mut view = self.issue.to_simplified();
        if let (Some(results), Value::Object(map)) = (&self.attachment_results, &mut view) {
            let results = results
                .iter()
                .map(|upload| {
                    let mut entry = json!({ "filename": upload.filename, "success": upload.success });
                    if let Some(error) = &upload.error {
                        entry["error"] = error.clone().into();
                    }
                    entry
                })
                .collect::<Vec<_>>();
            map.insert("attachment_results".into(), results.into());
        }
        view
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfluencePage {
    pub id: String,
    pub title: String,
    pub space_key: Option<String>,
    pub space_name: Option<String>,
    pub version: Option<i64>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    /// Body as fetched; empty when the body was not expanded.
    pub content: String,
    pub content_format: Option<String>,
}

impl SimplifiedView for ConfluencePage {
    fn to_simplified(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), self.id.clone().into());
        map.insert("title".into(), self.title.clone().into());
        map.insert("type".into(), "page".into());
        if self.space_key.is_some() || self.space_name.is_some() {
            map.insert(
                "space".into(),
                json!({ "key": self.space_key, "name": self.space_name }),
            );
        }
        if let Some(version) = self.version {
            map.insert("version".into(), version.into());
        }
        put_opt(&mut map, "url", &self.url);
        put_opt(&mut map, "author", &self.author);
        put_opt(&mut map, "created", &self.created);
        put_opt(&mut map, "updated", &self.updated);
        if !self.content.is_empty() {
            map.insert(
                "content".into(),
                json!({
                    "value": self.content,
                    "format": self.content_format.as_deref().unwrap_or("storage"),
                }),
            );
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfluenceComment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub created: Option<String>,
}

impl SimplifiedView for ConfluenceComment {
    fn to_simplified(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), self.id.clone().into());
        map.insert("body".into(), self.body.clone().into());
        put_opt(&mut map, "author", &self.author);
        put_opt(&mut map, "created", &self.created);
        Value::Object(map)
    }
}

/// Transition target: numeric ids go out as numbers, anything else is
/// resolved by name against the issue's available transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRef {
    Id(i64),
    Name(String),
}

impl TransitionRef {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => TransitionRef::Id(id),
            Err(_) => TransitionRef::Name(trimmed.to_string()),
        }
    }
}

impl fmt::Display for TransitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionRef::Id(id) => write!(f, "{id}"),
            TransitionRef::Name(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_is_wrapped_with_pagination() {
        let result = JiraSearchResult {
            total: 42,
            start_at: 10,
            max_results: 5,
            issues: vec![JiraIssue {
                key: "PROJ-1".into(),
                summary: "First".into(),
                ..Default::default()
            }],
        };
        let view = result.to_simplified();
        assert_eq!(view["total"], 42);
        assert_eq!(view["start_at"], 10);
        assert_eq!(view["max_results"], 5);
        assert_eq!(view["issues"][0]["key"], "PROJ-1");
    }

    #[test]
    fn issue_view_keeps_extra_fields_without_overriding() {
        let mut issue = JiraIssue {
            key: "PROJ-2".into(),
            status: Some("Done".into()),
            ..Default::default()
        };
        issue.extra_fields.insert("customfield_10010".into(), json!(5));
        issue.extra_fields.insert("key".into(), json!("shadow"));
        let view = issue.to_simplified();
        assert_eq!(view["status"]["name"], "Done");
        assert_eq!(view["customfield_10010"], 5);
        assert_eq!(view["key"], "PROJ-2");
    }

    #[test]
    fn update_outcome_lists_upload_results() {
        let outcome = JiraUpdateOutcome {
            issue: JiraIssue::default(),
            attachment_results: Some(vec![UploadResult {
                filename: "a.txt".into(),
                success: true,
                error: None,
            }]),
        };
        let view = outcome.to_simplified();
        assert_eq!(view["attachment_results"][0]["filename"], "a.txt");
        assert!(JiraUpdateOutcome::default().to_simplified().get("attachment_results").is_none());
    }

    #[test]
    fn transition_ref_parses_numeric_ids() {
        assert_eq!(TransitionRef::parse(" 31 "), TransitionRef::Id(31));
        assert_eq!(
            TransitionRef::parse("In Progress"),
            TransitionRef::Name("In Progress".into())
        );
    }
}
