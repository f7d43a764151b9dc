//! Collaborator contracts consumed by the dispatcher.
//!
//! One handle per product area, constructed at startup and shared across
//! concurrent calls. Implementations own networking, authentication and
//! markup conversion; failures come back as [`anyhow::Error`] and are
//! surfaced verbatim to the caller.

use crate::domain::models::{
    AttachmentReport, ConfluenceComment, ConfluencePage, JiraBoard, JiraComment, JiraIssue,
    JiraSearchResult, JiraSprint, JiraTransition, JiraUpdateOutcome, JiraWorklog, TransitionRef,
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start_at: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub issue_key: String,
    pub fields: String,
    pub expand: Option<String>,
    pub comment_limit: u32,
    pub properties: Option<String>,
    pub update_history: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub jql: String,
    pub fields: String,
    pub page: Page,
    pub expand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardQuery {
    pub board_name: Option<String>,
    pub project_key: Option<String>,
    pub board_type: Option<String>,
    pub start_at: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub project_key: String,
    pub summary: String,
    pub issue_type: String,
    pub description: String,
    pub assignee: Option<String>,
    pub components: Vec<String>,
    pub additional_fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueUpdate {
    pub issue_key: String,
    pub fields: Map<String, Value>,
    pub additional_fields: Map<String, Value>,
    /// Paths already verified to exist.
    pub attachments: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogEntry {
    pub issue_key: String,
    pub time_spent: String,
    pub comment: Option<String>,
    pub started: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub issue_key: String,
    pub transition: TransitionRef,
    pub fields: Map<String, Value>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDraft {
    pub space_key: String,
    pub title: String,
    pub body: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdate {
    pub page_id: String,
    pub title: String,
    pub body: String,
    pub is_minor_edit: bool,
    pub version_comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildrenQuery {
    pub parent_id: String,
    pub expand: String,
    pub start: u32,
    pub limit: u32,
    pub convert_to_markdown: bool,
}

#[async_trait]
pub trait JiraApi: Send + Sync {
    async fn get_issue(&self, query: IssueQuery) -> Result<JiraIssue>;

    async fn search_issues(&self, query: SearchQuery) -> Result<JiraSearchResult>;

    async fn project_issues(&self, project_key: &str, page: Page) -> Result<JiraSearchResult>;

    async fn epic_issues(&self, epic_key: &str, page: Page) -> Result<JiraSearchResult>;

    async fn transitions(&self, issue_key: &str) -> Result<Vec<JiraTransition>>;

    async fn worklogs(&self, issue_key: &str) -> Result<Vec<JiraWorklog>>;

    async fn download_attachments(
        &self,
        issue_key: &str,
        target_dir: &Path,
    ) -> Result<AttachmentReport>;

    async fn boards(&self, query: BoardQuery) -> Result<Vec<JiraBoard>>;

    async fn board_issues(&self, board_id: &str, query: SearchQuery) -> Result<JiraSearchResult>;

    async fn sprints(&self, board_id: &str, state: &str, page: Page) -> Result<Vec<JiraSprint>>;

    async fn sprint_issues(
        &self,
        sprint_id: &str,
        fields: &str,
        page: Page,
    ) -> Result<JiraSearchResult>;

    async fn create_issue(&self, draft: IssueDraft) -> Result<JiraIssue>;

    async fn update_issue(&self, update: IssueUpdate) -> Result<JiraUpdateOutcome>;

    async fn delete_issue(&self, issue_key: &str) -> Result<()>;

    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<JiraComment>;

    async fn add_worklog(&self, entry: WorklogEntry) -> Result<JiraWorklog>;

    async fn link_to_epic(&self, issue_key: &str, epic_key: &str) -> Result<JiraIssue>;

    /// `Ok(false)` when the service accepted the request without applying it.
    async fn transition_issue(&self, request: TransitionRequest) -> Result<bool>;

    /// Configured project restriction applied to searches without an explicit filter.
    fn projects_filter(&self) -> Option<String> {
        None
    }
}

#[async_trait]
pub trait ConfluenceApi: Send + Sync {
    async fn search(&self, cql: &str, limit: u32) -> Result<Vec<ConfluencePage>>;

    async fn get_page(&self, page_id: &str, convert_to_markdown: bool) -> Result<ConfluencePage>;

    async fn page_children(&self, query: ChildrenQuery) -> Result<Vec<ConfluencePage>>;

    async fn page_ancestors(&self, page_id: &str) -> Result<Vec<ConfluencePage>>;

    async fn page_comments(&self, page_id: &str) -> Result<Vec<ConfluenceComment>>;

    async fn create_page(&self, draft: PageDraft) -> Result<ConfluencePage>;

    async fn update_page(&self, update: PageUpdate) -> Result<ConfluencePage>;

    async fn delete_page(&self, page_id: &str) -> Result<bool>;

    async fn attach_content(
        &self,
        page_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<ConfluencePage>;

    fn spaces_filter(&self) -> Option<String> {
        None
    }
}
