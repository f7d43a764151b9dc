//! In-memory collaborators recording every call they receive.
#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use mcp_atlassian::{
    app::dispatcher::Dispatcher,
    domain::{
        models::{
            AttachmentReport, ConfluenceComment, ConfluencePage, JiraBoard, JiraComment,
            JiraIssue, JiraSearchResult, JiraSprint, JiraTransition, JiraUpdateOutcome,
            JiraWorklog, UploadResult,
        },
        ports::{
            BoardQuery, ChildrenQuery, ConfluenceApi, IssueDraft, IssueQuery, IssueUpdate,
            JiraApi, Page, PageDraft, PageUpdate, SearchQuery, TransitionRequest, WorklogEntry,
        },
    },
};
use parking_lot::Mutex;
use rmcp::model::JsonObject;
use serde_json::{Value, json};
use std::{path::Path, sync::Arc};

#[derive(Debug, Clone)]
pub enum JiraCall {
    GetIssue(IssueQuery),
    Search(SearchQuery),
    ProjectIssues(String, Page),
    EpicIssues(String, Page),
    Transitions(String),
    Worklogs(String),
    Download(String, String),
    Boards(BoardQuery),
    BoardIssues(String, SearchQuery),
    Sprints(String, String, Page),
    SprintIssues(String, String, Page),
    Create(IssueDraft),
    Update(IssueUpdate),
    Delete(String),
    Comment(String, String),
    Worklog(WorklogEntry),
    LinkEpic(String, String),
    Transition(TransitionRequest),
}

#[derive(Default)]
pub struct FakeJira {
    pub calls: Mutex<Vec<JiraCall>>,
    pub projects_filter: Option<String>,
    /// When set, every operation fails with this message.
    pub failure: Option<String>,
}

impl FakeJira {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_projects_filter(filter: &str) -> Self {
        Self {
            projects_filter: Some(filter.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<JiraCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: JiraCall) -> Result<()> {
        self.calls.lock().push(call);
        match &self.failure {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}

pub fn issue(key: &str) -> JiraIssue {
    JiraIssue {
        id: "10001".into(),
        key: key.into(),
        summary: "Checkout fails for café orders".into(),
        status: Some("Open".into()),
        ..Default::default()
    }
}

fn page_of(issues: Vec<JiraIssue>, page: Page) -> JiraSearchResult {
    JiraSearchResult {
        total: issues.len() as i64,
        start_at: page.start_at as i64,
        max_results: page.limit as i64,
        issues,
    }
}

#[async_trait]
impl JiraApi for FakeJira {
    async fn get_issue(&self, query: IssueQuery) -> Result<JiraIssue> {
        let key = query.issue_key.clone();
        self.record(JiraCall::GetIssue(query))?;
        Ok(issue(&key))
    }

    async fn search_issues(&self, query: SearchQuery) -> Result<JiraSearchResult> {
        let page = query.page;
        self.record(JiraCall::Search(query))?;
        Ok(page_of(vec![issue("PROJ-1"), issue("PROJ-2")], page))
    }

    async fn project_issues(&self, project_key: &str, page: Page) -> Result<JiraSearchResult> {
        self.record(JiraCall::ProjectIssues(project_key.into(), page))?;
        Ok(page_of(vec![issue(&format!("{project_key}-1"))], page))
    }

    async fn epic_issues(&self, epic_key: &str, page: Page) -> Result<JiraSearchResult> {
        self.record(JiraCall::EpicIssues(epic_key.into(), page))?;
        Ok(page_of(vec![issue("PROJ-9")], page))
    }

    async fn transitions(&self, issue_key: &str) -> Result<Vec<JiraTransition>> {
        self.record(JiraCall::Transitions(issue_key.into()))?;
        Ok(vec![JiraTransition {
            id: "31".into(),
            name: "Done".into(),
            to_status: Some("Done".into()),
        }])
    }

    async fn worklogs(&self, issue_key: &str) -> Result<Vec<JiraWorklog>> {
        self.record(JiraCall::Worklogs(issue_key.into()))?;
        Ok(vec![JiraWorklog {
            id: "1".into(),
            time_spent: "1h".into(),
            time_spent_seconds: 3600,
            ..Default::default()
        }])
    }

    async fn download_attachments(
        &self,
        issue_key: &str,
        target_dir: &Path,
    ) -> Result<AttachmentReport> {
        self.record(JiraCall::Download(
            issue_key.into(),
            target_dir.display().to_string(),
        ))?;
        Ok(AttachmentReport {
            issue_key: issue_key.into(),
            ..Default::default()
        })
    }

    async fn boards(&self, query: BoardQuery) -> Result<Vec<JiraBoard>> {
        self.record(JiraCall::Boards(query))?;
        Ok(vec![JiraBoard {
            id: 7,
            name: "Team board".into(),
            board_type: "scrum".into(),
        }])
    }

    async fn board_issues(&self, board_id: &str, query: SearchQuery) -> Result<JiraSearchResult> {
        let page = query.page;
        self.record(JiraCall::BoardIssues(board_id.into(), query))?;
        Ok(page_of(vec![issue("PROJ-3")], page))
    }

    async fn sprints(&self, board_id: &str, state: &str, page: Page) -> Result<Vec<JiraSprint>> {
        self.record(JiraCall::Sprints(board_id.into(), state.into(), page))?;
        Ok(vec![JiraSprint {
            id: 5,
            name: "Sprint 5".into(),
            state: state.into(),
            ..Default::default()
        }])
    }

    async fn sprint_issues(
        &self,
        sprint_id: &str,
        fields: &str,
        page: Page,
    ) -> Result<JiraSearchResult> {
        self.record(JiraCall::SprintIssues(sprint_id.into(), fields.into(), page))?;
        Ok(page_of(vec![issue("PROJ-4")], page))
    }

    async fn create_issue(&self, draft: IssueDraft) -> Result<JiraIssue> {
        let key = format!("{}-100", draft.project_key);
        self.record(JiraCall::Create(draft))?;
        Ok(issue(&key))
    }

    async fn update_issue(&self, update: IssueUpdate) -> Result<JiraUpdateOutcome> {
        let key = update.issue_key.clone();
        let uploads = (!update.attachments.is_empty()).then(|| {
            update
                .attachments
                .iter()
                .map(|path| UploadResult {
                    filename: path.display().to_string(),
                    success: true,
                    error: None,
                })
                .collect()
        });
        self.record(JiraCall::Update(update))?;
        Ok(JiraUpdateOutcome {
            issue: issue(&key),
            attachment_results: uploads,
        })
    }

    async fn delete_issue(&self, issue_key: &str) -> Result<()> {
        self.record(JiraCall::Delete(issue_key.into()))
    }

    async fn add_comment(&self, issue_key: &str, body: &str) -> Result<JiraComment> {
        self.record(JiraCall::Comment(issue_key.into(), body.into()))?;
        Ok(JiraComment {
            id: "900".into(),
            body: body.into(),
            ..Default::default()
        })
    }

    async fn add_worklog(&self, entry: WorklogEntry) -> Result<JiraWorklog> {
        let time_spent = entry.time_spent.clone();
        self.record(JiraCall::Worklog(entry))?;
        Ok(JiraWorklog {
            id: "77".into(),
            time_spent,
            ..Default::default()
        })
    }

    async fn link_to_epic(&self, issue_key: &str, epic_key: &str) -> Result<JiraIssue> {
        self.record(JiraCall::LinkEpic(issue_key.into(), epic_key.into()))?;
        Ok(issue(issue_key))
    }

    async fn transition_issue(&self, request: TransitionRequest) -> Result<bool> {
        self.record(JiraCall::Transition(request))?;
        Ok(true)
    }

    fn projects_filter(&self) -> Option<String> {
        self.projects_filter.clone()
    }
}

#[derive(Debug, Clone)]
pub enum ConfluenceCall {
    Search(String, u32),
    GetPage(String, bool),
    Children(ChildrenQuery),
    Ancestors(String),
    Comments(String),
    Create(PageDraft),
    Update(PageUpdate),
    Delete(String),
    Attach(String, String, Vec<u8>),
}

#[derive(Default)]
pub struct FakeConfluence {
    pub calls: Mutex<Vec<ConfluenceCall>>,
    pub spaces_filter: Option<String>,
    /// `delete_page` reports the page as kept.
    pub refuse_delete: bool,
}

impl FakeConfluence {
    pub fn calls(&self) -> Vec<ConfluenceCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ConfluenceCall) {
        self.calls.lock().push(call);
    }
}

pub fn wiki_page(id: &str) -> ConfluencePage {
    ConfluencePage {
        id: id.into(),
        title: "Über den Betrieb".into(),
        space_key: Some("OPS".into()),
        version: Some(3),
        content: "Restart the worker".into(),
        content_format: Some("markdown".into()),
        ..Default::default()
    }
}

#[async_trait]
impl ConfluenceApi for FakeConfluence {
    async fn search(&self, cql: &str, limit: u32) -> Result<Vec<ConfluencePage>> {
        self.record(ConfluenceCall::Search(cql.into(), limit));
        Ok(vec![wiki_page("1")])
    }

    async fn get_page(&self, page_id: &str, convert_to_markdown: bool) -> Result<ConfluencePage> {
        self.record(ConfluenceCall::GetPage(page_id.into(), convert_to_markdown));
        Ok(wiki_page(page_id))
    }

    async fn page_children(&self, query: ChildrenQuery) -> Result<Vec<ConfluencePage>> {
        self.record(ConfluenceCall::Children(query));
        Ok(vec![wiki_page("11"), wiki_page("12")])
    }

    async fn page_ancestors(&self, page_id: &str) -> Result<Vec<ConfluencePage>> {
        self.record(ConfluenceCall::Ancestors(page_id.into()));
        Ok(vec![wiki_page("root")])
    }

    async fn page_comments(&self, page_id: &str) -> Result<Vec<ConfluenceComment>> {
        self.record(ConfluenceCall::Comments(page_id.into()));
        Ok(vec![ConfluenceComment {
            id: "c1".into(),
            body: "Looks good".into(),
            ..Default::default()
        }])
    }

    async fn create_page(&self, draft: PageDraft) -> Result<ConfluencePage> {
        self.record(ConfluenceCall::Create(draft));
        Ok(wiki_page("500"))
    }

    async fn update_page(&self, update: PageUpdate) -> Result<ConfluencePage> {
        let id = update.page_id.clone();
        self.record(ConfluenceCall::Update(update));
        Ok(wiki_page(&id))
    }

    async fn delete_page(&self, page_id: &str) -> Result<bool> {
        self.record(ConfluenceCall::Delete(page_id.into()));
        Ok(!self.refuse_delete)
    }

    async fn attach_content(
        &self,
        page_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<ConfluencePage> {
        self.record(ConfluenceCall::Attach(page_id.into(), name.into(), content));
        Ok(wiki_page(page_id))
    }

    fn spaces_filter(&self) -> Option<String> {
        self.spaces_filter.clone()
    }
}

pub struct Harness {
    pub jira: Arc<FakeJira>,
    pub confluence: Arc<FakeConfluence>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new(read_only: bool) -> Self {
        Self::with(FakeJira::default(), FakeConfluence::default(), read_only)
    }

    pub fn with(jira: FakeJira, confluence: FakeConfluence, read_only: bool) -> Self {
        let jira = Arc::new(jira);
        let confluence = Arc::new(confluence);
        let dispatcher = Dispatcher::new(
            Some(jira.clone() as Arc<dyn JiraApi>),
            Some(confluence.clone() as Arc<dyn ConfluenceApi>),
            read_only,
        );
        Self {
            jira,
            confluence,
            dispatcher,
        }
    }
}

pub fn args(value: Value) -> JsonObject {
    value.as_object().cloned().unwrap_or_default()
}

/// Parses the JSON document of a reply, skipping an optional headline.
pub fn body_json(text: &str) -> Value {
    let start = text.find(['{', '[']).expect("reply carries JSON");
    serde_json::from_str(&text[start..]).expect("valid JSON reply")
}

pub fn empty() -> JsonObject {
    args(json!({}))
}

/// Environment for spawning the server binary against an unreachable
/// tracker, with the wiki area left unconfigured.
pub mod process {
    use assert_cmd::cargo::cargo_bin;
    use rmcp::{
        RoleClient, ServiceExt,
        service::RunningService,
        transport::child_process::{ConfigureCommandExt, TokioChildProcess},
    };
    use std::path::Path;
    use tokio::process::Command;

    const CLEARED: &[&str] = &[
        "READ_ONLY_MODE",
        "APP_CONFIG_PROFILE",
        "JIRA_USERNAME",
        "JIRA_API_TOKEN",
        "JIRA_PROJECTS_FILTER",
        "CONFLUENCE_URL",
        "CONFLUENCE_USERNAME",
        "CONFLUENCE_API_TOKEN",
        "CONFLUENCE_PERSONAL_TOKEN",
        "CONFLUENCE_SPACES_FILTER",
        "METRICS_ADDR",
    ];

    pub async fn spawn(
        config_dir: &Path,
        extra_env: &[(&str, &str)],
        extra_args: &[&str],
    ) -> anyhow::Result<RunningService<RoleClient, ()>> {
        let bin = cargo_bin("mcp-atlassian");
        let missing_env_file = config_dir.join("absent.env");
        let service = ()
            .serve(TokioChildProcess::new(Command::new(&bin).configure(|c| {
                for key in CLEARED {
                    c.env_remove(key);
                }
                c.arg("--env-file").arg(&missing_env_file);
                c.args(extra_args);
                c.env("APP_CONFIG_DIR", config_dir);
                c.env("JIRA_URL", "http://127.0.0.1:9");
                c.env("JIRA_PERSONAL_TOKEN", "test-token");
                c.env("RUST_LOG", "warn");
                for (key, value) in extra_env {
                    c.env(key, value);
                }
            }))?)
            .await?;
        Ok(service)
    }
}
