use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use mcp_atlassian::{
    domain::{
        models::TransitionRef,
        ports::{
            ConfluenceApi, IssueDraft, IssueQuery, JiraApi, Page, PageUpdate, SearchQuery,
            TransitionRequest,
        },
    },
    infra::{
        config::{Auth, ServiceSettings},
        confluence_client::ConfluenceClient,
        jira_client::JiraClient,
    },
};
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
struct Seen {
    method: String,
    path: String,
    query: HashMap<String, String>,
    auth: Option<String>,
    body: String,
}

impl Seen {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Canned Atlassian endpoint that records every request it receives.
#[derive(Default)]
struct MockSite {
    routes: HashMap<(String, String), (u16, Value)>,
    seen: Mutex<Vec<Seen>>,
}

impl MockSite {
    fn route(mut self, method: &str, path: &str, status: u16, body: Value) -> Self {
        self.routes
            .insert((method.to_string(), path.to_string()), (status, body));
        self
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    fn find(&self, method: &str, path: &str) -> Seen {
        self.seen()
            .into_iter()
            .find(|s| s.method == method && s.path == path)
            .unwrap_or_else(|| panic!("no {method} {path} in {:?}", self.seen()))
    }
}

async fn answer(
    State(site): State<Arc<MockSite>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = Url::parse(&format!("http://mock{uri}"))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default();
    site.seen.lock().push(Seen {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        auth: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let (status, payload) = site
        .routes
        .get(&(method.to_string(), uri.path().to_string()))
        .cloned()
        .unwrap_or((404, json!({ "errorMessages": ["Issue does not exist"] })));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let text = if payload.is_null() {
        String::new()
    } else {
        payload.to_string()
    };
    (status, [(header::CONTENT_TYPE, "application/json")], text).into_response()
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

fn mount(listener: TcpListener, site: MockSite) -> Arc<MockSite> {
    let site = Arc::new(site);
    let app = Router::new().fallback(answer).with_state(site.clone());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.ok();
    });
    site
}

async fn serve(site: MockSite) -> (Arc<MockSite>, String) {
    let (listener, base) = bind().await;
    (mount(listener, site), base)
}

fn settings(base: &str, auth: Auth, is_cloud: bool) -> ServiceSettings {
    ServiceSettings {
        url: Url::parse(base).unwrap(),
        auth,
        ssl_verify: true,
        is_cloud,
        filter: None,
    }
}

fn bearer(base: &str) -> ServiceSettings {
    settings(base, Auth::Bearer("secret-pat".into()), false)
}

fn raw_issue(key: &str) -> Value {
    json!({
        "id": "10001",
        "key": key,
        "fields": {
            "summary": "Payment retries loop",
            "status": { "name": "In Progress" },
            "labels": ["billing"],
            "customfield_10010": { "value": "High impact" },
            "environment": null,
            "comment": { "comments": [
                { "id": "1", "body": "first", "author": { "displayName": "Ana" } },
                { "id": "2", "body": "second", "author": { "displayName": "Ben" } },
                { "id": "3", "body": "third", "author": { "displayName": "Ana" } }
            ] }
        }
    })
}

#[tokio::test]
async fn issue_fetch_sends_options_and_trims_comments() -> Result<()> {
    let (site, base) = serve(MockSite::default().route(
        "GET",
        "/rest/api/2/issue/PROJ-1",
        200,
        raw_issue("PROJ-1"),
    ))
    .await;
    let client = JiraClient::new(&bearer(&base))?;

    let issue = client
        .get_issue(IssueQuery {
            issue_key: "PROJ-1".into(),
            fields: "summary,status,customfield_10010,environment".into(),
            expand: Some("renderedFields".into()),
            comment_limit: 2,
            properties: None,
            update_history: true,
        })
        .await?;

    assert_eq!(issue.key, "PROJ-1");
    assert_eq!(issue.status.as_deref(), Some("In Progress"));
    assert_eq!(
        issue.comments.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec!["2", "3"]
    );
    assert_eq!(issue.extra_fields.len(), 1);
    assert!(issue.extra_fields.contains_key("customfield_10010"));
    assert_eq!(issue.url, Some(format!("{base}/browse/PROJ-1")));

    let seen = site.find("GET", "/rest/api/2/issue/PROJ-1");
    assert_eq!(seen.auth.as_deref(), Some("Bearer secret-pat"));
    assert_eq!(seen.query["expand"], "renderedFields");
    assert_eq!(seen.query["updateHistory"], "true");
    assert!(!seen.query.contains_key("properties"));
    Ok(())
}

#[tokio::test]
async fn search_pages_through_jql() -> Result<()> {
    let (site, base) = serve(MockSite::default().route(
        "GET",
        "/rest/api/2/search",
        200,
        json!({
            "total": 42,
            "startAt": 10,
            "maxResults": 5,
            "issues": [raw_issue("PROJ-7")]
        }),
    ))
    .await;
    let client = JiraClient::new(&bearer(&base))?;

    let result = client
        .search_issues(SearchQuery {
            jql: "project = PROJ".into(),
            fields: "summary".into(),
            page: Page {
                start_at: 10,
                limit: 5,
            },
            expand: None,
        })
        .await?;
    assert_eq!(result.total, 42);
    assert_eq!(result.start_at, 10);
    assert_eq!(result.issues[0].key, "PROJ-7");
    assert!(result.issues[0].extra_fields.is_empty());

    let seen = site.find("GET", "/rest/api/2/search");
    assert_eq!(seen.query["jql"], "project = PROJ");
    assert_eq!(seen.query["startAt"], "10");
    assert_eq!(seen.query["maxResults"], "5");
    Ok(())
}

#[tokio::test]
async fn transition_name_resolves_to_target_status() -> Result<()> {
    let (site, base) = serve(
        MockSite::default()
            .route(
                "GET",
                "/rest/api/2/issue/PROJ-1/transitions",
                200,
                json!({ "transitions": [
                    { "id": "11", "name": "Stop", "to": { "name": "Open" } },
                    { "id": "21", "name": "Start Progress", "to": { "name": "In Progress" } }
                ] }),
            )
            .route("POST", "/rest/api/2/issue/PROJ-1/transitions", 204, Value::Null),
    )
    .await;
    let client = JiraClient::new(&bearer(&base))?;

    let done = client
        .transition_issue(TransitionRequest {
            issue_key: "PROJ-1".into(),
            transition: TransitionRef::Name("in progress".into()),
            fields: Map::new(),
            comment: Some("Picked up".into()),
        })
        .await?;
    assert!(done);

    let body = site
        .find("POST", "/rest/api/2/issue/PROJ-1/transitions")
        .json();
    assert_eq!(body["transition"]["id"], "21");
    assert_eq!(body["update"]["comment"][0]["add"]["body"], "Picked up");
    assert!(body.get("fields").is_none());

    let err = client
        .transition_issue(TransitionRequest {
            issue_key: "PROJ-1".into(),
            transition: TransitionRef::Name("Closed".into()),
            fields: Map::new(),
            comment: None,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Available: Stop, Start Progress"));
    Ok(())
}

#[tokio::test]
async fn cloud_create_uses_account_ids() -> Result<()> {
    let (site, base) = serve(
        MockSite::default()
            .route("POST", "/rest/api/2/issue", 201, json!({ "id": "10005", "key": "PROJ-5" }))
            .route("GET", "/rest/api/2/issue/PROJ-5", 200, raw_issue("PROJ-5")),
    )
    .await;
    let auth = Auth::Basic {
        username: "ana@example.com".into(),
        api_token: "api-token".into(),
    };
    let client = JiraClient::new(&settings(&base, auth, true))?;

    let issue = client
        .create_issue(IssueDraft {
            project_key: "PROJ".into(),
            summary: "Payment retries loop".into(),
            issue_type: "Bug".into(),
            description: String::new(),
            assignee: Some("5b10ac8d82e05b22cc7d4ef5".into()),
            components: vec!["billing".into(), "api".into()],
            additional_fields: Map::from_iter([("priority".to_string(), json!({ "name": "High" }))]),
        })
        .await?;
    assert_eq!(issue.key, "PROJ-5");

    let created = site.find("POST", "/rest/api/2/issue");
    assert!(created.auth.as_deref().is_some_and(|a| a.starts_with("Basic ")));
    let fields = &created.json()["fields"];
    assert_eq!(fields["assignee"], json!({ "accountId": "5b10ac8d82e05b22cc7d4ef5" }));
    assert_eq!(fields["components"], json!([{ "name": "billing" }, { "name": "api" }]));
    assert_eq!(fields["priority"]["name"], "High");
    assert!(fields.get("description").is_none());
    Ok(())
}

#[tokio::test]
async fn rejected_requests_surface_status_and_body() -> Result<()> {
    let (_site, base) = serve(MockSite::default()).await;
    let client = JiraClient::new(&bearer(&base))?;
    let err = client.transitions("NOPE-1").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("returned HTTP 404"), "{message}");
    assert!(message.contains("Issue does not exist"), "{message}");
    Ok(())
}

#[tokio::test]
async fn page_update_bumps_version_and_sends_storage() -> Result<()> {
    let (site, base) = serve(
        MockSite::default()
            .route(
                "GET",
                "/wiki/rest/api/content/123",
                200,
                json!({ "id": "123", "version": { "number": 4 } }),
            )
            .route(
                "PUT",
                "/wiki/rest/api/content/123",
                200,
                json!({
                    "id": "123",
                    "title": "Runbook",
                    "version": { "number": 5 },
                    "body": { "storage": { "value": "<p>Restart &amp; verify</p>" } },
                    "_links": { "webui": "/spaces/OPS/pages/123" }
                }),
            ),
    )
    .await;
    let client = ConfluenceClient::new(&bearer(&format!("{base}/wiki")))?;

    let page = client
        .update_page(PageUpdate {
            page_id: "123".into(),
            title: "Runbook".into(),
            body: "Restart & verify".into(),
            is_minor_edit: true,
            version_comment: "typo".into(),
        })
        .await?;
    assert_eq!(page.version, Some(5));
    assert_eq!(page.content, "Restart & verify");
    assert_eq!(
        page.url,
        Some(format!("{base}/wiki/spaces/OPS/pages/123"))
    );

    let body = site.find("PUT", "/wiki/rest/api/content/123").json();
    assert_eq!(body["version"]["number"], 5);
    assert_eq!(body["version"]["minorEdit"], true);
    assert_eq!(body["version"]["message"], "typo");
    assert_eq!(body["body"]["storage"]["representation"], "storage");
    assert_eq!(body["body"]["storage"]["value"], "<p>Restart &amp; verify</p>");
    Ok(())
}

#[tokio::test]
async fn page_delete_distinguishes_queued_removal() -> Result<()> {
    let (_site, base) = serve(
        MockSite::default()
            .route("DELETE", "/rest/api/content/1", 204, Value::Null)
            .route("DELETE", "/rest/api/content/2", 202, Value::Null),
    )
    .await;
    let client = ConfluenceClient::new(&bearer(&base))?;
    assert!(client.delete_page("1").await?);
    assert!(!client.delete_page("2").await?);
    assert!(client.delete_page("3").await.is_err());
    Ok(())
}

#[tokio::test]
async fn issue_keys_never_leave_their_path_segment() -> Result<()> {
    let (site, base) = serve(
        MockSite::default()
            .route(
                "DELETE",
                "/rest/api/2/issue/X%2F..%2F..%2Fproject%2FSECRET",
                204,
                Value::Null,
            )
            .route(
                "DELETE",
                "/rest/api/2/issue/A-1%3FdeleteSubtasks=true%23x",
                204,
                Value::Null,
            ),
    )
    .await;
    let client = JiraClient::new(&bearer(&base))?;

    client.delete_issue("X/../../project/SECRET").await?;
    client.delete_issue("A-1?deleteSubtasks=true#x").await?;
    let seen = site.seen();
    assert_eq!(seen.len(), 2, "{seen:?}");
    assert!(seen.iter().all(|s| s.query.is_empty()), "{seen:?}");

    assert!(client.delete_issue("..").await.is_err());
    assert!(client.delete_issue("").await.is_err());
    assert_eq!(site.seen().len(), 2);
    Ok(())
}

#[tokio::test]
async fn attachment_credentials_stay_on_the_configured_origin() -> Result<()> {
    let (foreign, foreign_base) =
        serve(MockSite::default().route("GET", "/files/b.txt", 200, json!("beta"))).await;
    let (listener, base) = bind().await;
    let site = mount(
        listener,
        MockSite::default()
            .route(
                "GET",
                "/rest/api/2/issue/ATT-1",
                200,
                json!({
                    "id": "1",
                    "key": "ATT-1",
                    "fields": { "attachment": [
                        { "filename": "a.txt", "content": format!("{base}/secure/attachment/1/a.txt") },
                        { "filename": "b.txt", "content": format!("{foreign_base}/files/b.txt") }
                    ] }
                }),
            )
            .route("GET", "/secure/attachment/1/a.txt", 200, json!("alpha")),
    );
    let client = JiraClient::new(&bearer(&base))?;
    let dir = tempfile::tempdir()?;

    let report = client.download_attachments("ATT-1", dir.path()).await?;
    assert_eq!(report.downloaded.len(), 2, "{:?}", report.failed);
    assert_eq!(
        site.find("GET", "/secure/attachment/1/a.txt").auth.as_deref(),
        Some("Bearer secret-pat")
    );
    assert_eq!(foreign.find("GET", "/files/b.txt").auth, None);
    Ok(())
}
