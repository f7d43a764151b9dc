//! Wiki collaborator over the Confluence content API.

use crate::{
    domain::{
        models::{ConfluenceComment, ConfluencePage},
        ports::{ChildrenQuery, ConfluenceApi, PageDraft, PageUpdate},
    },
    infra::{
        config::ServiceSettings,
        rest::{Endpoint, RestClient, i64_at, id_at, str_at},
    },
    shared::text::{strip_markup, text_to_storage},
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

const CONTENT: &str = "rest/api/content";

fn page_endpoint(page_id: &str) -> Endpoint {
    Endpoint::route(CONTENT).id(page_id)
}
const PAGE_EXPAND: &str = "body.storage,version,space,history";

pub struct ConfluenceClient {
    rest: RestClient,
    spaces_filter: Option<String>,
}

impl ConfluenceClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(settings)?,
            spaces_filter: settings.filter.clone(),
        })
    }

    fn page(&self, raw: &Value, convert: bool) -> ConfluencePage {
        parse_page(raw, self.rest.base_url(), convert)
    }

    async fn current_version(&self, page_id: &str) -> Result<i64> {
        let raw = self
            .rest
            .get_json(
                &page_endpoint(page_id),
                &[("expand", "version".to_string())],
            )
            .await?;
        Ok(i64_at(&raw, "/version/number").unwrap_or(1))
    }
}

#[async_trait]
impl ConfluenceApi for ConfluenceClient {
    async fn search(&self, cql: &str, limit: u32) -> Result<Vec<ConfluencePage>> {
        let params = [
            ("cql", cql.to_string()),
            ("limit", limit.to_string()),
            ("expand", "space,version".to_string()),
        ];
        let raw = self
            .rest
            .get_json(&Endpoint::route(CONTENT).then("search"), &params)
            .await?;
        Ok(results(&raw).map(|page| self.page(page, true)).collect())
    }

    async fn get_page(&self, page_id: &str, convert_to_markdown: bool) -> Result<ConfluencePage> {
        let raw = self
            .rest
            .get_json(
                &page_endpoint(page_id),
                &[("expand", PAGE_EXPAND.to_string())],
            )
            .await?;
        Ok(self.page(&raw, convert_to_markdown))
    }

    async fn page_children(&self, query: ChildrenQuery) -> Result<Vec<ConfluencePage>> {
        let params = [
            ("expand", query.expand),
            ("start", query.start.to_string()),
            ("limit", query.limit.to_string()),
        ];
        let raw = self
            .rest
            .get_json(&page_endpoint(&query.parent_id).then("child/page"), &params)
            .await?;
        Ok(results(&raw)
            .map(|page| self.page(page, query.convert_to_markdown))
            .collect())
    }

    async fn page_ancestors(&self, page_id: &str) -> Result<Vec<ConfluencePage>> {
        let raw = self
            .rest
            .get_json(
                &page_endpoint(page_id),
                &[("expand", "ancestors".to_string())],
            )
            .await?;
        Ok(raw
            .get("ancestors")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|page| self.page(page, true))
            .collect())
    }

    async fn page_comments(&self, page_id: &str) -> Result<Vec<ConfluenceComment>> {
        let params = [
            ("expand", "body.storage,version,history".to_string()),
            ("depth", "all".to_string()),
        ];
        let raw = self
            .rest
            .get_json(&page_endpoint(page_id).then("child/comment"), &params)
            .await?;
        Ok(results(&raw)
            .map(|comment| ConfluenceComment {
                id: id_at(comment, "/id").unwrap_or_default(),
                author: str_at(comment, "/history/createdBy/displayName")
                    .or_else(|| str_at(comment, "/version/by/displayName")),
                body: str_at(comment, "/body/storage/value")
                    .map(|markup| strip_markup(&markup))
                    .unwrap_or_default(),
                created: str_at(comment, "/history/createdDate"),
            })
            .collect())
    }

    async fn create_page(&self, draft: PageDraft) -> Result<ConfluencePage> {
        let mut body = json!({
            "type": "page",
            "title": draft.title,
            "space": { "key": draft.space_key },
            "body": { "storage": {
                "value": text_to_storage(&draft.body),
                "representation": "storage",
            } },
        });
        if let Some(parent_id) = draft.parent_id {
            body["ancestors"] = json!([{ "id": parent_id }]);
        }
        let created = self.rest.post_json(&Endpoint::route(CONTENT), &body).await?;
        let page = self.page(&created, true);
        tracing::info!(page_id = %page.id, "page created");
        Ok(page)
    }

    async fn update_page(&self, update: PageUpdate) -> Result<ConfluencePage> {
        let version = self.current_version(&update.page_id).await?;
        let mut next = json!({ "number": version + 1, "minorEdit": update.is_minor_edit });
        if !update.version_comment.is_empty() {
            next["message"] = update.version_comment.into();
        }
        let body = json!({
            "id": &update.page_id,
            "type": "page",
            "title": update.title,
            "version": next,
            "body": { "storage": {
                "value": text_to_storage(&update.body),
                "representation": "storage",
            } },
        });
        let updated = self
            .rest
            .put_json(&page_endpoint(&update.page_id), &body)
            .await?;
        Ok(self.page(&updated, true))
    }

    async fn delete_page(&self, page_id: &str) -> Result<bool> {
        let status = self.rest.delete(&page_endpoint(page_id)).await?;
        // 202 means the removal was only queued.
        Ok(matches!(status, 200 | 204))
    }

    async fn attach_content(
        &self,
        page_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<ConfluencePage> {
        self.rest
            .post_multipart(
                &page_endpoint(page_id).then("child/attachment"),
                name,
                content,
            )
            .await?;
        tracing::info!(%page_id, attachment = name, "attachment uploaded");
        self.get_page(page_id, true).await
    }

    fn spaces_filter(&self) -> Option<String> {
        self.spaces_filter.clone()
    }
}

fn results(value: &Value) -> impl Iterator<Item = &Value> {
    value
        .get("results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn parse_page(raw: &Value, base_url: &str, convert: bool) -> ConfluencePage {
    let storage = str_at(raw, "/body/storage/value").unwrap_or_default();
    let (content, content_format) = match (storage.is_empty(), convert) {
        (true, _) => (String::new(), None),
        (false, true) => (strip_markup(&storage), Some("markdown".to_string())),
        (false, false) => (storage, Some("storage".to_string())),
    };
    ConfluencePage {
        id: id_at(raw, "/id").unwrap_or_default(),
        title: str_at(raw, "/title").unwrap_or_default(),
        space_key: str_at(raw, "/space/key"),
        space_name: str_at(raw, "/space/name"),
        version: i64_at(raw, "/version/number"),
        url: str_at(raw, "/_links/webui").map(|path| format!("{base_url}{path}")),
        author: str_at(raw, "/history/createdBy/displayName")
            .or_else(|| str_at(raw, "/version/by/displayName")),
        created: str_at(raw, "/history/createdDate"),
        updated: str_at(raw, "/version/when"),
        content,
        content_format,
    }
}
