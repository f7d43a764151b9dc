use crate::domain::{
    error::ToolError,
    models::SimplifiedView,
    ports::{ChildrenQuery, ConfluenceApi, PageDraft, PageUpdate},
    query::{apply_spaces_filter, cql_for_search},
    reply::Reply,
    schema::{Access, CoercedArgs},
};
use futures::future::BoxFuture;
use serde_json::json;

pub type ConfluenceHandler =
    for<'a> fn(&'a dyn ConfluenceApi, CoercedArgs) -> BoxFuture<'a, Result<Reply, ToolError>>;

pub struct ConfluenceRoute {
    pub name: &'static str,
    pub access: Access,
    pub handler: ConfluenceHandler,
}

fn route(name: &'static str, access: Access, handler: ConfluenceHandler) -> ConfluenceRoute {
    ConfluenceRoute {
        name,
        access,
        handler,
    }
}

pub fn routes() -> Vec<ConfluenceRoute> {
    vec![
        route("confluence_search", Access::Read, search),
        route("confluence_get_page", Access::Read, get_page),
        route("confluence_get_page_children", Access::Read, page_children),
        route("confluence_get_page_ancestors", Access::Read, page_ancestors),
        route("confluence_get_comments", Access::Read, comments),
        route("confluence_create_page", Access::Write, create_page),
        route("confluence_update_page", Access::Write, update_page),
        route("confluence_delete_page", Access::Write, delete_page),
        route("confluence_attach_content", Access::Write, attach_content),
    ]
}

fn search(api: &dyn ConfluenceApi, args: CoercedArgs) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let mut cql = cql_for_search(&args.require_str("query")?);
        if let Some(filter) = args.str("spaces_filter").or_else(|| api.spaces_filter()) {
            cql = apply_spaces_filter(&cql, &filter);
        }
        let limit = args.count("limit", 10)?;
        let pages = api.search(&cql, limit).await?;
        Ok(Reply::view(&pages))
    })
}

fn get_page(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let page_id = args.require_str("page_id")?;
        let include_metadata = args.flag("include_metadata").unwrap_or(true);
        let convert = args.flag("convert_to_markdown").unwrap_or(true);
        let page = api.get_page(&page_id, convert).await?;
        let body = if include_metadata {
            json!({ "metadata": page.to_simplified() })
        } else {
            json!({ "content": page.content })
        };
        Ok(Reply::json(body))
    })
}

fn page_children(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let parent_id = args.require_str("parent_id")?;
        let mut expand = args.text_or("expand", "version");
        if args.flag("include_content").unwrap_or(false) && !expand.contains("body") {
            expand = if expand.trim().is_empty() {
                "body.storage".to_string()
            } else {
                format!("{expand},body.storage")
            };
        }
        let limit = args.count("limit", 25)?;
        let query = ChildrenQuery {
            parent_id: parent_id.clone(),
            expand,
            start: args.count("start", 0)?,
            limit,
            convert_to_markdown: args.flag("convert_to_markdown").unwrap_or(true),
        };
        let pages = api.page_children(query).await?;
        Ok(Reply::json(json!({
            "parent_id": parent_id,
            "total": pages.len(),
            "limit": limit,
            "results": pages.to_simplified(),
        })))
    })
}

fn page_ancestors(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let page_id = args.require_str("page_id")?;
        let ancestors = api.page_ancestors(&page_id).await?;
        Ok(Reply::view(&ancestors))
    })
}

fn comments(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let page_id = args.require_str("page_id")?;
        let comments = api.page_comments(&page_id).await?;
        Ok(Reply::view(&comments))
    })
}

fn create_page(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let draft = PageDraft {
            space_key: args.require_str("space_key")?,
            title: args.require_str("title")?,
            body: args.require_str("content")?,
            parent_id: args.str("parent_id"),
        };
        let page = api.create_page(draft).await?;
        Ok(Reply::announced("Page created successfully:", &page))
    })
}

fn update_page(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let update = PageUpdate {
            page_id: args.require_str("page_id")?,
            title: args.require_str("title")?,
            body: args.require_str("content")?,
            is_minor_edit: args.flag("is_minor_edit").unwrap_or(false),
            version_comment: args.text_or("version_comment", ""),
        };
        let page = api.update_page(update).await?;
        Ok(Reply::json(json!({ "page": page.to_simplified() })))
    })
}

fn delete_page(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let page_id = args.require_str("page_id")?;
        let deleted = api.delete_page(&page_id).await?;
        let message = if deleted {
            format!("Page {page_id} deleted successfully")
        } else {
            format!("Unable to delete page {page_id}: the request completed but the page was not removed")
        };
        Ok(Reply::json(json!({ "success": deleted, "message": message })))
    })
}

fn attach_content(
    api: &dyn ConfluenceApi,
    args: CoercedArgs,
) -> BoxFuture<'_, Result<Reply, ToolError>> {
    Box::pin(async move {
        let page_id = args.require_str("page_id")?;
        let name = args.require_str("name")?;
        let content = args.text_or("content", "").into_bytes();
        let page = api.attach_content(&page_id, &name, content).await?;
        Ok(Reply::view(&page))
    })
}
