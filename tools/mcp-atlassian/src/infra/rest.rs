//! Thin authenticated JSON client shared by both product areas.

use crate::infra::config::{Auth, ServiceSettings};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::{Client, Method, RequestBuilder, Response, Url, multipart};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 512;

/// Request path below the service base.
///
/// Route text is split on `/`; every [`Endpoint::id`] occupies exactly one
/// percent-encoded segment, so keys and ids can never steer the request to
/// another resource.
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    segments: Vec<String>,
}

impl Endpoint {
    pub fn route(route: &str) -> Self {
        Self::default().then(route)
    }

    pub fn then(mut self, route: &str) -> Self {
        self.segments.extend(
            route
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn id(mut self, value: &str) -> Self {
        self.segments.push(value.to_string());
        self
    }
}

#[derive(Clone)]
pub struct RestClient {
    base: String,
    root: Url,
    http: Client,
    auth: Auth,
}

impl RestClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(!settings.ssl_verify)
            .user_agent(concat!("mcp-atlassian/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            base: settings.url.as_str().trim_end_matches('/').to_string(),
            root: settings.url.clone(),
            http,
            auth: settings.auth.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn url(&self, endpoint: &Endpoint) -> Result<Url> {
        if let Some(bad) = endpoint
            .segments
            .iter()
            .find(|segment| matches!(segment.trim(), "" | "." | ".."))
        {
            bail!("invalid path segment {bad:?}");
        }
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("{} cannot carry a request path", self.base))?
            .pop_if_empty()
            .extend(&endpoint.segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        endpoint: &Endpoint,
        query: &[(&str, String)],
    ) -> Result<(String, RequestBuilder)> {
        let url = self.url(endpoint)?;
        let label = format!("{method} {}", url.path());
        let builder = self.http.request(method, url).query(query);
        Ok((label, self.authorize(builder)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Basic {
                username,
                api_token,
            } => builder.basic_auth(username, Some(api_token)),
            Auth::Bearer(token) => builder.bearer_auth(token),
        }
    }

    async fn send(&self, label: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("{label} request failed"))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        tracing::debug!(%label, status = status.as_u16(), body = %snippet, "request rejected");
        bail!("{label} returned HTTP {}: {}", status.as_u16(), snippet.trim())
    }

    async fn json_body(&self, label: &str, response: Response) -> Result<Value> {
        let text = response
            .text()
            .await
            .with_context(|| format!("read {label} response"))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).with_context(|| format!("decode {label} response"))
    }

    pub async fn get_json(&self, endpoint: &Endpoint, query: &[(&str, String)]) -> Result<Value> {
        let (label, builder) = self.request(Method::GET, endpoint, query)?;
        let response = self.send(&label, builder).await?;
        self.json_body(&label, response).await
    }

    pub async fn post_json(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        let (label, builder) = self.request(Method::POST, endpoint, &[])?;
        let response = self.send(&label, builder.json(body)).await?;
        self.json_body(&label, response).await
    }

    pub async fn put_json(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        let (label, builder) = self.request(Method::PUT, endpoint, &[])?;
        let response = self.send(&label, builder.json(body)).await?;
        self.json_body(&label, response).await
    }

    /// Returns the response status so callers can tell "gone" from "accepted".
    pub async fn delete(&self, endpoint: &Endpoint) -> Result<u16> {
        let (label, builder) = self.request(Method::DELETE, endpoint, &[])?;
        let response = self.send(&label, builder).await?;
        Ok(response.status().as_u16())
    }

    pub async fn post_multipart(
        &self,
        endpoint: &Endpoint,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Value> {
        let (label, builder) = self.request(Method::POST, endpoint, &[])?;
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let builder = builder
            .header("X-Atlassian-Token", "no-check")
            .multipart(form);
        let response = self.send(&label, builder).await?;
        self.json_body(&label, response).await
    }

    /// Absolute URLs (attachment content links) are fetched as-is; credentials
    /// only travel to the configured origin.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            Url::parse(url).with_context(|| format!("parse download URL {url}"))?
        } else {
            self.url(&Endpoint::route(url))?
        };
        let label = format!("GET {}", target.path());
        let builder = if self.same_origin(&target) {
            self.authorize(self.http.get(target))
        } else {
            tracing::debug!(%label, host = ?target.host_str(), "foreign origin, sending without credentials");
            self.http.get(target)
        };
        let response = self.send(&label, builder).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read {label} body"))?;
        Ok(bytes.to_vec())
    }

    fn same_origin(&self, target: &Url) -> bool {
        target.origin() == self.root.origin()
    }
}

/// String at `pointer`, if present and textual.
pub fn str_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Numeric ids arrive as either numbers or strings depending on the endpoint.
pub fn id_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn i64_at(value: &Value, pointer: &str) -> Option<i64> {
    match value.pointer(pointer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
