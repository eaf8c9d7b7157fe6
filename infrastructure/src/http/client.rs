//! reqwest adapter for the sitechat backend.
//!
//! One client implements every backend port: the streamed chat endpoint,
//! session bookkeeping, crawl control with its SSE status channel, and the
//! catalog refresh trigger. All requests carry the active scope's bearer
//! credential.

use super::error::{HttpClientError, Result};
use super::sse::SseEventSource;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use sitechat_application::{
    ByteSource, CatalogRefresher, ChatBackend, ChatRequest, CrawlBackend, CrawlEventSource,
    CrawlReply, GatewayError, SessionApi, SourceError, StreamSource,
};
use sitechat_domain::util::truncate_str;
use sitechat_domain::{ChatTurn, Session, SiteScope};
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the tenant id alongside the bearer credential.
const SITE_ID_HEADER: &str = "X-Site-Id";

/// Longest error body kept in a status error message.
const MAX_ERROR_BODY: usize = 200;

/// Endpoints and transport limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Base of the REST API, e.g. `https://api.example.com/api`.
    pub api_base: String,
    /// Base of the event channel service.
    pub events_base: String,
    /// Connect timeout; `None` waits indefinitely. Streams themselves are
    /// unbounded.
    pub connect_timeout: Option<Duration>,
}

impl HttpSettings {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        Self {
            events_base: api_base.clone(),
            api_base,
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }

    pub fn with_events_base(mut self, events_base: impl Into<String>) -> Self {
        self.events_base = events_base.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// HTTP implementation of the chat, session, crawl and catalog ports.
#[derive(Debug, Clone)]
pub struct SiteChatHttpClient {
    client: reqwest::Client,
    api_base: Url,
    events_base: Url,
}

impl SiteChatHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;
        Ok(Self {
            client,
            api_base: parse_base(&settings.api_base)?,
            events_base: parse_base(&settings.events_base)?,
        })
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        join(&self.api_base, segments)
    }

    fn authorized(&self, builder: RequestBuilder, scope: &SiteScope) -> RequestBuilder {
        builder
            .header(AUTHORIZATION, scope.bearer())
            .header(SITE_ID_HEADER, &scope.site_id)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, scope: &SiteScope, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .send(self.authorized(self.client.get(url), scope))
            .await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a crawl control request. A 409 whose body is a crawl reply is
    /// a benign conflict, not a failure.
    async fn crawl_request(&self, builder: RequestBuilder) -> Result<CrawlReply> {
        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|_| HttpClientError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        let body = check_status(response).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(CrawlReply::new(""));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn parse_base(base: &str) -> Result<Url> {
    let url = Url::parse(base).map_err(|e| HttpClientError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(HttpClientError::InvalidUrl {
            url: base.to_string(),
            reason: "not a base URL".to_string(),
        });
    }
    Ok(url)
}

/// Append path segments, percent-encoding each one.
fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| HttpClientError::InvalidUrl {
            url: base.to_string(),
            reason: "not a base URL".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HttpClientError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        truncate_str(body, MAX_ERROR_BODY).to_string()
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    SourceError::Transport(e.to_string())
}

#[async_trait]
impl ChatBackend for SiteChatHttpClient {
    async fn open_answer_stream(
        &self,
        scope: &SiteScope,
        request: &ChatRequest,
    ) -> std::result::Result<ByteSource, GatewayError> {
        let url = self.api_url(&["chat", "stream"])?;
        debug!(
            "POST {} (session {}, {} prior turns)",
            url,
            request.session_id,
            request.chat_history.len()
        );
        let response = self
            .send(self.authorized(self.client.post(url), scope).json(request))
            .await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(transport_error));
        Ok(StreamSource::new(stream).boxed())
    }
}

#[async_trait]
impl SessionApi for SiteChatHttpClient {
    async fn list_sessions(
        &self,
        scope: &SiteScope,
    ) -> std::result::Result<Vec<Session>, GatewayError> {
        let url = self.api_url(&["chat", "sessions"])?;
        Ok(self.get_json(scope, url).await?)
    }

    async fn fetch_history(
        &self,
        scope: &SiteScope,
        session_id: &str,
    ) -> std::result::Result<Vec<ChatTurn>, GatewayError> {
        let url = self.api_url(&["chat", "sessions", session_id, "history"])?;
        Ok(self.get_json(scope, url).await?)
    }

    async fn delete_session(
        &self,
        scope: &SiteScope,
        session_id: &str,
    ) -> std::result::Result<(), GatewayError> {
        let url = self.api_url(&["chat", "sessions", session_id])?;
        debug!("DELETE {}", url);
        self.send(self.authorized(self.client.delete(url), scope))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CrawlBackend for SiteChatHttpClient {
    async fn start_crawl(
        &self,
        scope: &SiteScope,
        url: &str,
    ) -> std::result::Result<CrawlReply, GatewayError> {
        let endpoint = self.api_url(&["crawl", "start"])?;
        debug!("POST {} ({})", endpoint, url);
        let builder = self
            .authorized(self.client.post(endpoint), scope)
            .json(&serde_json::json!({ "url": url }));
        Ok(self.crawl_request(builder).await?)
    }

    async fn stop_crawl(&self, scope: &SiteScope) -> std::result::Result<CrawlReply, GatewayError> {
        let endpoint = self.api_url(&["crawl", "stop"])?;
        debug!("POST {}", endpoint);
        let builder = self.authorized(self.client.post(endpoint), scope);
        Ok(self.crawl_request(builder).await?)
    }

    async fn open_events(
        &self,
        scope: &SiteScope,
    ) -> std::result::Result<CrawlEventSource, GatewayError> {
        let url = join(&self.events_base, &["crawl", "events", scope.site_id.as_str()])?;
        info!("Opening event channel {}", url);
        let builder = self
            .authorized(self.client.get(url), scope)
            .header(ACCEPT, "text/event-stream");
        let response = self.send(builder).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(transport_error));
        Ok(Box::new(SseEventSource::new(stream)))
    }
}

#[async_trait]
impl CatalogRefresher for SiteChatHttpClient {
    async fn refresh_catalog(&self, scope: &SiteScope) -> std::result::Result<(), GatewayError> {
        let url = self.api_url(&["documents", "refresh"])?;
        debug!("POST {}", url);
        self.send(self.authorized(self.client.post(url), scope))
            .await?;
        Ok(())
    }
}
