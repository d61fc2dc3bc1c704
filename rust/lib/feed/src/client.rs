//! HTTP implementation of [`Transport`] over the Loop.in REST API.
//!
//! Authentication is handled by pluggable [`TokenSource`] implementations;
//! the bearer token is attached to every request.
//!
//! ```ignore
//! use loopin_feed::client::{HttpTransport, StaticToken};
//!
//! let http = HttpTransport::new("http://127.0.0.1:8000", Arc::new(StaticToken::new(jwt)));
//! let posts = http.list_posts().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{
    CommentId, CommentRecord, CurrentUser, PostDraft, PostId, PostRecord, ReactionRequest, UserId,
};
use crate::transport::Transport;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every API request.
///
/// Returns `Ok(None)` to skip the Authorization header (anonymous).
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, TransportError>;
}

/// No authentication: anonymous requests.
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, TransportError> {
        Ok(None)
    }
}

/// Static bearer token (already obtained externally).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, TransportError> {
        Ok(Some(self.0.clone()))
    }
}

// ── HttpTransport ───────────────────────────────────────────────────

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn posts_url(&self) -> String {
        self.url("/posts/")
    }

    fn post_url(&self, post_id: PostId) -> String {
        self.url(&format!("/posts/{}", post_id))
    }

    fn comments_url(&self, post_id: PostId) -> String {
        self.url(&format!("/posts/{}/comments/", post_id))
    }

    /// Build a request with auth header.
    async fn authed(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let resp = self.authed(builder).await?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Server {
                status: code,
                message: server_message(&body),
            });
        }
        Ok(resp)
    }

    /// Send, then decode a JSON body.
    async fn fetch<R: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<R, TransportError> {
        let body = self.send(builder).await?.bytes().await?;
        decode_body(&body)
    }

    /// `GET /posts/{id}/comments/?user_id=..`; the viewer lets the server
    /// fill in `user_reacted`.
    fn list_comments_request(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> reqwest::RequestBuilder {
        let mut req = self.http.get(self.comments_url(post_id));
        if let Some(user_id) = viewer {
            req = req.query(&[("user_id", user_id.0)]);
        }
        req
    }

    /// `POST /posts/{id}/comments/?parent_id=..&author_id=..`
    fn create_comment_request(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        content: &str,
        author: Option<UserId>,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(self.comments_url(post_id))
            .json(&serde_json::json!({ "content": content }));
        if let Some(parent_id) = parent {
            req = req.query(&[("parent_id", parent_id.0)]);
        }
        if let Some(author_id) = author {
            req = req.query(&[("author_id", author_id.0)]);
        }
        req
    }
}

/// Decode a JSON body with no nesting limit. Reply chains nest one level
/// per reply, so the stack grows on the heap as the parser descends.
fn decode_body<R: DeserializeOwned>(body: &[u8]) -> Result<R, TransportError> {
    let decode_err = |e: serde_json::Error| TransportError::Decode(format!("response body: {}", e));
    let mut de = serde_json::Deserializer::from_slice(body);
    de.disable_recursion_limit();
    let value: R = serde::Deserialize::deserialize(serde_stacker::Deserializer::new(&mut de))
        .map_err(decode_err)?;
    de.end().map_err(decode_err)?;
    Ok(value)
}

/// FastAPI reports errors as `{"detail": "..."}`; fall back to the raw body.
fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, TransportError> {
        debug!(url = %self.posts_url(), "GET posts");
        self.fetch(self.http.get(self.posts_url())).await
    }

    async fn list_comments(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> Result<Vec<CommentRecord>, TransportError> {
        self.fetch(self.list_comments_request(post_id, viewer)).await
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRecord, TransportError> {
        self.fetch(self.http.post(self.posts_url()).json(draft)).await
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), TransportError> {
        self.send(self.http.delete(self.post_url(post_id))).await?;
        Ok(())
    }

    async fn create_comment(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        content: &str,
        author: Option<UserId>,
    ) -> Result<CommentRecord, TransportError> {
        self.fetch(self.create_comment_request(post_id, parent, content, author))
            .await
    }

    async fn toggle_reaction(&self, req: &ReactionRequest) -> Result<(), TransportError> {
        self.send(self.http.post(self.url("/reactions/")).json(req)).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<CurrentUser, TransportError> {
        self.fetch(self.http.get(self.url("/auth/me"))).await
    }
}
