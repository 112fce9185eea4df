//! # Durable Write Path
//!
//! The REST collaborator the reconciler writes through before anything is
//! broadcast. Specified here as a boundary trait so view-state logic can be
//! exercised against a fake; [`RestClient`] is the real reqwest-backed
//! implementation.

use crate::client::error::ClientError;
use crate::shared::{PositionUpdate, SpaceSnapshot, Snippet, SnippetPatch, SyncConfig};
use reqwest::StatusCode;
use uuid::Uuid;

/// The durable write API the reconciler depends on. A write must succeed
/// before the corresponding mutation may be emitted over the socket.
#[allow(async_fn_in_trait)]
pub trait DurableWrites {
    /// Persist a new snippet; returns the entity as persisted.
    async fn create_snippet(&self, snippet: &Snippet) -> Result<Snippet, ClientError>;
    /// Persist a partial update; returns the entity as persisted.
    async fn update_snippet(&self, id: Uuid, patch: &SnippetPatch) -> Result<Snippet, ClientError>;
    /// Persist a position change; returns the entity as persisted.
    async fn move_snippet(&self, id: Uuid, x: i32, y: i32) -> Result<Snippet, ClientError>;
    /// Delete a snippet.
    async fn delete_snippet(&self, id: Uuid) -> Result<(), ClientError>;
    /// Fetch the full snippet set and explicit order for a space, used as
    /// the reconciliation fallback.
    async fn fetch_space(&self, space_id: Uuid) -> Result<SpaceSnapshot, ClientError>;
}

/// Snippet API client
pub struct RestClient {
    config: SyncConfig,
    token: String,
    client: reqwest::Client,
}

impl RestClient {
    pub fn new(config: SyncConfig, token: impl Into<String>) -> Self {
        Self {
            config,
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the bearer token (credential refresh is external to this
    /// core; the caller hands in whatever is current).
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Denied(message),
            StatusCode::NOT_FOUND => ClientError::NotFound,
            _ => ClientError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl DurableWrites for RestClient {
    async fn create_snippet(&self, snippet: &Snippet) -> Result<Snippet, ClientError> {
        let url = self
            .config
            .api_url(&format!("/api/spaces/{}/snippets", snippet.space_id));
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(snippet)
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<Snippet>().await?)
    }

    async fn update_snippet(&self, id: Uuid, patch: &SnippetPatch) -> Result<Snippet, ClientError> {
        let url = self.config.api_url(&format!("/api/snippets/{}", id));
        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.bearer())
            .json(patch)
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<Snippet>().await?)
    }

    async fn move_snippet(&self, id: Uuid, x: i32, y: i32) -> Result<Snippet, ClientError> {
        let url = self.config.api_url(&format!("/api/snippets/{}/position", id));
        let response = self
            .client
            .put(&url)
            .header("Authorization", self.bearer())
            .json(&PositionUpdate { x, y })
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<Snippet>().await?)
    }

    async fn delete_snippet(&self, id: Uuid) -> Result<(), ClientError> {
        let url = self.config.api_url(&format!("/api/snippets/{}", id));
        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_space(&self, space_id: Uuid) -> Result<SpaceSnapshot, ClientError> {
        let url = self
            .config
            .api_url(&format!("/api/spaces/{}/snippets", space_id));
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<SpaceSnapshot>().await?)
    }
}
