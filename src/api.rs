use crate::types::{Conversation, Message, NewMessage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(StatusCode),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The server surface the sync engine and send pipeline talk to. A trait so
/// tests can drive the engine without a live backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;
    async fn list_messages(&self, wa_id: &str) -> Result<Vec<Message>, ApiError>;
    async fn send_message(&self, draft: &NewMessage) -> Result<Message, ApiError>;
    async fn health(&self) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct HttpChatApi {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChatApi {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_ref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let resp = self
            .request(self.http.get(format!("{}/conversations", self.base_url)))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn list_messages(&self, wa_id: &str) -> Result<Vec<Message>, ApiError> {
        let resp = self
            .request(self.http.get(format!("{}/messages", self.base_url)))
            .query(&[("wa_id", wa_id)])
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn send_message(&self, draft: &NewMessage) -> Result<Message, ApiError> {
        let resp = self
            .request(self.http.post(format!("{}/messages", self.base_url)))
            .json(draft)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn health(&self) -> Result<(), ApiError> {
        let resp = self
            .request(self.http.get(format!("{}/health", self.base_url)))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Status(resp.status()))
        }
    }
}
