use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

const API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("discord request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("discord api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// One message as the state machine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub author_id: String,
    pub content: String,
}

/// Minimal chat-platform surface the status upsert needs. Implemented for
/// real by `DiscordClient`, and by in-memory mocks in tests.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Identity used to filter self-authored messages out of history.
    fn self_user_id(&self) -> &str;

    /// `Ok(None)` when the id no longer resolves (deleted externally).
    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>, ChatError>;

    /// Most recent messages first.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, ChatError>;

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<ChatMessage, ChatError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ChatError>;
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
    content: String,
    author: ApiUser,
}

impl From<ApiMessage> for ChatMessage {
    fn from(message: ApiMessage) -> Self {
        Self {
            id: message.id,
            author_id: message.author.id,
            content: message.content,
        }
    }
}

/// Discord REST client. Authenticates with a bot token; `login` doubles as
/// the readiness gate before the first scheduler cycle.
pub struct DiscordClient {
    http: Client,
    token: String,
    user_id: String,
}

impl DiscordClient {
    pub async fn login(token: String) -> Result<Self, ChatError> {
        let http = Client::builder()
            .user_agent("fleetmond/0.1.0")
            .build()
            .unwrap_or_else(|_| Client::new());

        let response = http
            .get(format!("{API_BASE}/users/@me"))
            .header(AUTHORIZATION, format!("Bot {token}"))
            .send()
            .await?;
        let me: ApiUser = expect_success(response).await?.json().await?;
        info!(user = %me.username, "authenticated with Discord");

        Ok(Self {
            http,
            token,
            user_id: me.id,
        })
    }

    /// Startup check that the target channel exists and is visible to the bot.
    pub async fn fetch_channel(&self, channel_id: &str) -> Result<(), ChatError> {
        let response = self
            .request(self.http.get(format!("{API_BASE}/channels/{channel_id}")))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, format!("Bot {}", self.token))
    }
}

#[async_trait]
impl ChatApi for DiscordClient {
    fn self_user_id(&self) -> &str {
        &self.user_id
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let response = self
            .request(self.http.get(format!(
                "{API_BASE}/channels/{channel_id}/messages/{message_id}"
            )))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let message: ApiMessage = expect_success(response).await?.json().await?;
        Ok(Some(message.into()))
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let response = self
            .request(self.http.get(format!(
                "{API_BASE}/channels/{channel_id}/messages?limit={limit}"
            )))
            .send()
            .await?;
        let messages: Vec<ApiMessage> = expect_success(response).await?.json().await?;
        Ok(messages.into_iter().map(ChatMessage::from).collect())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<ChatMessage, ChatError> {
        let response = self
            .request(
                self.http
                    .post(format!("{API_BASE}/channels/{channel_id}/messages"))
                    .json(&json!({ "content": text })),
            )
            .send()
            .await?;
        let message: ApiMessage = expect_success(response).await?.json().await?;
        Ok(message.into())
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ChatError> {
        let response = self
            .request(
                self.http
                    .patch(format!(
                        "{API_BASE}/channels/{channel_id}/messages/{message_id}"
                    ))
                    .json(&json!({ "content": text })),
            )
            .send()
            .await?;
        let message: ApiMessage = expect_success(response).await?.json().await?;
        Ok(message.into())
    }
}

async fn expect_success(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Api { status, body })
}
