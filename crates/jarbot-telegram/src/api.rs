//! Telegram Bot API client — long polling + message sending.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use jarbot_core::error::{JarbotError, Result};
use jarbot_core::traits::Outbound;

/// Thin client over the Bot API. Cheap to clone (shares the HTTP pool).
#[derive(Clone)]
pub struct TelegramApi {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Fetch updates with long polling, starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| JarbotError::Channel(format!("getUpdates failed: {e}")))?;

        let body: TgApiResponse<Vec<TgUpdate>> = response
            .json()
            .await
            .map_err(|e| JarbotError::Channel(format!("Invalid getUpdates response: {e}")))?;
        body.into_result()
    }

    /// Send a Markdown text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| JarbotError::Channel(format!("sendMessage failed: {e}")))?;

        let result: TgApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| JarbotError::Channel(format!("Invalid send response: {e}")))?;
        result.into_result().map(|_| ())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TgUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| JarbotError::Channel(format!("getMe failed: {e}")))?;
        let body: TgApiResponse<TgUser> = response
            .json()
            .await
            .map_err(|e| JarbotError::Channel(format!("Invalid getMe response: {e}")))?;
        body.into_result()
    }

    /// Whether the user is an administrator or the owner of the chat.
    pub async fn is_chat_admin(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        let response = self
            .client
            .get(self.api_url("getChatMember"))
            .query(&[
                ("chat_id", chat_id.to_string()),
                ("user_id", user_id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| JarbotError::Channel(format!("getChatMember failed: {e}")))?;
        let body: TgApiResponse<TgChatMember> = response
            .json()
            .await
            .map_err(|e| JarbotError::Channel(format!("Invalid getChatMember response: {e}")))?;
        let member = body.into_result()?;
        Ok(matches!(member.status.as_str(), "administrator" | "creator"))
    }

    /// Register the bot's command menu.
    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<()> {
        let commands: Vec<serde_json::Value> = commands
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();
        let body = serde_json::json!({ "commands": commands });

        let response = self
            .client
            .post(self.api_url("setMyCommands"))
            .json(&body)
            .send()
            .await
            .map_err(|e| JarbotError::Channel(format!("setMyCommands failed: {e}")))?;
        let result: TgApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| JarbotError::Channel(format!("Invalid setMyCommands response: {e}")))?;
        result.into_result().map(|_| ())
    }
}

#[async_trait]
impl Outbound for TelegramApi {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await
    }
}

// --- Telegram API types ---

#[derive(Debug, Deserialize)]
pub struct TgApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TgApiResponse<T> {
    fn into_result(self) -> Result<T> {
        if !self.ok {
            return Err(JarbotError::Channel(format!(
                "Telegram API error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| JarbotError::Channel("Empty Telegram API result".into()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: TgChat,
    pub text: Option<String>,
    pub date: i64,
    #[serde(default)]
    pub new_chat_members: Vec<TgUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgChatMember {
    pub status: String,
    pub user: Option<TgUser>,
}
