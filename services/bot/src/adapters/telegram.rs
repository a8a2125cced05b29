//! services/bot/src/adapters/telegram.rs
//!
//! This module contains the adapter for the Telegram Bot API. It implements the
//! `ChatTransport` port and exposes the long-polled stream of inbound events.

use crate::chat::protocol::{ButtonPress, InboundEvent, TextMessage};
use async_trait::async_trait;
use episode_tracker_core::domain::{ChatId, InlineKeyboard, MessageOptions, ParseMode};
use episode_tracker_core::ports::{ChatTransport, PortError, PortResult};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const RETRY_DELAY: Duration = Duration::from_secs(3);

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<WireMessage>,
    callback_query: Option<WireCallbackQuery>,
}

#[derive(Deserialize)]
struct WireMessage {
    message_id: i64,
    from: Option<WireUser>,
    chat: WireChat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireCallbackQuery {
    id: String,
    from: WireUser,
    message: Option<WireMessage>,
    data: Option<String>,
}

#[derive(Deserialize)]
struct WireUser {
    id: i64,
}

#[derive(Deserialize)]
struct WireChat {
    id: i64,
}

impl Update {
    fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(InboundEvent::ButtonPress(ButtonPress {
                callback_id: query.id,
                user_id: query.from.id,
                chat_id: message.chat.id,
                message_id: message.message_id,
                data: query.data.unwrap_or_default(),
            }));
        }
        let message = self.message?;
        Some(InboundEvent::Text(TextMessage {
            user_id: message.from?.id,
            chat_id: message.chat.id,
            text: message.text?,
        }))
    }
}

#[derive(Serialize)]
struct WireButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Serialize)]
struct WireKeyboard<'a> {
    inline_keyboard: Vec<Vec<WireButton<'a>>>,
}

impl<'a> From<&'a InlineKeyboard> for WireKeyboard<'a> {
    fn from(keyboard: &'a InlineKeyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| WireButton {
                            text: &b.label,
                            callback_data: &b.data,
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct OutgoingText<'a> {
    chat_id: ChatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<i64>,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<WireKeyboard<'a>>,
}

impl<'a> OutgoingText<'a> {
    fn new(chat_id: ChatId, message_id: Option<i64>, text: &'a str, options: &'a MessageOptions) -> Self {
        Self {
            chat_id,
            message_id,
            text,
            parse_mode: options.parse_mode.map(|mode| match mode {
                ParseMode::Html => "HTML",
            }),
            reply_markup: options.keyboard.as_ref().map(WireKeyboard::from),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to the Telegram Bot API over HTTPS.
#[derive(Clone)]
pub struct TelegramAdapter {
    client: reqwest::Client,
    api_url: String,
    request_timeout: Duration,
    long_poll_timeout: Duration,
}

impl TelegramAdapter {
    /// Creates a new `TelegramAdapter` for the bot identified by `token`.
    ///
    /// `request_timeout` bounds every call; `getUpdates` gets it on top of the
    /// long-poll wait.
    pub fn new(
        base_url: &str,
        token: &str,
        request_timeout: Duration,
        long_poll_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
            request_timeout,
            long_poll_timeout,
        })
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
        timeout: Duration,
    ) -> PortResult<T> {
        // The URL embeds the bot token, so it never reaches an error message.
        let response = self
            .client
            .post(format!("{}/{}", self.api_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let timed_out = e.is_timeout();
                let e = e.without_url();
                if timed_out {
                    PortError::Timeout(format!("{}: {}", method, e))
                } else {
                    PortError::Unexpected(format!("{}: {}", method, e))
                }
            })?;

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("{}: {}", method, e.without_url())))?;
        match (envelope.ok, envelope.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(PortError::Unexpected(format!(
                "{} failed: {}",
                method,
                envelope.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Verifies the token and returns the bot's username.
    pub async fn authenticate(&self) -> PortResult<String> {
        let me: BotUser = self
            .call("getMe", &serde_json::json!({}), self.request_timeout)
            .await?;
        Ok(me.username.unwrap_or_default())
    }

    /// Publishes the command menu shown by chat clients.
    pub async fn register_commands(&self, commands: &[(&str, &str)]) -> PortResult<()> {
        let commands: Vec<_> = commands
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();
        let _: bool = self
            .call(
                "setMyCommands",
                &serde_json::json!({ "commands": commands }),
                self.request_timeout,
            )
            .await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> PortResult<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.long_poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body, self.long_poll_timeout + self.request_timeout)
            .await
    }

    /// Long-polls for inbound events until `cancel` fires.
    pub fn updates(&self, cancel: CancellationToken) -> impl Stream<Item = InboundEvent> + '_ {
        async_stream::stream! {
            let mut offset = 0;
            loop {
                let batch = tokio::select! {
                    _ = cancel.cancelled() => break,
                    batch = self.get_updates(offset) => batch,
                };
                match batch {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Some(event) = update.into_event() {
                                yield event;
                            }
                        }
                    }
                    Err(PortError::Timeout(_)) => continue,
                    Err(e) => {
                        warn!("getUpdates failed, retrying in {:?}: {}", RETRY_DELAY, e);
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(RETRY_DELAY) => {}
                        }
                    }
                }
            }
            info!("Inbound update stream stopped.");
        }
    }
}

//=========================================================================================
// `ChatTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatTransport for TelegramAdapter {
    async fn send_message(&self, chat_id: ChatId, text: &str, options: &MessageOptions) -> PortResult<()> {
        let body = OutgoingText::new(chat_id, None, text, options);
        let _: serde_json::Value = self
            .call("sendMessage", &body, self.request_timeout)
            .await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
        options: &MessageOptions,
    ) -> PortResult<()> {
        let body = OutgoingText::new(chat_id, Some(message_id), text, options);
        let _: serde_json::Value = self
            .call("editMessageText", &body, self.request_timeout)
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> PortResult<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &serde_json::json!({ "callback_query_id": callback_id }),
                self.request_timeout,
            )
            .await?;
        Ok(())
    }
}
