//! Shared fixtures for the bot integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bot_lib::adapters::DbAdapter;
use bot_lib::chat::protocol::{ButtonPress, InboundEvent, TextMessage};
use bot_lib::chat::AppState;
use chrono::{DateTime, Utc};
use episode_tracker_core::domain::{ChatId, MessageOptions, RemoteEpisode, ShowSearchResult};
use episode_tracker_core::ports::{ChatTransport, MockShowSearchService, PortResult};
use std::sync::{Arc, Mutex};

pub const USER: i64 = 501;
pub const CHAT: i64 = 9001;
pub const MESSAGE: i64 = 77;

/// Something the bot pushed to the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Sent { chat_id: ChatId, text: String, options: MessageOptions },
    Edited { chat_id: ChatId, message_id: i64, text: String, options: MessageOptions },
    Acknowledged(String),
}

impl Outgoing {
    pub fn text(&self) -> &str {
        match self {
            Outgoing::Sent { text, .. } | Outgoing::Edited { text, .. } => text,
            Outgoing::Acknowledged(_) => "",
        }
    }

    pub fn button_labels(&self) -> Vec<String> {
        self.keyboard_buttons(|label, _| label.to_string())
    }

    /// Callback payloads of the attached keyboard, row by row.
    pub fn button_data(&self) -> Vec<String> {
        self.keyboard_buttons(|_, data| data.to_string())
    }

    fn keyboard_buttons(&self, pick: impl Fn(&str, &str) -> String) -> Vec<String> {
        match self {
            Outgoing::Sent { options, .. } | Outgoing::Edited { options, .. } => options
                .keyboard
                .as_ref()
                .map(|k| k.buttons().map(|b| pick(&b.label, &b.data)).collect())
                .unwrap_or_default(),
            Outgoing::Acknowledged(_) => Vec::new(),
        }
    }

    /// True for an in-place edit of the message carrying the pressed keyboard.
    pub fn is_edit(&self) -> bool {
        matches!(self, Outgoing::Edited { message_id, .. } if *message_id == MESSAGE)
    }
}

/// The single non-acknowledgement item in `outgoing`.
pub fn reply(outgoing: &[Outgoing]) -> &Outgoing {
    let mut messages = outgoing
        .iter()
        .filter(|o| !matches!(o, Outgoing::Acknowledged(_)));
    let first = messages.next().expect("a reply");
    assert!(messages.next().is_none(), "more than one reply: {outgoing:?}");
    first
}

pub fn acknowledged(outgoing: &[Outgoing]) -> bool {
    outgoing.iter().any(|o| matches!(o, Outgoing::Acknowledged(_)))
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    outgoing: Arc<Mutex<Vec<Outgoing>>>,
}

impl RecordingTransport {
    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<Outgoing> {
        std::mem::take(&mut *self.outgoing.lock().expect("lock outgoing"))
    }

    /// Drains the recorded messages, dropping acknowledgements.
    pub fn take_messages(&self) -> Vec<Outgoing> {
        self.take()
            .into_iter()
            .filter(|o| !matches!(o, Outgoing::Acknowledged(_)))
            .collect()
    }

    fn record(&self, outgoing: Outgoing) {
        self.outgoing.lock().expect("lock outgoing").push(outgoing);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat_id: ChatId, text: &str, options: &MessageOptions) -> PortResult<()> {
        self.record(Outgoing::Sent {
            chat_id,
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
        options: &MessageOptions,
    ) -> PortResult<()> {
        self.record(Outgoing::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> PortResult<()> {
        self.record(Outgoing::Acknowledged(callback_id.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub db: Arc<DbAdapter>,
    pub transport: RecordingTransport,
}

impl Harness {
    pub async fn new(search: MockShowSearchService) -> Self {
        let db = Arc::new(DbAdapter::in_memory().await.expect("in-memory database"));
        let transport = RecordingTransport::default();
        let state = AppState::new(db.clone(), Arc::new(search), Arc::new(transport.clone()));
        Self { state, db, transport }
    }

    pub async fn text(&self, text: &str) -> Vec<Outgoing> {
        bot_lib::chat::handle_event(
            &self.state,
            InboundEvent::Text(TextMessage {
                user_id: USER,
                chat_id: CHAT,
                text: text.to_string(),
            }),
        )
        .await;
        self.transport.take()
    }

    pub async fn press(&self, data: &str) -> Vec<Outgoing> {
        bot_lib::chat::handle_event(
            &self.state,
            InboundEvent::ButtonPress(ButtonPress {
                callback_id: format!("cb-{data}"),
                user_id: USER,
                chat_id: CHAT,
                message_id: MESSAGE,
                data: data.to_string(),
            }),
        )
        .await;
        self.transport.take()
    }
}

pub fn hit(id: i64, name: &str) -> ShowSearchResult {
    ShowSearchResult {
        id,
        name: name.to_string(),
        premiered: Some("2020-01-01".to_string()),
    }
}

pub fn remote(id: i64, season: u32, number: u32, airs: Option<DateTime<Utc>>) -> RemoteEpisode {
    RemoteEpisode {
        id,
        season,
        number: Some(number),
        title: format!("Chapter {number}"),
        air_date: airs.map(|at| at.format("%Y-%m-%d").to_string()),
        air_time: None,
        air_timestamp: airs,
    }
}

/// A search mock that finds exactly one show with the given episodes.
pub fn single_show_search(id: i64, name: &str, episodes: Vec<RemoteEpisode>) -> MockShowSearchService {
    let mut search = MockShowSearchService::new();
    let result = hit(id, name);
    search.expect_search().returning(move |_| Ok(vec![result.clone()]));
    search
        .expect_list_episodes()
        .withf(move |show_id| *show_id == id)
        .returning(move |_| Ok(episodes.clone()));
    search
}
