//! services/bot/src/chat/protocol.rs
//!
//! Defines the inbound events the bot reacts to and the slash-command surface.

use episode_tracker_core::domain::{ChatId, InlineKeyboard, MessageOptions, UserId};

//=========================================================================================
// Events Received FROM the Chat Platform
//=========================================================================================

/// A free-text message (commands included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub text: String,
}

/// A press on an inline button previously rendered by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    /// Identifier used to acknowledge the press.
    pub callback_id: String,
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// The message carrying the pressed keyboard; edited in place by handlers.
    pub message_id: i64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text(TextMessage),
    ButtonPress(ButtonPress),
}

impl InboundEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            InboundEvent::Text(msg) => msg.user_id,
            InboundEvent::ButtonPress(press) => press.user_id,
        }
    }
}

//=========================================================================================
// Replies Sent TO the Chat Platform
//=========================================================================================

/// What a handler wants shown. Replies to text are sent as new messages;
/// replies to button presses replace the message carrying the keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub options: MessageOptions,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: MessageOptions::default(),
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            text: text.into(),
            options: MessageOptions::with_keyboard(keyboard),
        }
    }

    pub fn html(mut self) -> Self {
        self.options = self.options.html();
        self
    }
}

//=========================================================================================
// Slash Commands
//=========================================================================================

/// Commands understood by the conversation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/add` with an optional inline show name.
    Add(Option<String>),
    /// Shows that still have something to watch or wait for.
    Shows,
    /// Every tracked show.
    History,
    Unknown(String),
}

impl Command {
    /// Parses `/name[@bot] [args]`. Returns `None` for text that is not a command.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, args) = match body.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or_default();
        if name.is_empty() {
            return None;
        }

        Some(match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "add" => Command::Add((!args.is_empty()).then(|| args.to_string())),
            "shows" => Command::Shows,
            "history" => Command::History,
            other => Command::Unknown(other.to_string()),
        })
    }

    /// The command menu registered with the chat platform.
    pub fn menu() -> &'static [(&'static str, &'static str)] {
        &[
            ("start", "Start the bot"),
            ("help", "Show help information"),
            ("add", "Add a TV show to track"),
            ("shows", "List your current shows"),
            ("history", "List every show you have tracked"),
        ]
    }
}
