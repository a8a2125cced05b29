//! services/bot/src/error.rs
//!
//! Defines the error types for the bot service: `BotError` for internal
//! failures (logged, never shown verbatim) and `UserError`, which pairs an
//! internal cause with the short message the user sees.

use crate::config::ConfigError;
use episode_tracker_core::ports::PortError;

/// The primary error type for the `bot` service.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A handler expected conversation state that is no longer there.
    #[error("Session expired or missing")]
    ExpiredSession,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// A failure that should be reported to the user as `message`.
#[derive(Debug, thiserror::Error)]
#[error("{message} ({source})")]
pub struct UserError {
    #[source]
    pub source: BotError,
    pub message: String,
}

impl UserError {
    pub fn new(source: impl Into<BotError>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }

    /// The session needed by a button or reply is gone.
    pub fn expired_session(restart_hint: &str) -> Self {
        Self::new(
            BotError::ExpiredSession,
            format!("Session expired. Please start over with {restart_hint}."),
        )
    }
}

/// Result type for every handler reachable from the update loop.
pub type HandlerResult<T = ()> = Result<T, UserError>;

/// Attaches a user-facing message to any error convertible into `BotError`.
pub trait UserFacing<T> {
    fn user_msg(self, message: &str) -> HandlerResult<T>;
}

impl<T, E: Into<BotError>> UserFacing<T> for Result<T, E> {
    fn user_msg(self, message: &str) -> HandlerResult<T> {
        self.map_err(|e| UserError::new(e, message))
    }
}
