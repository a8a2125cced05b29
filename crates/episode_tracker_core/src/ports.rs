//! crates/episode_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage engine, the show catalog API and the chat platform.

use crate::domain::{
    CachedEpisode, ChainOutcome, ChatId, DueReminder, EpisodePosition, EpisodeUpsert,
    MessageOptions, NewReminder, NewShow, PendingReminder, RemoteEpisode, Show, ShowProgress,
    ShowSearchResult, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Operation timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Subscriptions ---

    /// Creates the subscription, or returns the id of the existing one for the
    /// same (user, provider, provider show id).
    async fn add_show(&self, show: NewShow) -> PortResult<i64>;

    async fn get_show(&self, show_id: i64) -> PortResult<Show>;

    /// Every subscription of the user joined with its current and next episode,
    /// in creation order.
    async fn list_shows_with_progress(&self, user_id: UserId) -> PortResult<Vec<ShowProgress>>;

    async fn set_last_watched_episode(&self, show_id: i64, episode_id: i64) -> PortResult<()>;

    /// Flips the notifications flag and returns the new value.
    async fn toggle_notifications(&self, show_id: i64) -> PortResult<bool>;

    // --- Episode catalog ---

    /// Inserts or refreshes an episode keyed by (provider, provider episode id).
    async fn upsert_episode(&self, episode: EpisodeUpsert) -> PortResult<CachedEpisode>;

    /// Fails with `NotFound` when the episode is not cached.
    async fn find_episode_by_number(
        &self,
        provider: &str,
        provider_show_id: &str,
        position: EpisodePosition,
    ) -> PortResult<CachedEpisode>;

    /// The first episode strictly after `after` by (season, number); an absent
    /// position is treated as [`EpisodePosition::START`].
    async fn find_next_episode(
        &self,
        provider: &str,
        provider_show_id: &str,
        after: Option<EpisodePosition>,
    ) -> PortResult<Option<CachedEpisode>>;

    async fn list_seasons(&self, provider: &str, provider_show_id: &str) -> PortResult<Vec<u32>>;

    async fn list_episodes_by_season(
        &self,
        provider: &str,
        provider_show_id: &str,
        season: u32,
    ) -> PortResult<Vec<CachedEpisode>>;

    // --- Reminders ---

    /// Arms a reminder. Returns `false` when one is already pending for the
    /// subscription, in which case nothing changes.
    async fn create_reminder(&self, reminder: NewReminder) -> PortResult<bool>;

    async fn pending_reminder(&self, show_id: i64) -> PortResult<Option<PendingReminder>>;

    /// Reminders due at or before `until` whose subscription has notifications enabled.
    async fn due_reminders(&self, until: DateTime<Utc>) -> PortResult<Vec<DueReminder>>;

    /// Atomically deletes the reminder, records its episode as watched and arms
    /// the reminder for the following episode when it has a known air time.
    async fn complete_reminder(&self, due: &DueReminder) -> PortResult<ChainOutcome>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ShowSearchService: Send + Sync {
    /// Searches the remote catalog by free-text show name.
    async fn search(&self, query: &str) -> PortResult<Vec<ShowSearchResult>>;

    /// Lists every episode of a remote show.
    async fn list_episodes(&self, show_id: i64) -> PortResult<Vec<RemoteEpisode>>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str, options: &MessageOptions)
        -> PortResult<()>;

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: i64,
        text: &str,
        options: &MessageOptions,
    ) -> PortResult<()>;

    /// Stops the client's loading indicator for a button press.
    async fn answer_callback(&self, callback_id: &str) -> PortResult<()>;
}
