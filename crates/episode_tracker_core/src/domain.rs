//! crates/episode_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};

/// Opaque chat-platform user identifier.
pub type UserId = i64;
/// Opaque chat-platform conversation identifier.
pub type ChatId = i64;

/// The content provider every subscription and cached episode is keyed under.
pub const DEFAULT_PROVIDER: &str = "tvmaze";

/// A user's tracked show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Show {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
    pub provider: String,
    pub provider_show_id: String,
    pub timezone: String,
    pub last_watched_episode_id: Option<i64>,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a subscription.
#[derive(Debug, Clone)]
pub struct NewShow {
    pub user_id: UserId,
    pub name: String,
    pub provider: String,
    pub provider_show_id: String,
}

/// A single episode as stored in the local catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEpisode {
    pub id: i64,
    pub provider: String,
    pub provider_show_id: String,
    pub provider_episode_id: String,
    pub season: u32,
    pub number: u32,
    pub title: String,
    pub airdate: Option<String>,
    pub airtime: Option<String>,
    pub aired_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedEpisode {
    /// `S01E05` style label.
    pub fn code(&self) -> String {
        episode_code(self.season, self.number)
    }

    /// True when the episode has a known air time strictly after `now`.
    pub fn airs_after(&self, now: DateTime<Utc>) -> bool {
        self.aired_at.is_some_and(|at| at > now)
    }
}

/// An episode to be inserted into (or refreshed in) the catalog.
#[derive(Debug, Clone)]
pub struct EpisodeUpsert {
    pub provider: String,
    pub provider_show_id: String,
    pub provider_episode_id: String,
    pub season: u32,
    pub number: u32,
    pub title: String,
    pub airdate: Option<String>,
    pub airtime: Option<String>,
    pub aired_at: Option<DateTime<Utc>>,
}

/// Position inside a show, ordered by season then number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodePosition {
    pub season: u32,
    pub number: u32,
}

impl EpisodePosition {
    /// The position used when a user has no recorded progress: the first real
    /// episode of season one is "next".
    pub const START: EpisodePosition = EpisodePosition { season: 1, number: 0 };

    pub fn new(season: u32, number: u32) -> Self {
        Self { season, number }
    }
}

/// A notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReminder {
    pub id: i64,
    pub user_id: UserId,
    pub show_id: i64,
    pub episode_id: i64,
    pub remind_at: DateTime<Utc>,
    pub chat_id: ChatId,
}

/// Input for arming a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub user_id: UserId,
    pub show_id: i64,
    pub episode_id: i64,
    pub remind_at: DateTime<Utc>,
    pub chat_id: ChatId,
}

/// A due reminder joined with everything needed to render and chain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub reminder: PendingReminder,
    pub show_name: String,
    pub episode: CachedEpisode,
}

impl DueReminder {
    /// The text delivered to the user when the reminder fires.
    pub fn notification_text(&self) -> String {
        format!(
            "Episode #{} \"{}\" of \"{}\" (season {}) is coming out today!",
            self.episode.number, self.episode.title, self.show_name, self.episode.season
        )
    }
}

/// Result of the chaining transaction for one delivered reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Another worker already consumed the reminder; nothing was written.
    AlreadyConsumed,
    /// Progress advanced; `next` is the reminder armed for the following episode, if any.
    Advanced { next: Option<NewReminder> },
}

/// A subscription joined with its current and next episode, for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowProgress {
    pub show_id: i64,
    pub name: String,
    pub provider: String,
    pub provider_show_id: String,
    pub notifications_enabled: bool,
    pub last_watched: Option<EpisodePosition>,
    pub next_episode: Option<EpisodePosition>,
    pub next_air_date: Option<DateTime<Utc>>,
}

impl ShowProgress {
    /// A show is "current" while there is still a next episode to watch or wait for.
    pub fn is_current(&self) -> bool {
        self.next_episode.is_some()
    }

    /// True when the next episode has a known air time after `now`.
    pub fn next_airs_after(&self, now: DateTime<Utc>) -> bool {
        self.next_air_date.is_some_and(|at| at > now)
    }
}

/// A show returned by the remote search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowSearchResult {
    pub id: i64,
    pub name: String,
    pub premiered: Option<String>,
}

/// An episode returned by the remote listing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEpisode {
    pub id: i64,
    pub season: u32,
    pub number: Option<u32>,
    pub title: String,
    pub air_date: Option<String>,
    pub air_time: Option<String>,
    pub air_timestamp: Option<DateTime<Utc>>,
}

impl RemoteEpisode {
    /// Converts into a catalog upsert, or `None` for unnumbered specials.
    pub fn into_upsert(self, provider: &str, provider_show_id: &str) -> Option<EpisodeUpsert> {
        let number = self.number?;
        Some(EpisodeUpsert {
            provider: provider.to_string(),
            provider_show_id: provider_show_id.to_string(),
            provider_episode_id: self.id.to_string(),
            season: self.season,
            number,
            title: self.title,
            airdate: self.air_date.filter(|d| !d.is_empty()),
            airtime: self.air_time.filter(|t| !t.is_empty()),
            aired_at: self.air_timestamp,
        })
    }
}

//=========================================================================================
// Chat rendering primitives
//=========================================================================================

/// A single selectable button: a label and the opaque payload sent back on press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

/// Rows of buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Appends a row holding one button.
    pub fn push_button(&mut self, label: impl Into<String>, data: impl Into<String>) {
        self.rows.push(vec![InlineButton {
            label: label.into(),
            data: data.into(),
        }]);
    }

    /// Iterates over every button, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
}

/// Rendering options for an outgoing or edited message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    pub keyboard: Option<InlineKeyboard>,
    pub parse_mode: Option<ParseMode>,
}

impl MessageOptions {
    pub fn with_keyboard(keyboard: InlineKeyboard) -> Self {
        Self {
            keyboard: Some(keyboard),
            parse_mode: None,
        }
    }

    pub fn html(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Html);
        self
    }
}

/// `S01E05` style label.
pub fn episode_code(season: u32, number: u32) -> String {
    format!("S{:02}E{:02}", season, number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn positions_order_by_season_then_number() {
        let mut positions = vec![
            EpisodePosition::new(2, 1),
            EpisodePosition::new(1, 10),
            EpisodePosition::new(1, 2),
        ];
        positions.sort();
        assert_eq!(
            positions,
            vec![
                EpisodePosition::new(1, 2),
                EpisodePosition::new(1, 10),
                EpisodePosition::new(2, 1),
            ]
        );
        assert!(EpisodePosition::START < EpisodePosition::new(1, 1));
    }

    #[test]
    fn unnumbered_specials_are_not_cached() {
        let special = RemoteEpisode {
            id: 9,
            season: 1,
            number: None,
            title: "Special".into(),
            air_date: Some(String::new()),
            air_time: None,
            air_timestamp: None,
        };
        assert!(special.into_upsert(DEFAULT_PROVIDER, "1").is_none());
    }

    #[test]
    fn empty_air_fields_become_absent() {
        let episode = RemoteEpisode {
            id: 42,
            season: 3,
            number: Some(4),
            title: "Pilot".into(),
            air_date: Some(String::new()),
            air_time: Some(String::new()),
            air_timestamp: None,
        };
        let upsert = episode.into_upsert(DEFAULT_PROVIDER, "7").unwrap();
        assert_eq!(upsert.provider_episode_id, "42");
        assert_eq!(upsert.provider_show_id, "7");
        assert!(upsert.airdate.is_none());
        assert!(upsert.airtime.is_none());
    }

    #[test]
    fn notification_text_names_show_and_episode() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 20, 0, 0).unwrap();
        let due = DueReminder {
            reminder: PendingReminder {
                id: 1,
                user_id: 10,
                show_id: 2,
                episode_id: 3,
                remind_at: at,
                chat_id: 99,
            },
            show_name: "Foo".into(),
            episode: CachedEpisode {
                id: 3,
                provider: DEFAULT_PROVIDER.into(),
                provider_show_id: "5".into(),
                provider_episode_id: "500".into(),
                season: 1,
                number: 6,
                title: "The Return".into(),
                airdate: None,
                airtime: None,
                aired_at: Some(at),
                fetched_at: at,
            },
        };
        assert_eq!(
            due.notification_text(),
            "Episode #6 \"The Return\" of \"Foo\" (season 1) is coming out today!"
        );
        assert_eq!(due.episode.code(), "S01E06");
    }
}
