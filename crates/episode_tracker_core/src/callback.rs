//! crates/episode_tracker_core/src/callback.rs
//!
//! The payload carried by inline buttons. Buttons are rendered with
//! [`CallbackAction::encode`] and button presses are read back with
//! [`CallbackAction::decode`]; nothing else splits payload strings.
//!
//! Wire form: `action[:param[:listType]]`, e.g. `selectSeason:2`,
//! `selectShow:0:history`, `cancel`.

use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = ':';

/// Which rendered show list a show-row button refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListKind {
    /// Subscriptions that still have a next episode.
    #[default]
    Current,
    /// Every subscription.
    History,
}

impl ListKind {
    fn as_str(self) -> &'static str {
        match self {
            ListKind::Current => "current",
            ListKind::History => "history",
        }
    }
}

impl FromStr for ListKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(ListKind::Current),
            "history" => Ok(ListKind::History),
            _ => Err(()),
        }
    }
}

/// A decoded button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// 1-based row of the last search result list.
    AcceptShowName { index: usize },
    SelectSeason { season: u32 },
    SelectEpisode { number: u32 },
    /// 0-based row of the last rendered show list.
    SelectShow { index: usize, list: ListKind },
    BackToShows { list: ListKind },
    ToggleNotifications { index: usize, list: ListKind },
    MarkNextWatched { index: usize, list: ListKind },
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackDecodeError {
    #[error("unknown callback action '{0}'")]
    UnknownAction(String),
    #[error("callback action '{action}' is missing its parameter")]
    MissingParameter { action: &'static str },
    #[error("callback action '{action}' has an invalid parameter '{value}'")]
    InvalidParameter { action: &'static str, value: String },
}

impl CallbackAction {
    pub fn action_name(&self) -> &'static str {
        match self {
            CallbackAction::AcceptShowName { .. } => "acceptShowName",
            CallbackAction::SelectSeason { .. } => "selectSeason",
            CallbackAction::SelectEpisode { .. } => "selectEpisode",
            CallbackAction::SelectShow { .. } => "selectShow",
            CallbackAction::BackToShows { .. } => "backToShows",
            CallbackAction::ToggleNotifications { .. } => "toggleNotifications",
            CallbackAction::MarkNextWatched { .. } => "markNextWatched",
            CallbackAction::Cancel => "cancel",
        }
    }

    pub fn encode(&self) -> String {
        let name = self.action_name();
        match *self {
            CallbackAction::AcceptShowName { index } => format!("{name}{SEPARATOR}{index}"),
            CallbackAction::SelectSeason { season } => format!("{name}{SEPARATOR}{season}"),
            CallbackAction::SelectEpisode { number } => format!("{name}{SEPARATOR}{number}"),
            CallbackAction::SelectShow { index, list }
            | CallbackAction::ToggleNotifications { index, list }
            | CallbackAction::MarkNextWatched { index, list } => match list {
                ListKind::Current => format!("{name}{SEPARATOR}{index}"),
                other => format!("{name}{SEPARATOR}{index}{SEPARATOR}{}", other.as_str()),
            },
            CallbackAction::BackToShows { list } => match list {
                ListKind::Current => name.to_string(),
                other => format!("{name}{SEPARATOR}{}", other.as_str()),
            },
            CallbackAction::Cancel => name.to_string(),
        }
    }

    pub fn decode(data: &str) -> Result<Self, CallbackDecodeError> {
        let mut parts = data.split(SEPARATOR);
        let action = parts.next().unwrap_or_default();
        let first = parts.next();
        let second = parts.next();

        match action {
            "acceptShowName" => Ok(CallbackAction::AcceptShowName {
                index: numeric("acceptShowName", first)?,
            }),
            "selectSeason" => Ok(CallbackAction::SelectSeason {
                season: numeric("selectSeason", first)?,
            }),
            "selectEpisode" => Ok(CallbackAction::SelectEpisode {
                number: numeric("selectEpisode", first)?,
            }),
            "selectShow" => Ok(CallbackAction::SelectShow {
                index: numeric("selectShow", first)?,
                list: list_kind("selectShow", second)?,
            }),
            "toggleNotifications" => Ok(CallbackAction::ToggleNotifications {
                index: numeric("toggleNotifications", first)?,
                list: list_kind("toggleNotifications", second)?,
            }),
            "markNextWatched" => Ok(CallbackAction::MarkNextWatched {
                index: numeric("markNextWatched", first)?,
                list: list_kind("markNextWatched", second)?,
            }),
            "backToShows" => Ok(CallbackAction::BackToShows {
                list: list_kind("backToShows", first)?,
            }),
            "cancel" => Ok(CallbackAction::Cancel),
            other => Err(CallbackDecodeError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CallbackAction {
    type Err = CallbackDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn numeric<T: FromStr>(action: &'static str, raw: Option<&str>) -> Result<T, CallbackDecodeError> {
    let raw = raw.ok_or(CallbackDecodeError::MissingParameter { action })?;
    raw.parse().map_err(|_| CallbackDecodeError::InvalidParameter {
        action,
        value: raw.to_string(),
    })
}

fn list_kind(action: &'static str, raw: Option<&str>) -> Result<ListKind, CallbackDecodeError> {
    match raw {
        None | Some("") => Ok(ListKind::Current),
        Some(value) => value
            .parse()
            .map_err(|_| CallbackDecodeError::InvalidParameter {
                action,
                value: value.to_string(),
            }),
    }
}
