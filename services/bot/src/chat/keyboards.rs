//! services/bot/src/chat/keyboards.rs
//!
//! Renders the selectable rows attached to bot messages. Every button payload
//! is produced by `CallbackAction::encode`.

use chrono::{DateTime, Utc};
use episode_tracker_core::callback::{CallbackAction, ListKind};
use episode_tracker_core::domain::{
    episode_code, CachedEpisode, InlineKeyboard, ShowProgress, ShowSearchResult,
};

/// Maximum number of search results offered as buttons.
pub const MAX_SEARCH_ROWS: usize = 5;
const MAX_LABEL_CHARS: usize = 25;
const CANCEL_LABEL: &str = "❌ Cancel";

/// Shortens `text` to `max` characters, ending with `...` when cut.
pub fn trim_label(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn push_action(keyboard: &mut InlineKeyboard, label: impl Into<String>, action: CallbackAction) {
    keyboard.push_button(label, action.encode());
}

fn push_cancel(keyboard: &mut InlineKeyboard) {
    push_action(keyboard, CANCEL_LABEL, CallbackAction::Cancel);
}

//=========================================================================================
// Add-show Flow
//=========================================================================================

pub fn search_results(results: &[ShowSearchResult]) -> InlineKeyboard {
    let mut keyboard = InlineKeyboard::default();
    for (i, result) in results.iter().take(MAX_SEARCH_ROWS).enumerate() {
        let label = format!(
            "{}. {} ({})",
            i + 1,
            trim_label(&result.name, MAX_LABEL_CHARS),
            result.premiered.as_deref().unwrap_or("N/A")
        );
        push_action(&mut keyboard, label, CallbackAction::AcceptShowName { index: i + 1 });
    }
    push_cancel(&mut keyboard);
    keyboard
}

pub fn seasons(seasons: &[u32]) -> InlineKeyboard {
    let mut keyboard = InlineKeyboard::default();
    for &season in seasons {
        push_action(
            &mut keyboard,
            format!("Season {season}"),
            CallbackAction::SelectSeason { season },
        );
    }
    push_cancel(&mut keyboard);
    keyboard
}

pub fn episodes(episodes: &[CachedEpisode]) -> InlineKeyboard {
    let mut keyboard = InlineKeyboard::default();
    for episode in episodes {
        push_action(
            &mut keyboard,
            format!("{}. {}", episode.number, episode.title),
            CallbackAction::SelectEpisode { number: episode.number },
        );
    }
    push_cancel(&mut keyboard);
    keyboard
}

//=========================================================================================
// Show Lists
//=========================================================================================

fn show_row_label(show: &ShowProgress, now: DateTime<Utc>) -> String {
    let upcoming = show.next_airs_after(now);
    let mut line = if show.notifications_enabled && upcoming {
        format!("🔔 {}", show.name)
    } else {
        show.name.clone()
    };
    if let Some(last) = show.last_watched {
        line.push_str(&format!(" ({})", episode_code(last.season, last.number)));
    }
    if show.next_episode.is_some() {
        match show.next_air_date {
            Some(at) if upcoming => line.push_str(&format!(" - Next Ep {}", at.format("%b %-d (%a)"))),
            _ => line.push_str(" - Next Ep Out ✅"),
        }
    }
    line
}

pub fn show_list(shows: &[ShowProgress], list: ListKind, now: DateTime<Utc>) -> InlineKeyboard {
    let mut keyboard = InlineKeyboard::default();
    for (index, show) in shows.iter().enumerate() {
        push_action(
            &mut keyboard,
            show_row_label(show, now),
            CallbackAction::SelectShow { index, list },
        );
    }
    keyboard
}

/// The HTML details card for one row of a show list, with its action buttons.
pub fn show_details(show: &ShowProgress, index: usize, list: ListKind) -> (String, InlineKeyboard) {
    let mut text = format!("<b>{}</b>\n\n", escape_html(&show.name));
    match show.last_watched {
        Some(last) => text.push_str(&format!(
            "Current episode: {}\n",
            episode_code(last.season, last.number)
        )),
        None => text.push_str("Current episode: Not set\n"),
    }
    match show.next_air_date {
        Some(at) => text.push_str(&format!(
            "Next episode air date: {}\n",
            at.format("%a %b %-d, %H:%M")
        )),
        None => text.push_str("Next episode air date: N/A\n"),
    }
    text.push_str(if show.notifications_enabled {
        "Notifications: Enabled\n"
    } else {
        "Notifications: Disabled\n"
    });

    let mut keyboard = InlineKeyboard::default();
    let toggle = if show.notifications_enabled {
        "Disable Notifications"
    } else {
        "Enable Notifications"
    };
    push_action(&mut keyboard, toggle, CallbackAction::ToggleNotifications { index, list });
    push_action(
        &mut keyboard,
        "Mark next as watched",
        CallbackAction::MarkNextWatched { index, list },
    );
    push_action(&mut keyboard, "<< Back to shows list", CallbackAction::BackToShows { list });
    (text, keyboard)
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use episode_tracker_core::domain::EpisodePosition;

    fn progress(name: &str) -> ShowProgress {
        ShowProgress {
            show_id: 1,
            name: name.into(),
            provider: "tvmaze".into(),
            provider_show_id: "82".into(),
            notifications_enabled: true,
            last_watched: Some(EpisodePosition::new(1, 5)),
            next_episode: Some(EpisodePosition::new(1, 6)),
            next_air_date: None,
        }
    }

    #[test]
    fn long_names_are_trimmed_with_an_ellipsis() {
        assert_eq!(trim_label("Short", 25), "Short");
        let trimmed = trim_label("The Extraordinarily Long Show Name", 25);
        assert_eq!(trimmed.chars().count(), 25);
        assert!(trimmed.ends_with("..."));
    }

    #[test]
    fn search_keyboard_caps_rows_and_appends_cancel() {
        let results: Vec<_> = (1..=7)
            .map(|i| ShowSearchResult {
                id: i,
                name: format!("Show {i}"),
                premiered: (i == 1).then(|| "2011-04-17".to_string()),
            })
            .collect();
        let keyboard = search_results(&results);
        let buttons: Vec<_> = keyboard.buttons().collect();
        assert_eq!(buttons.len(), MAX_SEARCH_ROWS + 1);
        assert_eq!(buttons[0].label, "1. Show 1 (2011-04-17)");
        assert_eq!(buttons[0].data, "acceptShowName:1");
        assert_eq!(buttons[1].label, "2. Show 2 (N/A)");
        assert_eq!(buttons[5].label, "❌ Cancel");
        assert_eq!(buttons[5].data, "cancel");
    }

    #[test]
    fn season_and_episode_rows_use_typed_payloads() {
        let keyboard = seasons(&[1, 2]);
        let data: Vec<_> = keyboard.buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, vec!["selectSeason:1", "selectSeason:2", "cancel"]);
    }

    #[test]
    fn show_rows_mark_upcoming_and_available_episodes() {
        let now = Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap();
        let available = progress("Foo");
        assert_eq!(show_row_label(&available, now), "Foo (S01E05) - Next Ep Out ✅");

        let mut upcoming = progress("Bar");
        upcoming.next_air_date = Some(now + Duration::days(3));
        assert_eq!(show_row_label(&upcoming, now), "🔔 Bar (S01E05) - Next Ep Mar 4 (Mon)");

        upcoming.notifications_enabled = false;
        assert!(!show_row_label(&upcoming, now).starts_with('🔔'));

        let keyboard = show_list(&[available, upcoming], ListKind::History, now);
        assert_eq!(keyboard.rows[1][0].data, "selectShow:1:history");
    }

    #[test]
    fn details_offer_toggle_mark_and_back() {
        let mut show = progress("Tom & Jerry");
        show.notifications_enabled = false;
        let (text, keyboard) = show_details(&show, 2, ListKind::Current);
        assert!(text.starts_with("<b>Tom &amp; Jerry</b>"));
        assert!(text.contains("Current episode: S01E05"));
        assert!(text.contains("Next episode air date: N/A"));
        assert!(text.contains("Notifications: Disabled"));

        let buttons: Vec<_> = keyboard.buttons().collect();
        assert_eq!(buttons[0].label, "Enable Notifications");
        assert_eq!(buttons[0].data, "toggleNotifications:2");
        assert_eq!(buttons[1].data, "markNextWatched:2");
        assert_eq!(buttons[2].data, "backToShows");
    }
}
