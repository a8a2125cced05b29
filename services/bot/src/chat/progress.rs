//! services/bot/src/chat/progress.rs
//!
//! Records a user's watched position and arms the reminder for the following
//! episode. The episode button, the free-text "<season> <episode>" reply and
//! the "mark next as watched" button all go through `record_progress`.

use crate::chat::state::{AppState, SelectedShow};
use crate::error::{HandlerResult, UserError, UserFacing};
use chrono::{DateTime, Utc};
use episode_tracker_core::domain::{
    episode_code, ChatId, EpisodePosition, NewReminder, UserId, DEFAULT_PROVIDER,
};
use episode_tracker_core::ports::PortError;
use episode_tracker_core::progress::ProgressOutcome;
use tracing::{debug, info};

const UPDATE_FAILED: &str = "Failed to update progress";

/// Marks `position` of `show` as the last watched episode and returns the text
/// reported back to the user.
pub async fn record_progress(
    state: &AppState,
    user_id: UserId,
    chat_id: ChatId,
    show: &SelectedShow,
    position: EpisodePosition,
    now: DateTime<Utc>,
) -> HandlerResult<String> {
    let watched = match state
        .db
        .find_episode_by_number(DEFAULT_PROVIDER, &show.provider_show_id, position)
        .await
    {
        Ok(episode) => episode,
        Err(e @ PortError::NotFound(_)) => {
            return Err(UserError::new(e, "I can't find the episode you specified"))
        }
        Err(e) => return Err(UserError::new(e, UPDATE_FAILED)),
    };

    let next = state
        .db
        .find_next_episode(DEFAULT_PROVIDER, &show.provider_show_id, Some(position))
        .await
        .user_msg(UPDATE_FAILED)?;

    state
        .db
        .set_last_watched_episode(show.show_id, watched.id)
        .await
        .user_msg(UPDATE_FAILED)?;

    let outcome = ProgressOutcome::classify(next, now);
    if let ProgressOutcome::Scheduled { next, airs_at } = &outcome {
        let created = state
            .db
            .create_reminder(NewReminder {
                user_id,
                show_id: show.show_id,
                episode_id: next.id,
                remind_at: *airs_at,
                chat_id,
            })
            .await
            .user_msg("Failed to create reminder")?;
        if created {
            info!(show_id = show.show_id, "Reminder armed for {} at {}", next.code(), airs_at);
        } else {
            debug!(show_id = show.show_id, "A reminder is already pending; keeping it");
        }
    }

    Ok(progress_message(&show.name, position, &outcome))
}

/// Text reported after progress was recorded.
pub fn progress_message(show_name: &str, position: EpisodePosition, outcome: &ProgressOutcome) -> String {
    let marked = format!(
        "Marked \"{}\" as watched up to {}.",
        show_name,
        episode_code(position.season, position.number)
    );
    match outcome {
        ProgressOutcome::CaughtUp => marked,
        ProgressOutcome::Scheduled { next, airs_at } => format!(
            "{} Next episode \"{}\" is expected to air on {}. I'll notify you when it airs.",
            marked,
            next.title,
            airs_at.format("%a %b %-d, %H:%M")
        ),
        ProgressOutcome::AlreadyAvailable { next } => {
            format!("{} Next episode \"{}\" is already available.", marked, next.title)
        }
    }
}

/// Parses a free-text "<season> <episode>" reply.
pub fn parse_position(text: &str) -> Option<EpisodePosition> {
    let mut parts = text.split_whitespace();
    let season = parts.next()?.parse().ok()?;
    let number = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(EpisodePosition::new(season, number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use episode_tracker_core::domain::CachedEpisode;

    fn episode(title: &str) -> CachedEpisode {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        CachedEpisode {
            id: 6,
            provider: DEFAULT_PROVIDER.into(),
            provider_show_id: "82".into(),
            provider_episode_id: "600".into(),
            season: 1,
            number: 6,
            title: title.into(),
            airdate: None,
            airtime: None,
            aired_at: None,
            fetched_at: at,
        }
    }

    #[test]
    fn messages_follow_the_three_way_branch() {
        let position = EpisodePosition::new(1, 5);
        assert_eq!(
            progress_message("Foo", position, &ProgressOutcome::CaughtUp),
            "Marked \"Foo\" as watched up to S01E05."
        );

        let available = ProgressOutcome::AlreadyAvailable { next: episode("Six") };
        assert_eq!(
            progress_message("Foo", position, &available),
            "Marked \"Foo\" as watched up to S01E05. Next episode \"Six\" is already available."
        );

        let airs_at = Utc.with_ymd_and_hms(2030, 1, 1, 21, 0, 0).unwrap();
        let scheduled = ProgressOutcome::Scheduled { next: episode("Six"), airs_at };
        assert_eq!(
            progress_message("Foo", position, &scheduled),
            "Marked \"Foo\" as watched up to S01E05. Next episode \"Six\" is expected to air on \
             Tue Jan 1, 21:00. I'll notify you when it airs."
        );
    }

    #[test]
    fn free_text_positions_need_exactly_two_numbers() {
        assert_eq!(parse_position("1 5"), Some(EpisodePosition::new(1, 5)));
        assert_eq!(parse_position("  2   10 "), Some(EpisodePosition::new(2, 10)));
        assert_eq!(parse_position("1"), None);
        assert_eq!(parse_position("1 5 7"), None);
        assert_eq!(parse_position("s1 e5"), None);
    }
}
