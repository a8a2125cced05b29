//! services/bot/src/chat/callbacks.rs
//!
//! The callback router. Decodes a button press into a `CallbackAction`, runs the
//! matching operation and acknowledges the press.

use crate::chat::{
    conversation::{self, load_show_list, show_list_reply},
    keyboards,
    progress::record_progress,
    protocol::{ButtonPress, Reply},
    state::{AppState, SelectedShow, Session},
};
use crate::error::{BotError, HandlerResult, UserError, UserFacing};
use chrono::Utc;
use episode_tracker_core::callback::{CallbackAction, ListKind};
use episode_tracker_core::domain::{ShowProgress, UserId};
use tracing::{debug, warn};

/// Handles a button press. Returns `Ok(None)` for payloads that are ignored.
pub async fn handle_button_press(state: &AppState, press: &ButtonPress) -> HandlerResult<Option<Reply>> {
    let action = match CallbackAction::decode(&press.data) {
        Ok(action) => action,
        Err(e) => {
            warn!(user_id = press.user_id, "Ignoring button press '{}': {}", press.data, e);
            return Ok(None);
        }
    };
    debug!(user_id = press.user_id, "Button press: {:?}", action);

    let result = dispatch(state, press, action).await;
    acknowledge(state, press).await;
    result.map(Some)
}

async fn acknowledge(state: &AppState, press: &ButtonPress) {
    if let Err(e) = state.transport.answer_callback(&press.callback_id).await {
        warn!("Failed to acknowledge button press {}: {}", press.callback_id, e);
    }
}

async fn dispatch(state: &AppState, press: &ButtonPress, action: CallbackAction) -> HandlerResult<Reply> {
    let user_id = press.user_id;
    match action {
        CallbackAction::AcceptShowName { index } => conversation::accept_show(state, user_id, index).await,
        CallbackAction::SelectSeason { season } => conversation::choose_season(state, user_id, season).await,
        CallbackAction::SelectEpisode { number } => {
            conversation::choose_episode(state, user_id, press.chat_id, number).await
        }
        CallbackAction::SelectShow { index, list } => {
            let shows = browsed_list(state, user_id, list)?;
            let show = row(&shows, index)?;
            let (text, keyboard) = keyboards::show_details(show, index, list);
            Ok(Reply::with_keyboard(text, keyboard).html())
        }
        CallbackAction::BackToShows { list } => {
            let shows = browsed_list(state, user_id, list)?;
            Ok(show_list_reply(state, user_id, list, shows))
        }
        CallbackAction::ToggleNotifications { index, list } => {
            let shows = browsed_list(state, user_id, list)?;
            let show_id = row(&shows, index)?.show_id;
            let enabled = state
                .db
                .toggle_notifications(show_id)
                .await
                .user_msg("Error toggling notifications")?;
            debug!(show_id, enabled, "Notifications toggled");
            refreshed_details(state, user_id, list, show_id, None).await
        }
        CallbackAction::MarkNextWatched { index, list } => {
            let shows = browsed_list(state, user_id, list)?;
            let show = row(&shows, index)?;
            let Some(next) = show.next_episode else {
                return Ok(Reply::text("No next episode found."));
            };
            let summary = record_progress(
                state,
                user_id,
                press.chat_id,
                &SelectedShow::from(show),
                next,
                Utc::now(),
            )
            .await?;
            refreshed_details(state, user_id, list, show.show_id, Some(summary)).await
        }
        CallbackAction::Cancel => {
            state.sessions.clear(user_id);
            Ok(Reply::text("Operation cancelled."))
        }
    }
}

fn restart_hint(list: ListKind) -> &'static str {
    match list {
        ListKind::Current => "/shows",
        ListKind::History => "/history",
    }
}

/// The show list the pressed button was rendered from.
fn browsed_list(state: &AppState, user_id: UserId, list: ListKind) -> HandlerResult<Vec<ShowProgress>> {
    match state.sessions.get(user_id) {
        Some(Session::BrowsingShows { kind, shows }) if kind == list && !shows.is_empty() => Ok(shows),
        _ => {
            state.sessions.clear(user_id);
            Err(UserError::expired_session(restart_hint(list)))
        }
    }
}

fn row(shows: &[ShowProgress], index: usize) -> HandlerResult<&ShowProgress> {
    shows.get(index).ok_or_else(|| {
        UserError::new(
            BotError::Internal(format!("show row {} of {}", index, shows.len())),
            "Invalid show selection.",
        )
    })
}

/// Reloads the list after a change and re-renders the details of `show_id`,
/// or the list itself when the show no longer belongs to it.
async fn refreshed_details(
    state: &AppState,
    user_id: UserId,
    list: ListKind,
    show_id: i64,
    summary: Option<String>,
) -> HandlerResult<Reply> {
    let shows = load_show_list(state, user_id, list)
        .await
        .user_msg("Error refreshing shows list")?;

    if shows.is_empty() {
        state.sessions.clear(user_id);
        let done = "Nothing left in this list. See /history for all your shows.".to_string();
        return Ok(Reply::text(match summary {
            Some(summary) => format!("{summary}\n\n{done}"),
            None => done,
        }));
    }

    let Some(index) = shows.iter().position(|s| s.show_id == show_id) else {
        let mut reply = show_list_reply(state, user_id, list, shows);
        if let Some(summary) = summary {
            reply.text = format!("{summary}\n\n{}", reply.text);
        }
        return Ok(reply);
    };

    let (details, keyboard) = keyboards::show_details(&shows[index], index, list);
    state.sessions.set(user_id, Session::BrowsingShows { kind: list, shows });
    let text = match summary {
        Some(summary) => format!("{}\n\n{}", keyboards::escape_html(&summary), details),
        None => details,
    };
    Ok(Reply::with_keyboard(text, keyboard).html())
}
