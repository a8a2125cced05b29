//! services/bot/src/chat/conversation.rs
//!
//! The conversation controller: slash commands, free-text replies and the
//! add-show flow (search, pick a show, pick a season, pick an episode).

use crate::chat::{
    keyboards,
    progress::{parse_position, record_progress},
    protocol::{Command, Reply, TextMessage},
    state::{AppState, SelectedShow, Session},
};
use crate::error::{BotError, HandlerResult, UserError, UserFacing};
use chrono::Utc;
use episode_tracker_core::callback::ListKind;
use episode_tracker_core::domain::{
    ChatId, EpisodePosition, InlineKeyboard, NewShow, ShowProgress, UserId, DEFAULT_PROVIDER,
};
use episode_tracker_core::ports::PortError;
use tracing::info;

const START_TEXT: &str = "Hello! I'm a bot that helps you track your TV shows and notify you when new episodes air.

/add - Add a TV show to track
/shows - List your current shows
/history - List every show you have tracked";

const HELP_TEXT: &str = "Commands:

/add <show> - add a show to track
/shows - list shows with something left to watch
/history - list all your shows
/help - show this help

While picking a season or an episode you can also reply with \"<season> <episode>\", e.g. \"2 5\".";

const UNEXPECTED_TEXT: &str = "Unexpected message received, see /help for available commands.";
const WRONG_FORMAT_TEXT: &str = "Wrong format of the reply, it should be: #season #episode";

//=========================================================================================
// Text Entry Point
//=========================================================================================

/// Handles a free-text message or command.
pub async fn handle_text(state: &AppState, msg: &TextMessage) -> HandlerResult<Reply> {
    if let Some(command) = Command::parse(&msg.text) {
        return handle_command(state, msg, command).await;
    }

    match state.sessions.get(msg.user_id) {
        Some(Session::AwaitingShowName) => search_show(state, msg.user_id, msg.text.trim()).await,
        Some(Session::ChoosingSeason { show }) | Some(Session::ChoosingEpisode { show, .. }) => {
            match parse_position(&msg.text) {
                Some(position) => finish_progress(state, msg.user_id, msg.chat_id, &show, position).await,
                None => Ok(Reply::text(WRONG_FORMAT_TEXT)),
            }
        }
        _ => Ok(Reply::text(UNEXPECTED_TEXT)),
    }
}

async fn handle_command(state: &AppState, msg: &TextMessage, command: Command) -> HandlerResult<Reply> {
    match command {
        Command::Start => Ok(Reply::text(START_TEXT)),
        Command::Help => Ok(Reply::text(HELP_TEXT)),
        Command::Add(None) => {
            state.sessions.set(msg.user_id, Session::AwaitingShowName);
            Ok(Reply::text("Enter show name:"))
        }
        Command::Add(Some(query)) => search_show(state, msg.user_id, &query).await,
        Command::Shows => list_shows(state, msg.user_id, ListKind::Current).await,
        Command::History => list_shows(state, msg.user_id, ListKind::History).await,
        Command::Unknown(name) => Ok(Reply::text(format!(
            "Unknown command: /{name}. See /help for available commands."
        ))),
    }
}

//=========================================================================================
// Add-show Flow
//=========================================================================================

async fn search_show(state: &AppState, user_id: UserId, query: &str) -> HandlerResult<Reply> {
    if query.is_empty() {
        state.sessions.set(user_id, Session::AwaitingShowName);
        return Ok(Reply::text("Enter show name"));
    }

    let results = match state.search.search(query).await {
        Ok(results) => results,
        Err(e) => {
            state.sessions.clear(user_id);
            return Err(UserError::new(e, format!("Error searching show {query}")));
        }
    };

    if results.is_empty() {
        state.sessions.clear(user_id);
        return Ok(Reply::text(format!("No shows found for: {query}")));
    }

    let keyboard = keyboards::search_results(&results);
    state.sessions.set(user_id, Session::ChoosingShow { results });
    Ok(Reply::with_keyboard("Pick the show you want to add:", keyboard))
}

/// Subscribes the user to the `index`-th (1-based) search result, refreshes its
/// episode cache and asks for the season, or directly for the episode when the
/// show has a single season.
pub async fn accept_show(state: &AppState, user_id: UserId, index: usize) -> HandlerResult<Reply> {
    let picked = match state.sessions.get(user_id) {
        Some(Session::ChoosingShow { results }) => index
            .checked_sub(1)
            .and_then(|i| results.into_iter().nth(i)),
        _ => None,
    };
    let Some(picked) = picked else {
        state.sessions.clear(user_id);
        return Err(UserError::expired_session("/add"));
    };

    let provider_show_id = picked.id.to_string();
    let show_id = state
        .db
        .add_show(NewShow {
            user_id,
            name: picked.name.clone(),
            provider: DEFAULT_PROVIDER.to_string(),
            provider_show_id: provider_show_id.clone(),
        })
        .await
        .user_msg("Error adding show, please try again later.")?;
    info!(user_id, show_id, "Tracking show '{}'", picked.name);

    let show = SelectedShow {
        show_id,
        provider_show_id,
        name: picked.name,
    };
    refresh_episode_cache(state, &show).await?;

    let seasons = state
        .db
        .list_seasons(DEFAULT_PROVIDER, &show.provider_show_id)
        .await
        .user_msg("Error fetching seasons")?;

    match seasons.as_slice() {
        [] => {
            state.sessions.clear(user_id);
            Ok(Reply::text(format!(
                "TV show \"{}\" added. No episodes are listed for it yet.",
                show.name
            )))
        }
        [season] => {
            let season = *season;
            let keyboard = episode_keyboard(state, &show, season).await?;
            let text = format!(
                "TV show \"{}\" added. Which episode of season {} are you on?",
                show.name, season
            );
            state.sessions.set(user_id, Session::ChoosingEpisode { show, season });
            Ok(Reply::with_keyboard(text, keyboard))
        }
        many => {
            let text = format!("TV show \"{}\" added. Which season are you on?", show.name);
            let keyboard = keyboards::seasons(many);
            state.sessions.set(user_id, Session::ChoosingSeason { show });
            Ok(Reply::with_keyboard(text, keyboard))
        }
    }
}

async fn refresh_episode_cache(state: &AppState, show: &SelectedShow) -> HandlerResult {
    let provider_id: i64 = show.provider_show_id.parse().map_err(|_| {
        let cause = BotError::Internal(format!("bad provider show id '{}'", show.provider_show_id));
        UserError::new(cause, "Episode fetching failed")
    })?;

    let episodes = match state.search.list_episodes(provider_id).await {
        Ok(episodes) => episodes,
        Err(e @ PortError::Timeout(_)) => {
            return Err(UserError::new(e, "Episode fetching timed out, please try again later."))
        }
        Err(e) => return Err(UserError::new(e, "Episode fetching failed")),
    };

    let mut cached = 0;
    for remote in episodes {
        let Some(upsert) = remote.into_upsert(DEFAULT_PROVIDER, &show.provider_show_id) else {
            continue;
        };
        state
            .db
            .upsert_episode(upsert)
            .await
            .user_msg("Error saving episodes, please try again later.")?;
        cached += 1;
    }
    info!(show_id = show.show_id, "Cached {} episodes", cached);
    Ok(())
}

async fn episode_keyboard(
    state: &AppState,
    show: &SelectedShow,
    season: u32,
) -> HandlerResult<InlineKeyboard> {
    let episodes = state
        .db
        .list_episodes_by_season(DEFAULT_PROVIDER, &show.provider_show_id, season)
        .await
        .user_msg("Error fetching episodes")?;
    Ok(keyboards::episodes(&episodes))
}

/// Moves from season selection to episode selection.
pub async fn choose_season(state: &AppState, user_id: UserId, season: u32) -> HandlerResult<Reply> {
    let Some(show) = state
        .sessions
        .get(user_id)
        .and_then(|session| session.selected_show().cloned())
    else {
        state.sessions.clear(user_id);
        return Err(UserError::expired_session("/add"));
    };

    let keyboard = episode_keyboard(state, &show, season).await?;
    state.sessions.update(user_id, move |session| {
        *session = Session::ChoosingEpisode { show, season };
    });
    Ok(Reply::with_keyboard(
        format!("Which episode of season {season} are you on?"),
        keyboard,
    ))
}

/// Records the picked episode of the selected season and ends the flow.
pub async fn choose_episode(
    state: &AppState,
    user_id: UserId,
    chat_id: ChatId,
    number: u32,
) -> HandlerResult<Reply> {
    let Some(Session::ChoosingEpisode { show, season }) = state.sessions.get(user_id) else {
        state.sessions.clear(user_id);
        return Err(UserError::expired_session("/add"));
    };
    finish_progress(state, user_id, chat_id, &show, EpisodePosition::new(season, number)).await
}

async fn finish_progress(
    state: &AppState,
    user_id: UserId,
    chat_id: ChatId,
    show: &SelectedShow,
    position: EpisodePosition,
) -> HandlerResult<Reply> {
    let result = record_progress(state, user_id, chat_id, show, position, Utc::now()).await;
    state.sessions.clear(user_id);
    result.map(Reply::text)
}

//=========================================================================================
// Show Lists
//=========================================================================================

/// Loads the user's subscriptions restricted to `kind`.
pub async fn load_show_list(
    state: &AppState,
    user_id: UserId,
    kind: ListKind,
) -> Result<Vec<ShowProgress>, PortError> {
    let shows = state.db.list_shows_with_progress(user_id).await?;
    Ok(match kind {
        ListKind::Current => shows.into_iter().filter(ShowProgress::is_current).collect(),
        ListKind::History => shows,
    })
}

/// Renders the show list of `kind` and remembers it for the row buttons.
pub async fn list_shows(state: &AppState, user_id: UserId, kind: ListKind) -> HandlerResult<Reply> {
    let shows = load_show_list(state, user_id, kind)
        .await
        .user_msg("Error: can't list shows at this time")?;

    if shows.is_empty() {
        state.sessions.clear(user_id);
        return Ok(Reply::text(match kind {
            ListKind::Current => {
                "You have no shows to watch right now. Use /add <show> to add one or /history to see all your shows."
            }
            ListKind::History => "You have no shows yet. Use /add <show> to add one.",
        }));
    }

    Ok(show_list_reply(state, user_id, kind, shows))
}

/// Stores `shows` as the user's browsed list and renders it.
pub fn show_list_reply(state: &AppState, user_id: UserId, kind: ListKind, shows: Vec<ShowProgress>) -> Reply {
    let keyboard = keyboards::show_list(&shows, kind, Utc::now());
    state.sessions.set(user_id, Session::BrowsingShows { kind, shows });
    Reply::with_keyboard("Your shows:", keyboard)
}
