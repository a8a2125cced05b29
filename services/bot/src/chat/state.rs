//! services/bot/src/chat/state.rs
//!
//! Defines the application's shared state and the per-user conversation sessions.

use dashmap::DashMap;
use episode_tracker_core::callback::ListKind;
use episode_tracker_core::domain::{ShowProgress, ShowSearchResult, UserId};
use episode_tracker_core::ports::{ChatTransport, DatabaseService, ShowSearchService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Handlers)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub search: Arc<dyn ShowSearchService>,
    pub transport: Arc<dyn ChatTransport>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        search: Arc<dyn ShowSearchService>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            db,
            search,
            transport,
            sessions: SessionStore::default(),
        }
    }
}

//=========================================================================================
// Session (Specific to One User)
//=========================================================================================

/// The subscription being configured by the add-show flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedShow {
    pub show_id: i64,
    pub provider_show_id: String,
    pub name: String,
}

impl From<&ShowProgress> for SelectedShow {
    fn from(show: &ShowProgress) -> Self {
        Self {
            show_id: show.show_id,
            provider_show_id: show.provider_show_id.clone(),
            name: show.name.clone(),
        }
    }
}

/// Where a user is in the conversation. A user with no stored session is idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// `/add` was sent without a name; the next free text is the search query.
    AwaitingShowName,
    /// Search results are on screen; buttons refer to rows of `results`.
    ChoosingShow { results: Vec<ShowSearchResult> },
    ChoosingSeason { show: SelectedShow },
    ChoosingEpisode { show: SelectedShow, season: u32 },
    /// A show list is on screen; buttons refer to rows of `shows`.
    BrowsingShows {
        kind: ListKind,
        shows: Vec<ShowProgress>,
    },
}

impl Session {
    /// The show being configured, for states where progress can be entered.
    pub fn selected_show(&self) -> Option<&SelectedShow> {
        match self {
            Session::ChoosingSeason { show } | Session::ChoosingEpisode { show, .. } => Some(show),
            _ => None,
        }
    }
}

/// In-memory session contexts keyed by user. Each entry is locked independently,
/// so concurrent access to different users never contends.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<DashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn get(&self, user_id: UserId) -> Option<Session> {
        self.inner.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn set(&self, user_id: UserId, session: Session) {
        self.inner.insert(user_id, session);
    }

    pub fn clear(&self, user_id: UserId) {
        self.inner.remove(&user_id);
    }

    /// Applies `f` to the user's session while holding that entry's lock.
    /// Returns `None` when there is no session.
    pub fn update<R>(&self, user_id: UserId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.inner.get_mut(&user_id).map(|mut entry| f(entry.value_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show() -> SelectedShow {
        SelectedShow {
            show_id: 1,
            provider_show_id: "82".into(),
            name: "Foo".into(),
        }
    }

    #[test]
    fn sessions_are_isolated_per_user() {
        let store = SessionStore::default();
        store.set(1, Session::AwaitingShowName);
        assert_eq!(store.get(1), Some(Session::AwaitingShowName));
        assert_eq!(store.get(2), None);

        store.clear(1);
        assert_eq!(store.get(1), None);
    }

    #[test]
    fn update_mutates_in_place_and_skips_missing_sessions() {
        let store = SessionStore::default();
        assert_eq!(store.update(7, |_| ()), None);

        store.set(7, Session::ChoosingSeason { show: show() });
        store.update(7, |session| {
            if let Session::ChoosingSeason { show } = session {
                *session = Session::ChoosingEpisode {
                    show: show.clone(),
                    season: 2,
                };
            }
        });
        assert_eq!(
            store.get(7),
            Some(Session::ChoosingEpisode {
                show: show(),
                season: 2
            })
        );
    }

    #[test]
    fn only_configuring_states_expose_a_selected_show() {
        assert_eq!(Session::ChoosingSeason { show: show() }.selected_show(), Some(&show()));
        assert_eq!(Session::AwaitingShowName.selected_show(), None);
    }
}
