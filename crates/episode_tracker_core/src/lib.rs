pub mod callback;
pub mod domain;
pub mod ports;
pub mod progress;

pub use callback::{CallbackAction, CallbackDecodeError, ListKind};
pub use domain::{
    CachedEpisode, ChainOutcome, ChatId, DueReminder, EpisodePosition, EpisodeUpsert,
    InlineButton, InlineKeyboard, MessageOptions, NewReminder, NewShow, ParseMode,
    PendingReminder, RemoteEpisode, Show, ShowProgress, ShowSearchResult, UserId,
    DEFAULT_PROVIDER,
};
pub use ports::{ChatTransport, DatabaseService, PortError, PortResult, ShowSearchService};
pub use progress::ProgressOutcome;
