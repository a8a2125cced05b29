pub mod db;
pub mod telegram;
pub mod tvmaze;

pub use db::DbAdapter;
pub use telegram::TelegramAdapter;
pub use tvmaze::TvMazeAdapter;
