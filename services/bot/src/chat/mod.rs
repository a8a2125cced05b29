pub mod callbacks;
pub mod conversation;
pub mod keyboards;
pub mod progress;
pub mod protocol;
pub mod reminder_task;
pub mod state;
pub mod update_loop;

// Re-export the entry points used by the binary to wire the two loops.
pub use reminder_task::ReminderScheduler;
pub use state::{AppState, SessionStore};
pub use update_loop::{handle_event, run_update_loop};
