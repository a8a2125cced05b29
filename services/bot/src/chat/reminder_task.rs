//! services/bot/src/chat/reminder_task.rs
//!
//! This module contains the background worker that delivers due reminders and
//! chains each one to the following episode.

use chrono::{DateTime, Utc};
use episode_tracker_core::domain::{ChainOutcome, DueReminder, MessageOptions};
use episode_tracker_core::ports::{ChatTransport, DatabaseService, PortResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Polls the reminder queue on a fixed period.
///
/// Delivery happens before the chaining transaction commits, so a crash (or a
/// failed commit) between the two re-delivers the reminder on a later poll.
/// Reminders are delivered at least once, never silently dropped.
pub struct ReminderScheduler {
    db: Arc<dyn DatabaseService>,
    transport: Arc<dyn ChatTransport>,
    poll_interval: Duration,
    lookahead: Duration,
}

impl ReminderScheduler {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        transport: Arc<dyn ChatTransport>,
        poll_interval: Duration,
        lookahead: Duration,
    ) -> Self {
        Self {
            db,
            transport,
            poll_interval,
            lookahead,
        }
    }

    /// Runs until `cancellation_token` fires. Cancellation is only observed
    /// between polls; a batch in flight always runs to completion.
    pub async fn run(self, cancellation_token: CancellationToken) {
        info!(
            "Reminder scheduler started (every {:?}, lookahead {:?}).",
            self.poll_interval, self.lookahead
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(Utc::now()).await {
                Ok(0) => {}
                Ok(delivered) => info!("Delivered {} reminder(s).", delivered),
                Err(e) => error!("Failed to poll due reminders: {}", e),
            }
        }
        info!("Reminder scheduler stopped.");
    }

    /// Delivers every reminder due by `now + lookahead` and returns how many
    /// were delivered and chained.
    pub async fn tick(&self, now: DateTime<Utc>) -> PortResult<usize> {
        let lookahead = chrono::Duration::from_std(self.lookahead).unwrap_or_else(|_| chrono::Duration::zero());
        let due = self.db.due_reminders(now + lookahead).await?;
        if !due.is_empty() {
            debug!("{} reminder(s) due.", due.len());
        }

        let mut delivered = 0;
        for reminder in &due {
            if self.deliver(reminder).await {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn deliver(&self, due: &DueReminder) -> bool {
        let reminder = &due.reminder;
        if let Err(e) = self
            .transport
            .send_message(reminder.chat_id, &due.notification_text(), &MessageOptions::default())
            .await
        {
            warn!(
                reminder_id = reminder.id,
                "Delivery failed, keeping the reminder for the next poll: {}", e
            );
            return false;
        }

        match self.db.complete_reminder(due).await {
            Ok(ChainOutcome::Advanced { next: Some(next) }) => {
                info!(
                    reminder_id = reminder.id,
                    show_id = reminder.show_id,
                    "Delivered {}; next reminder at {}",
                    due.episode.code(),
                    next.remind_at
                );
                true
            }
            Ok(ChainOutcome::Advanced { next: None }) => {
                info!(
                    reminder_id = reminder.id,
                    show_id = reminder.show_id,
                    "Delivered {}; nothing further to schedule",
                    due.episode.code()
                );
                true
            }
            Ok(ChainOutcome::AlreadyConsumed) => {
                warn!(reminder_id = reminder.id, "Reminder was already consumed elsewhere");
                false
            }
            Err(e) => {
                error!(
                    reminder_id = reminder.id,
                    "Chaining failed, the reminder stays pending: {}", e
                );
                false
            }
        }
    }
}
