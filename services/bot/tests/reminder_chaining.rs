//! Reminder delivery and chaining against an in-memory database.

mod common;

use bot_lib::adapters::DbAdapter;
use bot_lib::chat::ReminderScheduler;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Outgoing, RecordingTransport, CHAT, USER};
use episode_tracker_core::domain::{
    CachedEpisode, EpisodeUpsert, NewReminder, NewShow, DEFAULT_PROVIDER,
};
use episode_tracker_core::ports::{DatabaseService, MockChatTransport, PortError};
use std::sync::Arc;

const SHOW: &str = "82";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 20, 0, 0).unwrap()
}

struct Fixture {
    db: Arc<DbAdapter>,
    show_id: i64,
}

impl Fixture {
    async fn new() -> Self {
        let db = Arc::new(DbAdapter::in_memory().await.unwrap());
        let show_id = db
            .add_show(NewShow {
                user_id: USER,
                name: "Foo".into(),
                provider: DEFAULT_PROVIDER.into(),
                provider_show_id: SHOW.into(),
            })
            .await
            .unwrap();
        Self { db, show_id }
    }

    async fn episode(&self, number: u32, aired_at: Option<DateTime<Utc>>) -> CachedEpisode {
        self.db
            .upsert_episode(EpisodeUpsert {
                provider: DEFAULT_PROVIDER.into(),
                provider_show_id: SHOW.into(),
                provider_episode_id: format!("{SHOW}-{number}"),
                season: 1,
                number,
                title: format!("Chapter {number}"),
                airdate: None,
                airtime: None,
                aired_at,
            })
            .await
            .unwrap()
    }

    async fn remind(&self, episode: &CachedEpisode, at: DateTime<Utc>) {
        let created = self
            .db
            .create_reminder(NewReminder {
                user_id: USER,
                show_id: self.show_id,
                episode_id: episode.id,
                remind_at: at,
                chat_id: CHAT,
            })
            .await
            .unwrap();
        assert!(created);
    }

    fn scheduler(&self, transport: RecordingTransport) -> ReminderScheduler {
        ReminderScheduler::new(
            self.db.clone(),
            Arc::new(transport),
            std::time::Duration::from_secs(10),
            std::time::Duration::from_secs(300),
        )
    }

    async fn reminder_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM reminders WHERE show_id = ?")
            .bind(self.show_id)
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn firing_without_a_dated_successor_ends_the_chain() {
    let f = Fixture::new().await;
    let e6 = f.episode(6, Some(now() - Duration::minutes(1))).await;
    f.episode(7, None).await;
    f.remind(&e6, now() - Duration::minutes(1)).await;

    let transport = RecordingTransport::default();
    let scheduler = f.scheduler(transport.clone());
    assert_eq!(scheduler.tick(now()).await.unwrap(), 1);

    let sent = transport.take_messages();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Outgoing::Sent { chat_id, text, .. } => {
            assert_eq!(*chat_id, CHAT);
            assert_eq!(text, "Episode #6 \"Chapter 6\" of \"Foo\" (season 1) is coming out today!");
        }
        other => panic!("expected a new message, got {other:?}"),
    }

    assert_eq!(f.reminder_count().await, 0);
    let show = f.db.get_show(f.show_id).await.unwrap();
    assert_eq!(show.last_watched_episode_id, Some(e6.id));

    // Nothing is delivered twice.
    assert_eq!(scheduler.tick(now()).await.unwrap(), 0);
    assert!(transport.take_messages().is_empty());
}

#[tokio::test]
async fn firing_rearms_for_the_next_dated_episode() {
    let f = Fixture::new().await;
    let e6 = f.episode(6, Some(now())).await;
    let e7_airs = now() + Duration::days(7);
    let e7 = f.episode(7, Some(e7_airs)).await;
    f.remind(&e6, now()).await;

    let transport = RecordingTransport::default();
    let scheduler = f.scheduler(transport.clone());
    assert_eq!(scheduler.tick(now()).await.unwrap(), 1);
    assert_eq!(f.reminder_count().await, 1);

    let pending = f.db.pending_reminder(f.show_id).await.unwrap().unwrap();
    assert_eq!(pending.episode_id, e7.id);
    assert_eq!(pending.remind_at, e7_airs);

    // Not due yet.
    assert_eq!(scheduler.tick(now() + Duration::days(1)).await.unwrap(), 0);

    assert_eq!(scheduler.tick(e7_airs).await.unwrap(), 1);
    assert_eq!(f.reminder_count().await, 0);
    let texts: Vec<_> = transport
        .take_messages()
        .iter()
        .map(|o| o.text().to_string())
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].starts_with("Episode #7 \"Chapter 7\""));
    assert_eq!(
        f.db.get_show(f.show_id).await.unwrap().last_watched_episode_id,
        Some(e7.id)
    );
}

#[tokio::test]
async fn reminders_inside_the_lookahead_window_are_delivered_early() {
    let f = Fixture::new().await;
    let soon = now() + Duration::minutes(2);
    let later = now() + Duration::minutes(10);
    let e1 = f.episode(1, Some(soon)).await;
    f.remind(&e1, soon).await;

    let transport = RecordingTransport::default();
    let scheduler = f.scheduler(transport.clone());
    assert_eq!(scheduler.tick(now()).await.unwrap(), 1);

    let e2 = f.episode(2, Some(later)).await;
    f.remind(&e2, later).await;
    assert_eq!(scheduler.tick(now()).await.unwrap(), 0);
    assert_eq!(scheduler.tick(now() + Duration::minutes(6)).await.unwrap(), 1);
}

#[tokio::test]
async fn disabled_notifications_keep_the_reminder_parked() {
    let f = Fixture::new().await;
    let e1 = f.episode(1, Some(now() - Duration::hours(1))).await;
    f.remind(&e1, now() - Duration::hours(1)).await;
    assert!(!f.db.toggle_notifications(f.show_id).await.unwrap());

    let transport = RecordingTransport::default();
    let scheduler = f.scheduler(transport.clone());
    assert_eq!(scheduler.tick(now()).await.unwrap(), 0);
    assert!(transport.take_messages().is_empty());
    assert_eq!(f.reminder_count().await, 1);
}

#[tokio::test]
async fn failed_delivery_is_retried_on_the_next_poll() {
    let f = Fixture::new().await;
    let e1 = f.episode(1, Some(now())).await;
    f.remind(&e1, now()).await;

    let mut failing = MockChatTransport::new();
    failing
        .expect_send_message()
        .times(1)
        .returning(|_, _, _| Err(PortError::Unexpected("chat is down".into())));
    let scheduler = ReminderScheduler::new(
        f.db.clone(),
        Arc::new(failing),
        std::time::Duration::from_secs(10),
        std::time::Duration::from_secs(300),
    );
    assert_eq!(scheduler.tick(now()).await.unwrap(), 0);
    assert_eq!(f.reminder_count().await, 1);
    assert_eq!(f.db.get_show(f.show_id).await.unwrap().last_watched_episode_id, None);

    let transport = RecordingTransport::default();
    assert_eq!(f.scheduler(transport.clone()).tick(now()).await.unwrap(), 1);
    assert_eq!(f.reminder_count().await, 0);
}
