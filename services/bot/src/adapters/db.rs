//! services/bot/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.
//!
//! Timestamps are stored as RFC 3339 text truncated to whole seconds in UTC, so
//! string comparison in SQL matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use episode_tracker_core::domain::{
    CachedEpisode, ChainOutcome, DueReminder, EpisodePosition, EpisodeUpsert, NewReminder,
    NewShow, PendingReminder, Show, ShowProgress, UserId,
};
use episode_tracker_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        // A single connection serializes the update loop and the scheduler on
        // one handle and keeps SQLite free of lock contention.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A fresh, migrated in-memory database.
    pub async fn in_memory() -> Result<Self, crate::error::BotError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;
        let adapter = Self::new(pool);
        adapter.run_migrations().await?;
        Ok(adapter)
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

const EPISODE_COLUMNS: &str = "id, provider, provider_show_id, provider_episode_id, season, number, \
     title, airdate, airtime, aired_at_utc, fetched_at";

const REMINDER_COLUMNS: &str = "id, user_id, show_id, episode_id, remind_at, chat_id";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ShowRecord {
    id: i64,
    user_id: i64,
    name: String,
    provider: String,
    provider_show_id: String,
    timezone: String,
    last_watched_episode_id: Option<i64>,
    notifications_enabled: bool,
    created_at: DateTime<Utc>,
}
impl ShowRecord {
    fn to_domain(self) -> Show {
        Show {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            provider: self.provider,
            provider_show_id: self.provider_show_id,
            timezone: self.timezone,
            last_watched_episode_id: self.last_watched_episode_id,
            notifications_enabled: self.notifications_enabled,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct EpisodeRecord {
    id: i64,
    provider: String,
    provider_show_id: String,
    provider_episode_id: String,
    season: i64,
    number: i64,
    title: String,
    airdate: Option<String>,
    airtime: Option<String>,
    aired_at_utc: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
}
impl EpisodeRecord {
    fn to_domain(self) -> CachedEpisode {
        CachedEpisode {
            id: self.id,
            provider: self.provider,
            provider_show_id: self.provider_show_id,
            provider_episode_id: self.provider_episode_id,
            season: self.season as u32,
            number: self.number as u32,
            title: self.title,
            airdate: self.airdate,
            airtime: self.airtime,
            aired_at: self.aired_at_utc,
            fetched_at: self.fetched_at,
        }
    }
}

#[derive(FromRow)]
struct ReminderRecord {
    id: i64,
    user_id: i64,
    show_id: i64,
    episode_id: i64,
    remind_at: DateTime<Utc>,
    chat_id: i64,
}
impl ReminderRecord {
    fn to_domain(self) -> PendingReminder {
        PendingReminder {
            id: self.id,
            user_id: self.user_id,
            show_id: self.show_id,
            episode_id: self.episode_id,
            remind_at: self.remind_at,
            chat_id: self.chat_id,
        }
    }
}

/// A due reminder joined with its show name and cached episode.
#[derive(FromRow)]
struct DueReminderRecord {
    id: i64,
    user_id: i64,
    show_id: i64,
    episode_id: i64,
    remind_at: DateTime<Utc>,
    chat_id: i64,
    show_name: String,
    provider: String,
    provider_show_id: String,
    provider_episode_id: String,
    season: i64,
    number: i64,
    title: String,
    airdate: Option<String>,
    airtime: Option<String>,
    aired_at_utc: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
}
impl DueReminderRecord {
    fn to_domain(self) -> DueReminder {
        DueReminder {
            reminder: PendingReminder {
                id: self.id,
                user_id: self.user_id,
                show_id: self.show_id,
                episode_id: self.episode_id,
                remind_at: self.remind_at,
                chat_id: self.chat_id,
            },
            show_name: self.show_name,
            episode: CachedEpisode {
                id: self.episode_id,
                provider: self.provider,
                provider_show_id: self.provider_show_id,
                provider_episode_id: self.provider_episode_id,
                season: self.season as u32,
                number: self.number as u32,
                title: self.title,
                airdate: self.airdate,
                airtime: self.airtime,
                aired_at: self.aired_at_utc,
                fetched_at: self.fetched_at,
            },
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    id: i64,
    name: String,
    provider: String,
    provider_show_id: String,
    notifications_enabled: bool,
    last_season: Option<i64>,
    last_number: Option<i64>,
    next_season: Option<i64>,
    next_number: Option<i64>,
    next_aired_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    fn to_domain(self) -> ShowProgress {
        let position = |season: Option<i64>, number: Option<i64>| match (season, number) {
            (Some(season), Some(number)) => Some(EpisodePosition::new(season as u32, number as u32)),
            _ => None,
        };
        ShowProgress {
            show_id: self.id,
            name: self.name,
            provider: self.provider,
            provider_show_id: self.provider_show_id,
            notifications_enabled: self.notifications_enabled,
            last_watched: position(self.last_season, self.last_number),
            next_episode: position(self.next_season, self.next_number),
            next_air_date: self.next_aired_at,
        }
    }
}

//=========================================================================================
// Queries shared between the pool and open transactions
//=========================================================================================

async fn next_episode_on(
    conn: &mut SqliteConnection,
    provider: &str,
    provider_show_id: &str,
    after: Option<EpisodePosition>,
) -> Result<Option<CachedEpisode>, sqlx::Error> {
    let after = after.unwrap_or(EpisodePosition::START);
    let record = sqlx::query_as::<_, EpisodeRecord>(&format!(
        "SELECT {EPISODE_COLUMNS} FROM episodes_cache \
         WHERE provider = ? AND provider_show_id = ? \
           AND (season > ? OR (season = ? AND number > ?)) \
         ORDER BY season ASC, number ASC \
         LIMIT 1"
    ))
    .bind(provider)
    .bind(provider_show_id)
    .bind(after.season as i64)
    .bind(after.season as i64)
    .bind(after.number as i64)
    .fetch_optional(conn)
    .await?;
    Ok(record.map(EpisodeRecord::to_domain))
}

async fn insert_reminder_on(
    conn: &mut SqliteConnection,
    reminder: &NewReminder,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO reminders (user_id, show_id, episode_id, remind_at, chat_id) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (user_id, show_id) DO NOTHING",
    )
    .bind(reminder.user_id)
    .bind(reminder.show_id)
    .bind(reminder.episode_id)
    .bind(db_time(reminder.remind_at))
    .bind(reminder.chat_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn add_show(&self, show: NewShow) -> PortResult<i64> {
        sqlx::query(
            "INSERT INTO shows (user_id, name, provider, provider_show_id, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (user_id, provider, provider_show_id) DO NOTHING",
        )
        .bind(show.user_id)
        .bind(&show.name)
        .bind(&show.provider)
        .bind(&show.provider_show_id)
        .bind(db_time(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let id: i64 = sqlx::query_scalar(
            "SELECT id FROM shows WHERE user_id = ? AND provider = ? AND provider_show_id = ?",
        )
        .bind(show.user_id)
        .bind(&show.provider)
        .bind(&show.provider_show_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn get_show(&self, show_id: i64) -> PortResult<Show> {
        let record = sqlx::query_as::<_, ShowRecord>(
            "SELECT id, user_id, name, provider, provider_show_id, timezone, \
                    last_watched_episode_id, notifications_enabled, created_at \
             FROM shows WHERE id = ?",
        )
        .bind(show_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Show {} not found", show_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_shows_with_progress(&self, user_id: UserId) -> PortResult<Vec<ShowProgress>> {
        let records = sqlx::query_as::<_, ProgressRecord>(
            "SELECT s.id, s.name, s.provider, s.provider_show_id, s.notifications_enabled, \
                    l.season AS last_season, l.number AS last_number, \
                    n.season AS next_season, n.number AS next_number, n.aired_at_utc AS next_aired_at \
             FROM shows s \
             LEFT JOIN episodes_cache l ON l.id = s.last_watched_episode_id \
             LEFT JOIN episodes_cache n ON n.id = ( \
                 SELECT c.id FROM episodes_cache c \
                 WHERE c.provider = s.provider AND c.provider_show_id = s.provider_show_id \
                   AND (c.season > COALESCE(l.season, ?) \
                        OR (c.season = COALESCE(l.season, ?) AND c.number > COALESCE(l.number, ?))) \
                 ORDER BY c.season ASC, c.number ASC \
                 LIMIT 1) \
             WHERE s.user_id = ? \
             ORDER BY s.id ASC",
        )
        .bind(EpisodePosition::START.season as i64)
        .bind(EpisodePosition::START.season as i64)
        .bind(EpisodePosition::START.number as i64)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(ProgressRecord::to_domain).collect())
    }

    async fn set_last_watched_episode(&self, show_id: i64, episode_id: i64) -> PortResult<()> {
        let result = sqlx::query("UPDATE shows SET last_watched_episode_id = ? WHERE id = ?")
            .bind(episode_id)
            .bind(show_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Show {} not found", show_id)));
        }
        Ok(())
    }

    async fn toggle_notifications(&self, show_id: i64) -> PortResult<bool> {
        let enabled: Option<bool> = sqlx::query_scalar(
            "UPDATE shows SET notifications_enabled = NOT notifications_enabled \
             WHERE id = ? RETURNING notifications_enabled",
        )
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        enabled.ok_or_else(|| PortError::NotFound(format!("Show {} not found", show_id)))
    }

    async fn upsert_episode(&self, episode: EpisodeUpsert) -> PortResult<CachedEpisode> {
        let record = sqlx::query_as::<_, EpisodeRecord>(&format!(
            "INSERT INTO episodes_cache \
                (provider, provider_show_id, provider_episode_id, season, number, title, \
                 airdate, airtime, aired_at_utc, fetched_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (provider, provider_episode_id) DO UPDATE SET \
                title = excluded.title, \
                season = excluded.season, \
                number = excluded.number, \
                airdate = excluded.airdate, \
                airtime = excluded.airtime, \
                aired_at_utc = excluded.aired_at_utc, \
                fetched_at = excluded.fetched_at \
             RETURNING {EPISODE_COLUMNS}"
        ))
        .bind(&episode.provider)
        .bind(&episode.provider_show_id)
        .bind(&episode.provider_episode_id)
        .bind(episode.season as i64)
        .bind(episode.number as i64)
        .bind(&episode.title)
        .bind(&episode.airdate)
        .bind(&episode.airtime)
        .bind(episode.aired_at.map(db_time))
        .bind(db_time(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn find_episode_by_number(
        &self,
        provider: &str,
        provider_show_id: &str,
        position: EpisodePosition,
    ) -> PortResult<CachedEpisode> {
        let record = sqlx::query_as::<_, EpisodeRecord>(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes_cache \
             WHERE provider = ? AND provider_show_id = ? AND season = ? AND number = ?"
        ))
        .bind(provider)
        .bind(provider_show_id)
        .bind(position.season as i64)
        .bind(position.number as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(EpisodeRecord::to_domain).ok_or_else(|| {
            PortError::NotFound(format!(
                "Episode S{}E{} of show {} not found",
                position.season, position.number, provider_show_id
            ))
        })
    }

    async fn find_next_episode(
        &self,
        provider: &str,
        provider_show_id: &str,
        after: Option<EpisodePosition>,
    ) -> PortResult<Option<CachedEpisode>> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        next_episode_on(&mut *conn, provider, provider_show_id, after)
            .await
            .map_err(unexpected)
    }

    async fn list_seasons(&self, provider: &str, provider_show_id: &str) -> PortResult<Vec<u32>> {
        let seasons: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT season FROM episodes_cache \
             WHERE provider = ? AND provider_show_id = ? \
             ORDER BY season ASC",
        )
        .bind(provider)
        .bind(provider_show_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(seasons.into_iter().map(|s| s as u32).collect())
    }

    async fn list_episodes_by_season(
        &self,
        provider: &str,
        provider_show_id: &str,
        season: u32,
    ) -> PortResult<Vec<CachedEpisode>> {
        let records = sqlx::query_as::<_, EpisodeRecord>(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes_cache \
             WHERE provider = ? AND provider_show_id = ? AND season = ? \
             ORDER BY number ASC"
        ))
        .bind(provider)
        .bind(provider_show_id)
        .bind(season as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(EpisodeRecord::to_domain).collect())
    }

    async fn create_reminder(&self, reminder: NewReminder) -> PortResult<bool> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        insert_reminder_on(&mut *conn, &reminder)
            .await
            .map_err(unexpected)
    }

    async fn pending_reminder(&self, show_id: i64) -> PortResult<Option<PendingReminder>> {
        let record = sqlx::query_as::<_, ReminderRecord>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE show_id = ?"
        ))
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ReminderRecord::to_domain))
    }

    async fn due_reminders(&self, until: DateTime<Utc>) -> PortResult<Vec<DueReminder>> {
        let records = sqlx::query_as::<_, DueReminderRecord>(
            "SELECT r.id, r.user_id, r.show_id, r.episode_id, r.remind_at, r.chat_id, \
                    s.name AS show_name, e.provider, e.provider_show_id, e.provider_episode_id, \
                    e.season, e.number, e.title, e.airdate, e.airtime, e.aired_at_utc, e.fetched_at \
             FROM reminders r \
             JOIN shows s ON s.id = r.show_id \
             JOIN episodes_cache e ON e.id = r.episode_id \
             WHERE r.remind_at <= ? AND s.notifications_enabled = 1 \
             ORDER BY r.remind_at ASC, r.id ASC",
        )
        .bind(db_time(until))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(DueReminderRecord::to_domain).collect())
    }

    async fn complete_reminder(&self, due: &DueReminder) -> PortResult<ChainOutcome> {
        let reminder = &due.reminder;
        let episode = &due.episode;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let deleted = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(reminder.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if deleted == 0 {
            tx.rollback().await.map_err(unexpected)?;
            return Ok(ChainOutcome::AlreadyConsumed);
        }

        sqlx::query("UPDATE shows SET last_watched_episode_id = ? WHERE id = ?")
            .bind(reminder.episode_id)
            .bind(reminder.show_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let following = next_episode_on(
            &mut *tx,
            &episode.provider,
            &episode.provider_show_id,
            Some(EpisodePosition::new(episode.season, episode.number)),
        )
        .await
        .map_err(unexpected)?;

        let mut armed = None;
        if let Some(next) = following {
            if let Some(remind_at) = next.aired_at {
                let new_reminder = NewReminder {
                    user_id: reminder.user_id,
                    show_id: reminder.show_id,
                    episode_id: next.id,
                    remind_at,
                    chat_id: reminder.chat_id,
                };
                if insert_reminder_on(&mut *tx, &new_reminder)
                    .await
                    .map_err(unexpected)?
                {
                    armed = Some(new_reminder);
                }
            }
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(ChainOutcome::Advanced { next: armed })
    }
}
