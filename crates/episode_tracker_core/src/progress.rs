//! crates/episode_tracker_core/src/progress.rs
//!
//! The decision taken after a user records an episode as watched. Both the
//! button flow and the free-text flow classify through [`ProgressOutcome::classify`].

use crate::domain::CachedEpisode;
use chrono::{DateTime, Utc};

/// What happens to the episode following the one just recorded as watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// There is no following episode; nothing to remind about.
    CaughtUp,
    /// The following episode airs in the future; a reminder is armed for `airs_at`.
    Scheduled {
        next: CachedEpisode,
        airs_at: DateTime<Utc>,
    },
    /// The following episode has already aired, or its air time is unknown.
    AlreadyAvailable { next: CachedEpisode },
}

impl ProgressOutcome {
    pub fn classify(next: Option<CachedEpisode>, now: DateTime<Utc>) -> Self {
        match next {
            None => ProgressOutcome::CaughtUp,
            Some(next) => match next.aired_at {
                Some(airs_at) if airs_at > now => ProgressOutcome::Scheduled { next, airs_at },
                _ => ProgressOutcome::AlreadyAvailable { next },
            },
        }
    }

    pub fn next_episode(&self) -> Option<&CachedEpisode> {
        match self {
            ProgressOutcome::CaughtUp => None,
            ProgressOutcome::Scheduled { next, .. } | ProgressOutcome::AlreadyAvailable { next } => {
                Some(next)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_PROVIDER;
    use chrono::Duration;

    fn episode(aired_at: Option<DateTime<Utc>>) -> CachedEpisode {
        CachedEpisode {
            id: 6,
            provider: DEFAULT_PROVIDER.into(),
            provider_show_id: "1".into(),
            provider_episode_id: "106".into(),
            season: 1,
            number: 6,
            title: "Six".into(),
            airdate: None,
            airtime: None,
            aired_at,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn no_following_episode_is_caught_up() {
        assert_eq!(ProgressOutcome::classify(None, Utc::now()), ProgressOutcome::CaughtUp);
    }

    #[test]
    fn future_air_time_schedules_a_reminder() {
        let now = Utc::now();
        let airs_at = now + Duration::days(3);
        let outcome = ProgressOutcome::classify(Some(episode(Some(airs_at))), now);
        assert!(matches!(outcome, ProgressOutcome::Scheduled { airs_at: at, .. } if at == airs_at));
    }

    #[test]
    fn past_or_unknown_air_time_is_available() {
        let now = Utc::now();
        assert!(matches!(
            ProgressOutcome::classify(Some(episode(None)), now),
            ProgressOutcome::AlreadyAvailable { .. }
        ));
        assert!(matches!(
            ProgressOutcome::classify(Some(episode(Some(now - Duration::hours(1)))), now),
            ProgressOutcome::AlreadyAvailable { .. }
        ));
        // Exactly now is not strictly in the future.
        assert!(matches!(
            ProgressOutcome::classify(Some(episode(Some(now))), now),
            ProgressOutcome::AlreadyAvailable { .. }
        ));
    }
}
