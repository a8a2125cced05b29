//! services/bot/src/adapters/tvmaze.rs
//!
//! This module contains the adapter for the TVmaze show catalog.
//! It implements the `ShowSearchService` port from the `core` crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use episode_tracker_core::domain::{RemoteEpisode, ShowSearchResult};
use episode_tracker_core::ports::{PortError, PortResult, ShowSearchService};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct SearchHit {
    show: WireShow,
}

#[derive(Deserialize)]
struct WireShow {
    id: i64,
    name: String,
    premiered: Option<String>,
}

#[derive(Deserialize)]
struct WireEpisode {
    id: i64,
    season: u32,
    number: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    airdate: Option<String>,
    #[serde(default)]
    airtime: Option<String>,
    #[serde(default)]
    airstamp: Option<String>,
}

impl WireEpisode {
    fn to_domain(self) -> RemoteEpisode {
        let air_timestamp = self.airstamp.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| warn!("Ignoring unparsable airstamp '{}' on episode {}: {}", raw, self.id, e))
                .ok()
        });
        RemoteEpisode {
            id: self.id,
            season: self.season,
            number: self.number,
            title: self.name.unwrap_or_default(),
            air_date: self.airdate,
            air_time: self.airtime,
            air_timestamp,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ShowSearchService` against the TVmaze REST API.
#[derive(Clone)]
pub struct TvMazeAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl TvMazeAdapter {
    /// Creates a new `TvMazeAdapter` whose calls fail after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> PortResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(if status == reqwest::StatusCode::NOT_FOUND {
                PortError::NotFound(format!("{} returned {}", path, status))
            } else {
                PortError::Unexpected(format!("{} returned {}", path, status))
            });
        }
        response.json::<T>().await.map_err(map_http_error)
    }
}

fn map_http_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout(e.to_string())
    } else {
        PortError::Unexpected(e.to_string())
    }
}

//=========================================================================================
// `ShowSearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ShowSearchService for TvMazeAdapter {
    async fn search(&self, query: &str) -> PortResult<Vec<ShowSearchResult>> {
        let hits: Vec<SearchHit> = self.get_json("/search/shows", &[("q", query)]).await?;
        Ok(hits
            .into_iter()
            .map(|hit| ShowSearchResult {
                id: hit.show.id,
                name: hit.show.name,
                premiered: hit.show.premiered,
            })
            .collect())
    }

    async fn list_episodes(&self, show_id: i64) -> PortResult<Vec<RemoteEpisode>> {
        let episodes: Vec<WireEpisode> = self
            .get_json(&format!("/shows/{}/episodes", show_id), &[])
            .await?;
        Ok(episodes.into_iter().map(WireEpisode::to_domain).collect())
    }
}
