// cli-tools - command-line clients for self-hosted homelab services
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Sonarr series, calendar, download queue and missing episodes.

use crate::config::Endpoint;
use crate::error::Result;
use crate::format::{
    DESCRIPTION_LIMIT, format_bytes, format_bytes_f64, format_datetime, format_episode, truncate,
};
use crate::services::arr::{ArrApi, Page, QUEUE_PAGE_SIZE, calendar_window};
use crate::services::serde_helpers::null_default;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::services::arr::endpoint;

pub const DEFAULT_CALENDAR_DAYS: u32 = 7;
pub const DEFAULT_WANTED_LIMIT: u32 = 20;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSeries {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub overview: String,
    #[serde(deserialize_with = "null_default")]
    pub network: String,
    pub year: i64,
    pub season_count: i64,
    pub episode_count: i64,
    pub episode_file_count: i64,
    pub size_on_disk: u64,
    #[serde(deserialize_with = "null_default")]
    pub path: String,
    #[serde(deserialize_with = "null_default")]
    pub genres: Vec<String>,
    pub next_airing: Option<DateTime<Utc>>,
    /// Newer servers move the counters in here.
    pub statistics: Option<ApiStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiStatistics {
    pub season_count: i64,
    pub episode_count: i64,
    pub episode_file_count: i64,
    pub size_on_disk: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEpisode {
    pub id: i64,
    pub series_id: i64,
    pub season_number: i64,
    pub episode_number: i64,
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub air_date: String,
    pub air_date_utc: Option<DateTime<Utc>>,
    pub has_file: bool,
    /// Present on calendar entries requested with `includeSeries`.
    pub series: Option<ApiSeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiQueueItem {
    pub id: i64,
    pub series_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    pub size: f64,
    pub sizeleft: f64,
    #[serde(deserialize_with = "null_default")]
    pub timeleft: String,
    pub series: Option<ApiSeries>,
    pub episode: Option<ApiEpisode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiLookupResult {
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    pub year: i64,
    pub tvdb_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub network: String,
    pub season_count: i64,
    pub statistics: Option<ApiStatistics>,
}

// Display types

#[derive(Debug, Serialize)]
pub struct SeriesList {
    pub series: Vec<SeriesListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesListItem {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub status: String,
    pub network: String,
    pub seasons: i64,
    pub episodes: String,
    pub size: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_airing: String,
}

#[derive(Debug, Serialize)]
pub struct SeriesDetail {
    pub series: SeriesDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDetailItem {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub status: String,
    pub network: String,
    pub seasons: i64,
    pub episodes: String,
    pub size: String,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_airing: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub overview: String,
}

#[derive(Debug, Serialize)]
pub struct CalendarList {
    pub episodes: Vec<CalendarItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    pub series: String,
    pub episode: String,
    pub title: String,
    pub air_date: String,
    pub has_file: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueList {
    pub queue: Vec<QueueItem>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub series: String,
    pub episode: String,
    pub title: String,
    pub status: String,
    pub size: String,
    pub remaining: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub time_left: String,
}

#[derive(Debug, Serialize)]
pub struct WantedList {
    pub episodes: Vec<WantedItem>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedItem {
    pub series_id: i64,
    pub episode: String,
    pub title: String,
    pub air_date: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResultList {
    pub results: Vec<SearchResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub title: String,
    pub year: i64,
    pub tvdb_id: i64,
    pub network: String,
    pub seasons: i64,
}

impl ApiSeries {
    fn counters(&self) -> ApiStatistics {
        match &self.statistics {
            Some(stats) => stats.clone(),
            None => ApiStatistics {
                season_count: self.season_count,
                episode_count: self.episode_count,
                episode_file_count: self.episode_file_count,
                size_on_disk: self.size_on_disk,
            },
        }
    }

    pub fn to_list_item(&self) -> SeriesListItem {
        let stats = self.counters();
        SeriesListItem {
            id: self.id,
            title: self.title.clone(),
            year: self.year,
            status: self.status.clone(),
            network: self.network.clone(),
            seasons: stats.season_count,
            episodes: format!("{}/{}", stats.episode_file_count, stats.episode_count),
            size: format_bytes(stats.size_on_disk),
            next_airing: format_datetime(self.next_airing.as_ref(), TIME_FORMAT),
        }
    }

    pub fn to_detail(&self) -> SeriesDetailItem {
        let stats = self.counters();
        SeriesDetailItem {
            id: self.id,
            title: self.title.clone(),
            year: self.year,
            status: self.status.clone(),
            network: self.network.clone(),
            seasons: stats.season_count,
            episodes: format!("{}/{}", stats.episode_file_count, stats.episode_count),
            size: format_bytes(stats.size_on_disk),
            path: self.path.clone(),
            genres: self.genres.clone(),
            next_airing: format_datetime(self.next_airing.as_ref(), TIME_FORMAT),
            overview: truncate(&self.overview, DESCRIPTION_LIMIT),
        }
    }
}

impl ApiEpisode {
    pub fn to_calendar_item(&self) -> CalendarItem {
        CalendarItem {
            series: self
                .series
                .as_ref()
                .map(|s| s.title.clone())
                .unwrap_or_default(),
            episode: format_episode(self.season_number, self.episode_number),
            title: self.title.clone(),
            air_date: format_datetime(self.air_date_utc.as_ref(), TIME_FORMAT),
            has_file: self.has_file,
        }
    }

    pub fn to_wanted_item(&self) -> WantedItem {
        WantedItem {
            series_id: self.series_id,
            episode: format_episode(self.season_number, self.episode_number),
            title: self.title.clone(),
            air_date: self.air_date.clone(),
        }
    }
}

impl ApiQueueItem {
    pub fn to_list_item(&self) -> QueueItem {
        let (episode, title) = match &self.episode {
            Some(ep) => (
                format_episode(ep.season_number, ep.episode_number),
                ep.title.clone(),
            ),
            None => (String::new(), self.title.clone()),
        };
        QueueItem {
            series: self
                .series
                .as_ref()
                .map(|s| s.title.clone())
                .unwrap_or_default(),
            episode,
            title,
            status: self.status.clone(),
            size: format_bytes_f64(self.size),
            remaining: format_bytes_f64(self.sizeleft),
            time_left: self.timeleft.clone(),
        }
    }
}

impl ApiLookupResult {
    pub fn to_list_item(&self) -> SearchResultItem {
        SearchResultItem {
            title: self.title.clone(),
            year: self.year,
            tvdb_id: self.tvdb_id,
            network: self.network.clone(),
            seasons: self
                .statistics
                .as_ref()
                .map(|s| s.season_count)
                .unwrap_or(self.season_count),
        }
    }
}

#[derive(Debug)]
pub struct Client {
    api: ArrApi,
}

impl Client {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            api: ArrApi::new(endpoint)?,
        })
    }

    pub fn list_series(&self) -> Result<Vec<ApiSeries>> {
        self.api.get("/series")
    }

    pub fn get_series(&self, id: i64) -> Result<ApiSeries> {
        self.api.get(&format!("/series/{id}"))
    }

    /// Episodes airing in the next `days`, with their series embedded so the
    /// titles come from the same response.
    pub fn calendar(&self, now: DateTime<Utc>, days: u32) -> Result<Vec<ApiEpisode>> {
        let mut query = calendar_window(now, days);
        query.push(("includeSeries", "true".to_string()));
        self.api.get_with_query("/calendar", &query)
    }

    pub fn queue(&self) -> Result<Page<ApiQueueItem>> {
        self.api.get_with_query(
            "/queue",
            &[
                ("pageSize", QUEUE_PAGE_SIZE.to_string()),
                ("includeSeries", "true".to_string()),
                ("includeEpisode", "true".to_string()),
            ],
        )
    }

    pub fn wanted(&self, limit: u32) -> Result<Page<ApiEpisode>> {
        self.api.get_with_query(
            "/wanted/missing",
            &[
                ("pageSize", limit.to_string()),
                ("sortKey", "airDateUtc".to_string()),
                ("sortDirection", "descending".to_string()),
            ],
        )
    }

    pub fn search(&self, term: &str) -> Result<Vec<ApiLookupResult>> {
        self.api
            .get_with_query("/series/lookup", &[("term", term.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> Client {
        Client::new(endpoint(server.base_url(), "sonarr-key".into(), false).unwrap()).unwrap()
    }

    #[test]
    fn lists_series_from_either_counter_layout() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/series")
                .header("X-Api-Key", "sonarr-key");
            then.status(200).json_body(json!([
                {"id": 1, "title": "Severance", "year": 2022, "status": "continuing", "network": "Apple TV+",
                 "statistics": {"seasonCount": 2, "episodeCount": 19, "episodeFileCount": 12, "sizeOnDisk": 1073741824u64},
                 "nextAiring": "2025-01-17T02:00:00Z"},
                {"id": 2, "title": "Firefly", "year": 2002, "status": "ended", "network": null,
                 "seasonCount": 1, "episodeCount": 14, "episodeFileCount": 14, "sizeOnDisk": 0}
            ]));
        });

        let items: Vec<SeriesListItem> = client(&server)
            .list_series()
            .unwrap()
            .iter()
            .map(ApiSeries::to_list_item)
            .collect();
        mock.assert();
        assert_eq!(items[0].episodes, "12/19");
        assert_eq!(items[0].size, "1.0 GB");
        assert!(!items[0].next_airing.is_empty());
        assert_eq!(items[1].episodes, "14/14");
        assert_eq!(items[1].network, "");
        assert_eq!(items[1].next_airing, "");
    }

    #[test]
    fn calendar_embeds_series_titles() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/calendar")
                .query_param("start", "2024-02-27T12:00:00Z")
                .query_param("end", "2024-03-05T12:00:00Z")
                .query_param("includeSeries", "true");
            then.status(200).json_body(json!([
                {"seriesId": 1, "seasonNumber": 2, "episodeNumber": 3, "title": "Who Is Alive?",
                 "airDateUtc": "2024-03-01T02:00:00Z", "hasFile": false, "series": {"id": 1, "title": "Severance"}}
            ]));
        });

        let now = DateTime::parse_from_rfc3339("2024-02-27T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let entries = client(&server).calendar(now, 7).unwrap();
        mock.assert();
        let item = entries[0].to_calendar_item();
        assert_eq!(item.series, "Severance");
        assert_eq!(item.episode, "S02E03");
        assert!(!item.has_file);
    }

    #[test]
    fn queue_and_wanted_pages() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/queue")
                .query_param("pageSize", "100");
            then.status(200).json_body(json!({
                "page": 1, "pageSize": 100, "totalRecords": 1,
                "records": [{"title": "Severance.S02E03.1080p", "status": "downloading",
                    "size": 2147483648.0, "sizeleft": 1073741824.0, "timeleft": "00:12:00",
                    "series": {"title": "Severance"},
                    "episode": {"seasonNumber": 2, "episodeNumber": 3, "title": "Who Is Alive?"}}]
            }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/wanted/missing")
                .query_param("pageSize", "5")
                .query_param("sortKey", "airDateUtc");
            then.status(200).json_body(json!({
                "totalRecords": 42,
                "records": [{"seriesId": 7, "seasonNumber": 1, "episodeNumber": 9, "title": "Pilot", "airDate": "2019-05-01"}]
            }));
        });

        let client = client(&server);
        let queue = client.queue().unwrap();
        let item = queue.records[0].to_list_item();
        assert_eq!(item.series, "Severance");
        assert_eq!(item.episode, "S02E03");
        assert_eq!(item.size, "2.0 GB");
        assert_eq!(item.remaining, "1.0 GB");

        let wanted = client.wanted(5).unwrap();
        assert_eq!(wanted.total_records, 42);
        let item = wanted.records[0].to_wanted_item();
        assert_eq!(item.series_id, 7);
        assert_eq!(item.episode, "S01E09");
        assert_eq!(item.air_date, "2019-05-01");
    }

    #[test]
    fn detail_truncates_overview() {
        let series = ApiSeries {
            title: "Long".into(),
            overview: "o".repeat(900),
            ..Default::default()
        };
        let detail = series.to_detail();
        assert_eq!(detail.overview.chars().count(), 500);
        assert!(detail.genres.is_empty());
    }

    #[test]
    fn search_looks_up_term() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/series/lookup")
                .query_param("term", "the expanse");
            then.status(200).json_body(json!([
                {"title": "The Expanse", "year": 2015, "tvdbId": 280619, "network": "Prime Video", "seasonCount": 6}
            ]));
        });

        let results = client(&server).search("the expanse").unwrap();
        let item = results[0].to_list_item();
        assert_eq!(item.tvdb_id, 280619);
        assert_eq!(item.seasons, 6);
    }

    #[test]
    fn bad_api_key_is_auth_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/series/5");
            then.status(401);
        });

        let err = client(&server).get_series(5).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
