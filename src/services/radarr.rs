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

//! Radarr movies, release calendar, download queue and missing movies.

use crate::config::Endpoint;
use crate::error::Result;
use crate::format::{
    DESCRIPTION_LIMIT, format_bytes, format_bytes_f64, format_datetime, format_runtime, truncate,
};
use crate::services::arr::{ArrApi, Page, QUEUE_PAGE_SIZE, calendar_window};
use crate::services::serde_helpers::null_default;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::services::arr::endpoint;

pub const DEFAULT_CALENDAR_DAYS: u32 = 30;
pub const DEFAULT_WANTED_LIMIT: u32 = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiMovie {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub overview: String,
    pub year: i64,
    pub runtime: u64,
    #[serde(deserialize_with = "null_default")]
    pub path: String,
    pub size_on_disk: u64,
    #[serde(deserialize_with = "null_default")]
    pub genres: Vec<String>,
    pub has_file: bool,
    pub monitored: bool,
    pub in_cinemas: Option<DateTime<Utc>>,
    pub physical_release: Option<DateTime<Utc>>,
    pub digital_release: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_default")]
    pub studio: String,
    pub tmdb_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub imdb_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiQueueItem {
    pub id: i64,
    pub movie_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    pub size: f64,
    pub sizeleft: f64,
    #[serde(deserialize_with = "null_default")]
    pub timeleft: String,
    pub movie: Option<ApiMovie>,
}

// Display types

#[derive(Debug, Serialize)]
pub struct MovieList {
    pub movies: Vec<MovieListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieListItem {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub status: String,
    pub has_file: bool,
    pub size: String,
    pub runtime: String,
}

#[derive(Debug, Serialize)]
pub struct MovieDetail {
    pub movie: MovieDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetailItem {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub status: String,
    pub has_file: bool,
    pub size: String,
    pub runtime: String,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub studio: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub imdb_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub in_cinemas: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub physical_release: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub overview: String,
}

#[derive(Debug, Serialize)]
pub struct CalendarList {
    pub movies: Vec<CalendarItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    pub title: String,
    pub year: i64,
    pub release_date: String,
    pub release_type: String,
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
    pub title: String,
    pub year: i64,
    pub status: String,
    pub size: String,
    pub remaining: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub time_left: String,
}

#[derive(Debug, Serialize)]
pub struct WantedList {
    pub movies: Vec<WantedItem>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct WantedItem {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub status: String,
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
    pub tmdb_id: i64,
    pub runtime: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub studio: String,
}

impl ApiMovie {
    pub fn to_list_item(&self) -> MovieListItem {
        MovieListItem {
            id: self.id,
            title: self.title.clone(),
            year: self.year,
            status: self.status.clone(),
            has_file: self.has_file,
            size: format_bytes(self.size_on_disk),
            runtime: format_runtime(self.runtime),
        }
    }

    pub fn to_detail(&self) -> MovieDetailItem {
        MovieDetailItem {
            id: self.id,
            title: self.title.clone(),
            year: self.year,
            status: self.status.clone(),
            has_file: self.has_file,
            size: format_bytes(self.size_on_disk),
            runtime: format_runtime(self.runtime),
            path: self.path.clone(),
            genres: self.genres.clone(),
            studio: self.studio.clone(),
            imdb_id: self.imdb_id.clone(),
            in_cinemas: format_datetime(self.in_cinemas.as_ref(), DATE_FORMAT),
            physical_release: format_datetime(self.physical_release.as_ref(), DATE_FORMAT),
            overview: truncate(&self.overview, DESCRIPTION_LIMIT),
        }
    }

    /// Digital beats physical beats cinema.
    pub fn to_calendar_item(&self) -> CalendarItem {
        let release = [
            (self.digital_release.as_ref(), "digital"),
            (self.physical_release.as_ref(), "physical"),
            (self.in_cinemas.as_ref(), "cinema"),
        ]
        .into_iter()
        .find(|(date, _)| date.is_some());
        let (release_date, release_type) = match release {
            Some((date, kind)) => (format_datetime(date, DATE_FORMAT), kind.to_string()),
            None => (String::new(), String::new()),
        };
        CalendarItem {
            title: self.title.clone(),
            year: self.year,
            release_date,
            release_type,
            has_file: self.has_file,
        }
    }

    pub fn to_wanted_item(&self) -> WantedItem {
        WantedItem {
            id: self.id,
            title: self.title.clone(),
            year: self.year,
            status: self.status.clone(),
        }
    }

    /// Lookup results are not in the library yet, so only the catalog fields apply.
    pub fn to_search_item(&self) -> SearchResultItem {
        SearchResultItem {
            title: self.title.clone(),
            year: self.year,
            tmdb_id: self.tmdb_id,
            runtime: format_runtime(self.runtime),
            studio: self.studio.clone(),
        }
    }
}

impl ApiQueueItem {
    pub fn to_list_item(&self) -> QueueItem {
        let (title, year) = match &self.movie {
            Some(movie) => (movie.title.clone(), movie.year),
            None => (self.title.clone(), 0),
        };
        QueueItem {
            title,
            year,
            status: self.status.clone(),
            size: format_bytes_f64(self.size),
            remaining: format_bytes_f64(self.sizeleft),
            time_left: self.timeleft.clone(),
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

    pub fn list_movies(&self) -> Result<Vec<ApiMovie>> {
        self.api.get("/movie")
    }

    pub fn get_movie(&self, id: i64) -> Result<ApiMovie> {
        self.api.get(&format!("/movie/{id}"))
    }

    pub fn calendar(&self, now: DateTime<Utc>, days: u32) -> Result<Vec<ApiMovie>> {
        self.api
            .get_with_query("/calendar", &calendar_window(now, days))
    }

    pub fn queue(&self) -> Result<Page<ApiQueueItem>> {
        self.api.get_with_query(
            "/queue",
            &[
                ("pageSize", QUEUE_PAGE_SIZE.to_string()),
                ("includeMovie", "true".to_string()),
            ],
        )
    }

    pub fn wanted(&self, limit: u32) -> Result<Page<ApiMovie>> {
        self.api.get_with_query(
            "/wanted/missing",
            &[
                ("pageSize", limit.to_string()),
                ("sortKey", "digitalRelease".to_string()),
                ("sortDirection", "descending".to_string()),
            ],
        )
    }

    pub fn search(&self, term: &str) -> Result<Vec<ApiMovie>> {
        self.api
            .get_with_query("/movie/lookup", &[("term", term.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> Client {
        Client::new(endpoint(server.base_url(), "radarr-key".into(), false).unwrap()).unwrap()
    }

    #[test]
    fn lists_movies_with_runtime_and_size() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/movie")
                .header("X-Api-Key", "radarr-key");
            then.status(200).json_body(json!([
                {"id": 3, "title": "Arrival", "year": 2016, "status": "released", "hasFile": true,
                 "runtime": 116, "sizeOnDisk": 5368709120u64},
                {"id": 4, "title": "Dune: Part Three", "year": 2026, "status": "announced",
                 "hasFile": false, "runtime": 0, "sizeOnDisk": 0, "studio": null}
            ]));
        });

        let movies: Vec<MovieListItem> = client(&server)
            .list_movies()
            .unwrap()
            .iter()
            .map(ApiMovie::to_list_item)
            .collect();
        mock.assert();
        assert_eq!(movies[0].runtime, "1h 56m");
        assert_eq!(movies[0].size, "5.0 GB");
        assert_eq!(movies[1].runtime, "-");
        assert_eq!(movies[1].size, "0 B");
    }

    #[test]
    fn calendar_prefers_digital_then_physical_then_cinema() {
        let movie: ApiMovie = serde_json::from_value(json!({
            "title": "Arrival", "year": 2016,
            "inCinemas": "2016-11-11T00:00:00Z",
            "physicalRelease": "2017-02-14T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(movie.to_calendar_item().release_type, "physical");

        let digital = ApiMovie {
            digital_release: movie.in_cinemas,
            ..movie.clone()
        };
        assert_eq!(digital.to_calendar_item().release_type, "digital");

        let unscheduled = ApiMovie::default().to_calendar_item();
        assert_eq!(unscheduled.release_type, "");
        assert_eq!(unscheduled.release_date, "");
    }

    #[test]
    fn calendar_requests_window() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/calendar")
                .query_param("start", "2025-01-01T00:00:00Z")
                .query_param("end", "2025-01-31T00:00:00Z");
            then.status(200).json_body(json!([]));
        });

        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let movies = client(&server).calendar(now, 30).unwrap();
        mock.assert();
        assert!(movies.is_empty());
    }

    #[test]
    fn queue_uses_embedded_movie() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/queue")
                .query_param("includeMovie", "true");
            then.status(200).json_body(json!({
                "totalRecords": 2,
                "records": [
                    {"title": "Arrival.2016.2160p", "status": "downloading", "size": 1024.0, "sizeleft": 512.0,
                     "timeleft": "", "movie": {"title": "Arrival", "year": 2016}},
                    {"title": "Unknown.Release", "status": "queued", "size": 0, "sizeleft": 0}
                ]
            }));
        });

        let page = client(&server).queue().unwrap();
        assert_eq!(page.total_records, 2);
        let first = page.records[0].to_list_item();
        assert_eq!(first.title, "Arrival");
        assert_eq!(first.year, 2016);
        assert_eq!(first.remaining, "512 B");
        assert_eq!(page.records[1].to_list_item().title, "Unknown.Release");
    }

    #[test]
    fn missing_movie_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/movie/99");
            then.status(404);
        });

        let err = client(&server).get_movie(99).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn wanted_sorts_by_digital_release() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/wanted/missing")
                .query_param("pageSize", "20")
                .query_param("sortKey", "digitalRelease")
                .query_param("sortDirection", "descending");
            then.status(200).json_body(json!({
                "totalRecords": 1,
                "records": [{"id": 8, "title": "Heat", "year": 1995, "status": "released"}]
            }));
        });

        let page = client(&server).wanted(DEFAULT_WANTED_LIMIT).unwrap();
        mock.assert();
        assert_eq!(page.records[0].to_wanted_item().title, "Heat");
    }
}
