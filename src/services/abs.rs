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

//! Audiobookshelf libraries, books and listening progress.

use crate::client::{ApiClient, Auth};
use crate::config::Endpoint;
use crate::error::{CliError, Result};
use crate::format::{
    DESCRIPTION_LIMIT, format_bytes, format_duration, format_percent, format_time_position,
    format_unix_millis, truncate,
};
use crate::services::serde_helpers::null_default;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LIMIT: u32 = 50;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiLibrary {
    pub id: String,
    pub name: String,
    pub media_type: String,
    #[serde(deserialize_with = "null_default")]
    pub folders: Vec<ApiFolder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiFolder {
    pub id: String,
    pub full_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LibrariesResponse {
    libraries: Vec<ApiLibrary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemsPage {
    #[serde(deserialize_with = "null_default")]
    pub results: Vec<ApiLibraryItem>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiLibraryItem {
    pub id: String,
    pub library_id: String,
    pub media: ApiMedia,
    pub size: u64,
    pub added_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiMedia {
    pub metadata: ApiMetadata,
    pub duration: f64,
    pub num_chapters: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiMetadata {
    #[serde(deserialize_with = "null_default")]
    pub title: String,
    #[serde(deserialize_with = "null_default")]
    pub subtitle: String,
    #[serde(deserialize_with = "null_default")]
    pub author_name: String,
    #[serde(deserialize_with = "null_default")]
    pub authors: Vec<ApiAuthor>,
    #[serde(deserialize_with = "null_default")]
    pub narrators: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub series_name: String,
    #[serde(deserialize_with = "null_default")]
    pub published_year: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiAuthor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MeResponse {
    #[serde(deserialize_with = "null_default")]
    media_progress: Vec<ApiMediaProgress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiMediaProgress {
    pub library_item_id: String,
    pub duration: f64,
    pub progress: f64,
    pub current_time: f64,
    pub is_finished: bool,
    pub last_update: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiSearchResponse {
    #[serde(deserialize_with = "null_default")]
    pub book: Vec<ApiSearchHit>,
    #[serde(deserialize_with = "null_default")]
    pub authors: Vec<ApiAuthor>,
    #[serde(deserialize_with = "null_default")]
    pub series: Vec<ApiSeriesHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSearchHit {
    pub library_item: ApiLibraryItem,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiSeriesHit {
    pub series: ApiSeriesInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiSeriesInfo {
    pub id: String,
    pub name: String,
}

// Display types

#[derive(Debug, Serialize)]
pub struct LibraryList {
    pub libraries: Vec<LibraryListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryListItem {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub folders: usize,
}

#[derive(Debug, Serialize)]
pub struct BookList {
    pub books: Vec<BookListItem>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct BookListItem {
    pub id: String,
    pub title: String,
    pub author: String,
    pub duration: String,
    pub size: String,
}

#[derive(Debug, Serialize)]
pub struct BookDetail {
    pub book: BookDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetailItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    pub author: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub narrators: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub series: String,
    pub duration: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub chapters: u32,
    pub size: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub published_year: String,
    pub added_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Debug, Serialize)]
pub struct ProgressList {
    pub progress: Vec<ProgressListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressListItem {
    pub library_item_id: String,
    pub progress: String,
    pub current_time: String,
    pub duration: String,
    pub is_finished: bool,
    pub last_update: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SearchResults {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub books: Vec<BookListItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<String>,
}

impl ApiLibrary {
    pub fn to_list_item(&self) -> LibraryListItem {
        LibraryListItem {
            id: self.id.clone(),
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            folders: self.folders.len(),
        }
    }
}

impl ApiMetadata {
    /// Display author: the joined name, else the first listed author.
    pub fn author(&self) -> String {
        if !self.author_name.is_empty() {
            return self.author_name.clone();
        }
        self.authors
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "-".to_string())
    }
}

impl ApiLibraryItem {
    pub fn to_list_item(&self) -> BookListItem {
        BookListItem {
            id: self.id.clone(),
            title: self.media.metadata.title.clone(),
            author: self.media.metadata.author(),
            duration: format_duration(self.media.duration),
            size: format_bytes(self.size),
        }
    }

    pub fn to_detail(&self) -> BookDetailItem {
        let meta = &self.media.metadata;
        BookDetailItem {
            id: self.id.clone(),
            title: meta.title.clone(),
            subtitle: meta.subtitle.clone(),
            author: meta.author(),
            narrators: meta.narrators.clone(),
            series: meta.series_name.clone(),
            duration: format_duration(self.media.duration),
            chapters: self.media.num_chapters,
            size: format_bytes(self.size),
            published_year: meta.published_year.clone(),
            added_at: format_unix_millis(self.added_at, TIME_FORMAT),
            description: truncate(&meta.description, DESCRIPTION_LIMIT),
        }
    }
}

impl ApiMediaProgress {
    pub fn in_progress(&self) -> bool {
        !self.is_finished && self.progress > 0.0
    }

    pub fn to_list_item(&self) -> ProgressListItem {
        ProgressListItem {
            library_item_id: self.library_item_id.clone(),
            progress: format_percent(self.progress),
            current_time: format_time_position(self.current_time),
            duration: format_duration(self.duration),
            is_finished: self.is_finished,
            last_update: format_unix_millis(self.last_update, TIME_FORMAT),
        }
    }
}

impl ApiSearchResponse {
    pub fn to_results(&self) -> SearchResults {
        SearchResults {
            books: self
                .book
                .iter()
                .map(|hit| hit.library_item.to_list_item())
                .collect(),
            authors: self.authors.iter().map(|a| a.name.clone()).collect(),
            series: self.series.iter().map(|s| s.series.name.clone()).collect(),
        }
    }
}

pub fn endpoint(url: String, token: String, insecure: bool) -> Result<Endpoint> {
    Endpoint::new(url, Auth::Bearer(token), insecure)
}

#[derive(Debug)]
pub struct Client {
    api: ApiClient,
}

impl Client {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let api = ApiClient::new(endpoint, TIMEOUT)?.with_header(CONTENT_TYPE, "application/json");
        Ok(Self { api })
    }

    pub fn list_libraries(&self) -> Result<Vec<ApiLibrary>> {
        let response: LibrariesResponse = self.api.get("/api/libraries")?;
        Ok(response.libraries)
    }

    /// The explicit library, or the first one the server lists.
    pub fn library_or_default(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(id) = explicit.filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        self.list_libraries()?
            .into_iter()
            .next()
            .map(|lib| lib.id)
            .ok_or_else(|| CliError::not_found("no libraries found"))
    }

    pub fn list_items(&self, library_id: &str, limit: u32) -> Result<ItemsPage> {
        self.api.get_with_query(
            &format!("/api/libraries/{library_id}/items"),
            &[
                ("limit", limit.to_string()),
                ("sort", "media.metadata.title".to_string()),
            ],
        )
    }

    pub fn get_item(&self, item_id: &str) -> Result<ApiLibraryItem> {
        self.api.get(&format!("/api/items/{item_id}"))
    }

    pub fn in_progress(&self) -> Result<ProgressList> {
        let me: MeResponse = self.api.get("/api/me")?;
        Ok(ProgressList {
            progress: me
                .media_progress
                .iter()
                .filter(|p| p.in_progress())
                .map(ApiMediaProgress::to_list_item)
                .collect(),
        })
    }

    pub fn search(&self, library_id: &str, query: &str) -> Result<ApiSearchResponse> {
        self.api.get_with_query(
            &format!("/api/libraries/{library_id}/search"),
            &[("q", query.to_string())],
        )
    }

    pub fn scan_library(&self, library_id: &str) -> Result<()> {
        self.api.post_unit(&format!("/api/libraries/{library_id}/scan"))
    }

    /// Scans every library in listing order, reporting each one as it starts.
    /// Stops at the first library that fails.
    pub fn scan_all(&self, mut started: impl FnMut(&ApiLibrary)) -> Result<()> {
        for library in self.list_libraries()? {
            self.scan_library(&library.id)?;
            started(&library);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> Client {
        Client::new(endpoint(server.base_url(), "abs-token".into(), false).unwrap()).unwrap()
    }

    fn libraries(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/libraries")
                .header("authorization", "Bearer abs-token");
            then.status(200).json_body(json!({"libraries": [
                {"id": "lib1", "name": "Audiobooks", "mediaType": "book", "folders": [{"id": "f1", "fullPath": "/audiobooks"}]},
                {"id": "lib2", "name": "Podcasts", "mediaType": "podcast", "folders": []}
            ]}));
        })
    }

    #[test]
    fn default_library_is_first_listed() {
        let server = MockServer::start();
        let mock = libraries(&server);

        let client = client(&server);
        assert_eq!(client.library_or_default(None).unwrap(), "lib1");
        assert_eq!(client.library_or_default(Some("lib9")).unwrap(), "lib9");
        mock.assert_hits(1);
    }

    #[test]
    fn no_libraries_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/libraries");
            then.status(200).json_body(json!({"libraries": []}));
        });

        let err = client(&server).library_or_default(None).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "no libraries found");
    }

    #[test]
    fn lists_books_sorted_by_title() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/libraries/lib1/items")
                .query_param("limit", "5")
                .query_param("sort", "media.metadata.title");
            then.status(200).json_body(json!({
                "results": [{
                    "id": "li_1",
                    "size": 1610612736u64,
                    "media": {"duration": 45000.0, "metadata": {"title": "Dune", "authors": [{"id": "a1", "name": "Frank Herbert"}]}}
                }],
                "total": 120
            }));
        });

        let page = client(&server).list_items("lib1", 5).unwrap();
        mock.assert();
        assert_eq!(page.total, 120);
        let book = page.results[0].to_list_item();
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.duration, "12h 30m");
        assert_eq!(book.size, "1.5 GB");
    }

    #[test]
    fn book_detail_omits_empty_fields_and_truncates() {
        let item: ApiLibraryItem = serde_json::from_value(json!({
            "id": "li_2",
            "addedAt": 0,
            "media": {"duration": 600, "numChapters": 0, "metadata": {
                "title": "Short", "authorName": null, "narrators": null,
                "description": "x".repeat(800)
            }}
        }))
        .unwrap();

        let detail = item.to_detail();
        assert_eq!(detail.author, "-");
        assert_eq!(detail.added_at, "-");
        assert_eq!(detail.description.chars().count(), 500);

        let yaml = serde_yaml::to_string(&BookDetail { book: detail }).unwrap();
        assert!(!yaml.contains("narrators"));
        assert!(!yaml.contains("chapters"));
        assert!(!yaml.contains("subtitle"));
    }

    #[test]
    fn progress_keeps_only_started_unfinished_items() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/me");
            then.status(200).json_body(json!({"mediaProgress": [
                {"libraryItemId": "a", "progress": 0.25, "currentTime": 3723.0, "duration": 14892.0, "isFinished": false, "lastUpdate": 1700000000000i64},
                {"libraryItemId": "b", "progress": 1.0, "isFinished": true},
                {"libraryItemId": "c", "progress": 0.0, "isFinished": false}
            ]}));
        });

        let list = client(&server).in_progress().unwrap();
        assert_eq!(list.progress.len(), 1);
        let item = &list.progress[0];
        assert_eq!(item.library_item_id, "a");
        assert_eq!(item.progress, "25%");
        assert_eq!(item.current_time, "1:02:03");
        assert_eq!(item.duration, "4h 8m");
    }

    #[test]
    fn search_flattens_authors_and_series() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/libraries/lib1/search")
                .query_param("q", "the expanse");
            then.status(200).json_body(json!({
                "book": [{"libraryItem": {"id": "li_9", "media": {"metadata": {"title": "Leviathan Wakes", "authorName": "James S. A. Corey"}}}}],
                "authors": [{"id": "au1", "name": "James S. A. Corey"}],
                "series": [{"series": {"id": "se1", "name": "The Expanse"}}]
            }));
        });

        let results = client(&server).search("lib1", "the expanse").unwrap().to_results();
        assert_eq!(results.books[0].title, "Leviathan Wakes");
        assert_eq!(results.authors, vec!["James S. A. Corey"]);
        assert_eq!(results.series, vec!["The Expanse"]);
    }

    #[test]
    fn scan_all_stops_at_first_failure() {
        let server = MockServer::start();
        libraries(&server);
        server.mock(|when, then| {
            when.method(POST).path("/api/libraries/lib1/scan");
            then.status(500);
        });
        let second = server.mock(|when, then| {
            when.method(POST).path("/api/libraries/lib2/scan");
            then.status(200);
        });

        let mut started = Vec::new();
        let err = client(&server)
            .scan_all(|lib| started.push(lib.id.clone()))
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(started.is_empty());
        second.assert_hits(0);
    }

    #[test]
    fn scan_all_reports_each_library() {
        let server = MockServer::start();
        libraries(&server);
        for id in ["lib1", "lib2"] {
            server.mock(|when, then| {
                when.method(POST).path(format!("/api/libraries/{id}/scan"));
                then.status(200);
            });
        }

        let mut started = Vec::new();
        client(&server)
            .scan_all(|lib| started.push(lib.name.clone()))
            .unwrap();
        assert_eq!(started, vec!["Audiobooks", "Podcasts"]);
    }
}
