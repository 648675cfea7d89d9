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

//! Plumbing shared by the Sonarr and Radarr adapters: both speak the same
//! v3 API dialect with an `X-Api-Key` header and paged record envelopes.

use crate::client::{ApiClient, Auth};
use crate::config::Endpoint;
use crate::error::Result;
use crate::services::serde_helpers::null_default;
use chrono::{DateTime, Days, SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(30);
pub const QUEUE_PAGE_SIZE: u32 = 100;

const API_PREFIX: &str = "/api/v3";

#[derive(Debug, Default, Deserialize)]
#[serde(
    rename_all = "camelCase",
    default,
    bound(deserialize = "T: Deserialize<'de> + Default")
)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    pub total_records: u64,
    #[serde(deserialize_with = "null_default")]
    pub records: Vec<T>,
}

pub fn endpoint(url: String, api_key: String, insecure: bool) -> Result<Endpoint> {
    Endpoint::new(
        url,
        Auth::ApiKey {
            header: "X-Api-Key",
            key: api_key,
        },
        insecure,
    )
}

/// `start`/`end` query pair covering `days` from `now`.
pub fn calendar_window(now: DateTime<Utc>, days: u32) -> Vec<(&'static str, String)> {
    let end = now
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(now);
    vec![
        ("start", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
    ]
}

#[derive(Debug)]
pub struct ArrApi {
    api: ApiClient,
}

impl ArrApi {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let api = ApiClient::new(endpoint, TIMEOUT)?.with_header(CONTENT_TYPE, "application/json");
        Ok(Self { api })
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.api.get(&format!("{API_PREFIX}{path}"))
    }

    pub fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.api
            .get_with_query(&format!("{API_PREFIX}{path}"), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_spans_requested_days() {
        let now = Utc.with_ymd_and_hms(2024, 2, 27, 12, 0, 0).unwrap();
        let window = calendar_window(now, 7);
        assert_eq!(window[0], ("start", "2024-02-27T12:00:00Z".to_string()));
        assert_eq!(window[1], ("end", "2024-03-05T12:00:00Z".to_string()));
    }

    #[test]
    fn page_tolerates_null_records() {
        let page: Page<serde_json::Value> =
            serde_json::from_str(r#"{"page":1,"pageSize":20,"totalRecords":0,"records":null}"#)
                .unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.page_size, 20);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct Record {
        title: String,
        sizeleft: f64,
    }

    #[test]
    fn page_decodes_typed_records() {
        let page: Page<Record> = serde_json::from_str(
            r#"{"page":2,"pageSize":100,"totalRecords":101,
                "records":[{"title":"Arrival.2016","sizeleft":512.0},{"title":"Heat.1995"}]}"#,
        )
        .unwrap();
        assert_eq!(page.total_records, 101);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].title, "Arrival.2016");
        assert_eq!(page.records[0].sizeleft, 512.0);
    }
}
