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

//! Transmission daemon over its JSON-RPC endpoint.

use crate::client::{ApiClient, Auth};
use crate::config::Endpoint;
use crate::error::{CliError, Result};
use crate::format::{
    format_bytes, format_eta, format_percent, format_ratio, format_speed, format_unix_seconds,
    label,
};
use crate::session::{SessionRpc, TRANSMISSION_SESSION_HEADER};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(10);
pub const RPC_PATH: &str = "/transmission/rpc";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LIST_FIELDS: &[&str] = &[
    "id",
    "name",
    "status",
    "percentDone",
    "totalSize",
    "sizeWhenDone",
    "uploadRatio",
    "rateDownload",
    "rateUpload",
    "eta",
    "peersConnected",
    "trackers",
];

const DETAIL_FIELDS: &[&str] = &[
    "downloadedEver",
    "uploadedEver",
    "addedDate",
    "doneDate",
    "downloadDir",
];

const STATUS_LABELS: &[(i64, &str)] = &[
    (0, "stopped"),
    (1, "verifying"),
    (2, "verifying"),
    (3, "downloading"),
    (4, "downloading"),
    (5, "seeding"),
    (6, "seeding"),
];

// Wire types

#[derive(Debug, Serialize)]
struct RpcRequest<'a, A> {
    method: &'a str,
    arguments: A,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct TorrentGetArgs<'a> {
    fields: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<[i64; 1]>,
}

#[derive(Debug, Serialize)]
struct TorrentIds {
    ids: [i64; 1],
}

#[derive(Debug, Default, Serialize)]
struct TorrentAddArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metainfo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TorrentGetResponse {
    #[serde(default)]
    torrents: Vec<ApiTorrent>,
}

#[derive(Debug, Deserialize)]
struct TorrentAddResponse {
    #[serde(rename = "torrent-added")]
    added: Option<AddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    duplicate: Option<AddedTorrent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddedTorrent {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiTorrent {
    pub id: i64,
    pub name: String,
    pub status: i64,
    pub percent_done: f64,
    pub total_size: u64,
    pub size_when_done: u64,
    pub upload_ratio: f64,
    pub rate_download: u64,
    pub rate_upload: u64,
    pub eta: i64,
    pub peers_connected: i64,
    pub trackers: Vec<ApiTracker>,
    pub downloaded_ever: u64,
    pub uploaded_ever: u64,
    pub added_date: i64,
    pub done_date: i64,
    pub download_dir: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTracker {
    #[serde(default)]
    pub announce: String,
}

/// Which torrents a listing keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Downloading,
    Seeding,
    Stopped,
}

impl Filter {
    pub fn matches(self, torrent: &ApiTorrent) -> bool {
        match self {
            Filter::All => true,
            Filter::Downloading => matches!(torrent.status, 3 | 4),
            Filter::Seeding => matches!(torrent.status, 5 | 6),
            Filter::Stopped => torrent.status == 0,
        }
    }
}

// Display types

#[derive(Debug, Serialize)]
pub struct TorrentList {
    pub torrents: Vec<TorrentListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentListItem {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub percent_done: String,
    pub total_size: String,
    pub upload_ratio: String,
    pub rate_download: String,
    pub rate_upload: String,
    pub eta: String,
    pub tracker: String,
    pub peers_connected: i64,
}

#[derive(Debug, Serialize)]
pub struct TorrentDetail {
    pub torrent: TorrentDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentDetailItem {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub percent_done: String,
    pub total_size: String,
    pub downloaded_ever: String,
    pub uploaded_ever: String,
    pub upload_ratio: String,
    pub rate_download: String,
    pub rate_upload: String,
    pub eta: String,
    pub tracker: String,
    pub peers_connected: i64,
    pub added_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_date: Option<String>,
    pub download_dir: String,
}

#[derive(Debug, Serialize)]
pub struct Added {
    pub added: AddedTorrent,
}

impl ApiTorrent {
    pub fn status_label(&self) -> &'static str {
        label(self.status, STATUS_LABELS)
    }

    /// Host of the first tracker's announce URL, `-` when there is none.
    pub fn tracker_host(&self) -> String {
        self.trackers
            .first()
            .and_then(|tracker| Url::parse(&tracker.announce).ok())
            .and_then(|url| {
                let host = url.host_str()?.to_string();
                Some(match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                })
            })
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn to_list_item(&self) -> TorrentListItem {
        TorrentListItem {
            id: self.id,
            name: self.name.clone(),
            status: self.status_label().to_string(),
            percent_done: format_percent(self.percent_done),
            total_size: format_bytes(self.total_size),
            upload_ratio: format_ratio(self.upload_ratio),
            rate_download: format_speed(self.rate_download),
            rate_upload: format_speed(self.rate_upload),
            eta: format_eta(self.eta),
            tracker: self.tracker_host(),
            peers_connected: self.peers_connected,
        }
    }

    pub fn to_detail(&self) -> TorrentDetailItem {
        TorrentDetailItem {
            id: self.id,
            name: self.name.clone(),
            status: self.status_label().to_string(),
            percent_done: format_percent(self.percent_done),
            total_size: format_bytes(self.total_size),
            downloaded_ever: format_bytes(self.downloaded_ever),
            uploaded_ever: format_bytes(self.uploaded_ever),
            upload_ratio: format_ratio(self.upload_ratio),
            rate_download: format_speed(self.rate_download),
            rate_upload: format_speed(self.rate_upload),
            eta: format_eta(self.eta),
            tracker: self.tracker_host(),
            peers_connected: self.peers_connected,
            added_date: format_unix_seconds(self.added_date, TIME_FORMAT),
            done_date: (self.done_date > 0)
                .then(|| format_unix_seconds(self.done_date, TIME_FORMAT)),
            download_dir: self.download_dir.clone(),
        }
    }
}

pub fn torrent_list(torrents: &[ApiTorrent], filter: Filter) -> TorrentList {
    TorrentList {
        torrents: torrents
            .iter()
            .filter(|torrent| filter.matches(torrent))
            .map(ApiTorrent::to_list_item)
            .collect(),
    }
}

/// Basic auth is only sent when a user name is configured.
pub fn endpoint(
    url: String,
    user: Option<String>,
    pass: Option<String>,
    insecure: bool,
) -> Result<Endpoint> {
    let auth = match user {
        Some(username) => Auth::Basic {
            username,
            password: pass,
        },
        None => Auth::None,
    };
    Endpoint::new(url, auth, insecure)
}

#[derive(Debug)]
pub struct Client {
    rpc: SessionRpc,
}

impl Client {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let api = ApiClient::new(endpoint, TIMEOUT)?;
        Ok(Self {
            rpc: SessionRpc::new(api, RPC_PATH, TRANSMISSION_SESSION_HEADER),
        })
    }

    pub fn list_torrents(&mut self) -> Result<Vec<ApiTorrent>> {
        let args = TorrentGetArgs {
            fields: LIST_FIELDS.to_vec(),
            ids: None,
        };
        let response: TorrentGetResponse = self.call("torrent-get", args)?;
        Ok(response.torrents)
    }

    pub fn get_torrent(&mut self, id: i64) -> Result<ApiTorrent> {
        let args = TorrentGetArgs {
            fields: LIST_FIELDS.iter().chain(DETAIL_FIELDS).copied().collect(),
            ids: Some([id]),
        };
        let response: TorrentGetResponse = self.call("torrent-get", args)?;
        response
            .torrents
            .into_iter()
            .next()
            .ok_or_else(|| CliError::not_found(format!("torrent {id} not found")))
    }

    pub fn start_torrent(&mut self, id: i64) -> Result<()> {
        self.call::<_, IgnoredAny>("torrent-start", TorrentIds { ids: [id] })
            .map(|_| ())
    }

    pub fn stop_torrent(&mut self, id: i64) -> Result<()> {
        self.call::<_, IgnoredAny>("torrent-stop", TorrentIds { ids: [id] })
            .map(|_| ())
    }

    pub fn add_magnet(&mut self, magnet: &str) -> Result<AddedTorrent> {
        self.add(TorrentAddArgs {
            filename: Some(magnet.to_string()),
            ..Default::default()
        })
    }

    pub fn add_file(&mut self, path: &Path) -> Result<AddedTorrent> {
        let data = fs::read(path)
            .map_err(|err| CliError::config(format!("failed to read file: {err}")))?;
        self.add(TorrentAddArgs {
            metainfo: Some(STANDARD.encode(data)),
            ..Default::default()
        })
    }

    /// Magnet links go in as-is; anything else is read as a .torrent file.
    pub fn add_source(&mut self, source: &str) -> Result<AddedTorrent> {
        if source.starts_with("magnet:") {
            self.add_magnet(source)
        } else {
            self.add_file(Path::new(source))
        }
    }

    fn add(&mut self, args: TorrentAddArgs) -> Result<AddedTorrent> {
        let response: TorrentAddResponse = self.call("torrent-add", args)?;
        response
            .added
            .or(response.duplicate)
            .ok_or_else(|| CliError::api("no torrent info in response"))
    }

    fn call<A: Serialize, T: DeserializeOwned>(
        &mut self,
        method: &str,
        arguments: A,
    ) -> Result<T> {
        let response: RpcResponse = self.rpc.call(&RpcRequest { method, arguments })?;
        if response.result != "success" {
            return Err(CliError::api(response.result));
        }
        // A reply without arguments decodes like an empty one.
        let arguments = match response.arguments {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other,
        };
        serde_json::from_value(arguments).map_err(|err| CliError::Decode {
            path: RPC_PATH.to_string(),
            reason: err.to_string(),
        })
    }
}
