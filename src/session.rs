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

//! RPC transport for services that hand out a session identifier through a
//! `409 Conflict` response and expect it echoed back on every call.

use crate::client::{ApiClient, decode};
use crate::error::{CliError, Result};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const TRANSMISSION_SESSION_HEADER: &str = "X-Transmission-Session-Id";

const MAX_ATTEMPTS: usize = 2;

#[derive(Debug)]
pub struct SessionRpc {
    api: ApiClient,
    path: String,
    header: &'static str,
    session_id: Option<String>,
}

impl SessionRpc {
    pub fn new(api: ApiClient, path: impl Into<String>, header: &'static str) -> Self {
        Self {
            api,
            path: path.into(),
            header,
            session_id: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// POSTs `body` and decodes the reply. A 409 stores the identifier it
    /// carries and repeats the call once; any other status is classified as
    /// usual.
    pub fn call<B: Serialize + ?Sized, T: DeserializeOwned>(&mut self, body: &B) -> Result<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.api.request(Method::POST, &self.path)?.json(body);
            if let Some(id) = &self.session_id {
                request = request.header(self.header, id);
            }

            let response = self.api.execute(request, &self.path)?;
            if response.status() != StatusCode::CONFLICT {
                return decode(response, &self.path);
            }

            let id = response
                .headers()
                .get(self.header)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| CliError::api("received 409 but no session ID in response"))?;
            debug!(attempt, "session identifier renewed");
            self.session_id = Some(id);
        }

        Err(CliError::api("failed to get valid session after retry"))
    }
}
