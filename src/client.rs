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

use crate::config::Endpoint;
use crate::error::{CliError, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("cli-tools/", env!("CARGO_PKG_VERSION"));

/// Supplies a bearer token for services whose credentials must first be
/// exchanged at a separate token endpoint.
pub trait Authenticator: fmt::Debug {
    fn bearer_token(&self) -> Result<String>;
}

/// How a request proves who it is.
#[derive(Debug)]
pub enum Auth {
    None,
    Bearer(String),
    ApiKey {
        header: &'static str,
        key: String,
    },
    Basic {
        username: String,
        password: Option<String>,
    },
    /// Proxmox style `PVEAPIToken=<id>=<secret>`.
    TokenPair {
        token_id: String,
        secret: String,
    },
    Delegated(Box<dyn Authenticator>),
}

impl Auth {
    pub(crate) fn validate(&self) -> Result<()> {
        let blank = match self {
            Auth::None | Auth::Delegated(_) => false,
            Auth::Bearer(token) => token.trim().is_empty(),
            Auth::ApiKey { key, .. } => key.trim().is_empty(),
            Auth::Basic { username, .. } => username.trim().is_empty(),
            Auth::TokenPair { token_id, secret } => {
                token_id.trim().is_empty() || secret.trim().is_empty()
            }
        };
        if blank {
            return Err(CliError::config("credentials must not be empty"));
        }
        Ok(())
    }

    fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::ApiKey { header, key } => request.header(*header, key),
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::TokenPair { token_id, secret } => {
                request.header(AUTHORIZATION, format!("PVEAPIToken={token_id}={secret}"))
            }
            Auth::Delegated(authenticator) => request.bearer_auth(authenticator.bearer_token()?),
        })
    }
}

/// The request mediator every service adapter talks through.
///
/// It owns the endpoint, attaches credentials, sends one request at a time and
/// turns the outcome into either a decoded value or a classified [`CliError`].
/// It never retries.
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    auth: Auth,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .danger_accept_invalid_certs(!endpoint.verify_tls)
            .build()
            .map_err(|err| CliError::config(format!("building HTTP client: {err}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            base_url: endpoint.base_url,
            http,
            auth: endpoint.auth,
            headers,
        })
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[])
    }

    pub fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.request(Method::GET, path)?;
        if !query.is_empty() {
            request = request.query(query);
        }
        decode(self.execute(request, path)?, path)
    }

    pub fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(Method::POST, path)?;
        decode(self.execute(request, path)?, path)
    }

    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, path)?.json(body);
        decode(self.execute(request, path)?, path)
    }

    pub fn post_form<F: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        form: &F,
    ) -> Result<T> {
        let request = self.request(Method::POST, path)?.form(form);
        decode(self.execute(request, path)?, path)
    }

    /// POST whose response body is irrelevant; only the status counts.
    pub fn post_unit(&self, path: &str) -> Result<()> {
        let request = self.request(Method::POST, path)?;
        check_status(self.execute(request, path)?, path).map(|_| ())
    }

    /// Builds a request for `path` with credentials and default headers
    /// attached. The caller finishes it and hands it to [`ApiClient::execute`].
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "building request");
        let request = self.http.request(method, url).headers(self.headers.clone());
        self.auth.apply(request)
    }

    /// Sends a request. Only transport failures are errors here; the status is
    /// left for the caller to classify.
    pub fn execute(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let response = request.send().map_err(|err| network_error(path, &err))?;
        debug!(status = response.status().as_u16(), path, "received response");
        Ok(response)
    }
}

fn network_error(path: &str, err: &reqwest::Error) -> CliError {
    if err.is_timeout() {
        CliError::Network(format!("request to {path} timed out"))
    } else {
        CliError::Network(format!("request to {path} failed: {err}"))
    }
}

/// Maps a response status onto the error taxonomy. `None` means success.
pub fn classify_status(status: StatusCode, path: &str) -> Option<CliError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(CliError::auth(format!(
            "authentication failed ({}) for {path}",
            status.as_u16()
        ))),
        StatusCode::NOT_FOUND => Some(CliError::not_found(format!("resource not found: {path}"))),
        other => Some(CliError::Status {
            status: other.as_u16(),
            path: path.to_string(),
        }),
    }
}

pub fn check_status(response: Response, path: &str) -> Result<Response> {
    match classify_status(response.status(), path) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

pub fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T> {
    let response = check_status(response, path)?;
    let text = response
        .text()
        .map_err(|err| CliError::Network(format!("reading response from {path}: {err}")))?;
    serde_json::from_str(&text).map_err(|err| CliError::Decode {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    fn client(server: &MockServer, auth: Auth) -> ApiClient {
        let endpoint = Endpoint::new(server.base_url(), auth, false).unwrap();
        ApiClient::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[derive(Debug)]
    struct FixedToken;

    impl Authenticator for FixedToken {
        fn bearer_token(&self) -> Result<String> {
            Ok("delegated-token".into())
        }
    }

    #[test]
    fn sends_api_key_and_parses_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/stacks")
                .header("X-API-Key", "test-key")
                .header("accept", "application/json");
            then.status(200).json_body(json!([{"Id": 1}]));
        });

        let api = client(
            &server,
            Auth::ApiKey {
                header: "X-API-Key",
                key: "test-key".into(),
            },
        );
        let value: Value = api.get("/api/stacks").unwrap();

        mock.assert();
        assert_eq!(value[0]["Id"], 1);
    }

    #[test]
    fn renders_token_pair_and_delegated_headers() {
        let server = MockServer::start();
        let pve = server.mock(|when, then| {
            when.method(GET)
                .path("/api2/json/nodes")
                .header("authorization", "PVEAPIToken=root@pam!cli=s3cret");
            then.status(200).json_body(json!({"data": []}));
        });
        let kc = server.mock(|when, then| {
            when.method(GET)
                .path("/admin/realms")
                .header("authorization", "Bearer delegated-token");
            then.status(200).json_body(json!([]));
        });

        let api = client(
            &server,
            Auth::TokenPair {
                token_id: "root@pam!cli".into(),
                secret: "s3cret".into(),
            },
        );
        let _: Value = api.get("/api2/json/nodes").unwrap();
        let api = client(&server, Auth::Delegated(Box::new(FixedToken)));
        let _: Value = api.get("/admin/realms").unwrap();

        pve.assert();
        kc.assert();
    }

    #[test]
    fn posts_json_and_form_bodies() {
        let server = MockServer::start();
        let json_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/tokens")
                .json_body(json!({"identity": "a@b.c", "secret": "pw"}));
            then.status(200).json_body(json!({"token": "abc"}));
        });
        let form_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .x_www_form_urlencoded_tuple("grant_type", "client_credentials");
            then.status(200).json_body(json!({"access_token": "xyz"}));
        });

        let api = client(&server, Auth::None);
        let token: Value = api
            .post_json("/api/tokens", &json!({"identity": "a@b.c", "secret": "pw"}))
            .unwrap();
        let grant: Value = api
            .post_form("/token", &[("grant_type", "client_credentials")])
            .unwrap();

        json_mock.assert();
        form_mock.assert();
        assert_eq!(token["token"], "abc");
        assert_eq!(grant["access_token"], "xyz");
    }

    #[test]
    fn classifies_statuses() {
        let server = MockServer::start();
        for (path, status) in [("/auth", 401), ("/forbidden", 403), ("/missing", 404), ("/boom", 500)] {
            server.mock(|when, then| {
                when.method(GET).path(path);
                then.status(status).body("nope");
            });
        }
        let api = client(&server, Auth::Bearer("t".into()));

        let kind = |path: &str| api.get::<Value>(path).unwrap_err();
        assert_eq!(kind("/auth").exit_code(), 2);
        assert_eq!(kind("/forbidden").code(), "AUTH_FAILED");
        assert_eq!(kind("/missing").exit_code(), 3);
        let err = kind("/boom");
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn malformed_body_is_a_decode_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/libraries");
            then.status(200).body("<html>login</html>");
        });
        let api = client(&server, Auth::Bearer("t".into()));

        let err = api.get::<Value>("/api/libraries").unwrap_err();
        assert!(matches!(err, CliError::Decode { .. }));
        assert_eq!(err.code(), "API_ERROR");
    }

    #[test]
    fn unreachable_host_is_a_network_failure() {
        let endpoint = Endpoint::new("http://127.0.0.1:1", Auth::None, false).unwrap();
        let api = ApiClient::new(endpoint, Duration::from_secs(2)).unwrap();

        let err = api.get::<Value>("/api/x").unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn post_unit_ignores_empty_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/libraries/lib1/scan");
            then.status(200);
        });
        let api = client(&server, Auth::Bearer("t".into()));

        api.post_unit("/api/libraries/lib1/scan").unwrap();
        mock.assert();
    }
}
