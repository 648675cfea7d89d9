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

//! nginx-proxy-manager: proxy hosts and certificates.

use crate::client::{ApiClient, Auth};
use crate::config::Endpoint;
use crate::error::{CliError, ErrorKind, Result};
use crate::services::serde_helpers::{flexible_bool, null_default};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiProxyHost {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub domain_names: Vec<String>,
    pub forward_scheme: String,
    pub forward_host: String,
    pub forward_port: i64,
    /// `0` when no certificate is attached; some versions send `"new"` mid-issue.
    pub certificate_id: serde_json::Value,
    #[serde(deserialize_with = "flexible_bool")]
    pub ssl_forced: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub block_exploits: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub caching_enabled: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub allow_websocket_upgrade: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub enabled: bool,
    #[serde(deserialize_with = "null_default")]
    pub advanced_config: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiCertificate {
    pub id: i64,
    pub provider: String,
    pub nice_name: String,
    #[serde(deserialize_with = "null_default")]
    pub domain_names: Vec<String>,
    pub expires_on: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    identity: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Serialize)]
pub struct ProxyHostList {
    pub hosts: Vec<ProxyHostListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHostListItem {
    pub id: i64,
    pub domain_names: Vec<String>,
    pub forward_host: String,
    pub forward_port: i64,
    pub ssl_forced: bool,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ProxyHostDetail {
    pub host: ProxyHost,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHost {
    pub id: i64,
    pub domain_names: Vec<String>,
    pub forward_scheme: String,
    pub forward_host: String,
    pub forward_port: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<i64>,
    pub ssl_forced: bool,
    pub block_exploits: bool,
    pub caching_enabled: bool,
    pub websocket: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub advanced_config: String,
}

#[derive(Debug, Serialize)]
pub struct CertificateList {
    pub certificates: Vec<CertificateListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateListItem {
    pub id: i64,
    pub nice_name: String,
    pub provider: String,
    pub expires_on: String,
}

#[derive(Debug, Serialize)]
pub struct CertificateDetail {
    pub certificate: Certificate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: i64,
    pub nice_name: String,
    pub provider: String,
    pub domain_names: Vec<String>,
    pub expires_on: String,
}

impl ApiProxyHost {
    pub fn to_list_item(&self) -> ProxyHostListItem {
        ProxyHostListItem {
            id: self.id,
            domain_names: self.domain_names.clone(),
            forward_host: self.forward_host.clone(),
            forward_port: self.forward_port,
            ssl_forced: self.ssl_forced,
            enabled: self.enabled,
        }
    }

    pub fn to_proxy_host(&self) -> ProxyHost {
        ProxyHost {
            id: self.id,
            domain_names: self.domain_names.clone(),
            forward_scheme: self.forward_scheme.clone(),
            forward_host: self.forward_host.clone(),
            forward_port: self.forward_port,
            certificate_id: self.certificate_id.as_i64().filter(|id| *id > 0),
            ssl_forced: self.ssl_forced,
            block_exploits: self.block_exploits,
            caching_enabled: self.caching_enabled,
            websocket: self.allow_websocket_upgrade,
            enabled: self.enabled,
            advanced_config: self.advanced_config.clone(),
        }
    }
}

impl ApiCertificate {
    pub fn to_list_item(&self) -> CertificateListItem {
        CertificateListItem {
            id: self.id,
            nice_name: self.nice_name.clone(),
            provider: self.provider.clone(),
            expires_on: self.expires_on.clone(),
        }
    }

    pub fn to_certificate(&self) -> Certificate {
        Certificate {
            id: self.id,
            nice_name: self.nice_name.clone(),
            provider: self.provider.clone(),
            domain_names: self.domain_names.clone(),
            expires_on: self.expires_on.clone(),
        }
    }
}

pub fn endpoint(url: String, token: String, insecure: bool) -> Result<Endpoint> {
    Endpoint::new(url, Auth::Bearer(token), insecure)
}

/// Exchanges an email and password for an API token.
pub fn login(url: String, email: &str, password: &str, insecure: bool) -> Result<String> {
    let api = ApiClient::new(Endpoint::new(url, Auth::None, insecure)?, TIMEOUT)?;
    let response: TokenResponse = api
        .post_json(
            "/api/tokens",
            &TokenRequest {
                identity: email,
                secret: password,
            },
        )
        .map_err(|err| match err.kind() {
            ErrorKind::Auth => CliError::auth("invalid credentials"),
            _ => err,
        })?;
    Ok(response.token)
}

#[derive(Debug)]
pub struct Client {
    api: ApiClient,
}

impl Client {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(endpoint, TIMEOUT)?,
        })
    }

    pub fn list_proxy_hosts(&self) -> Result<Vec<ApiProxyHost>> {
        self.api.get("/api/nginx/proxy-hosts")
    }

    pub fn get_proxy_host(&self, id: i64) -> Result<ApiProxyHost> {
        self.api.get(&format!("/api/nginx/proxy-hosts/{id}"))
    }

    pub fn list_certificates(&self) -> Result<Vec<ApiCertificate>> {
        self.api.get("/api/nginx/certificates")
    }

    pub fn get_certificate(&self, id: i64) -> Result<ApiCertificate> {
        self.api.get(&format!("/api/nginx/certificates/{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> Client {
        Client::new(endpoint(server.base_url(), "jwt".into(), false).unwrap()).unwrap()
    }

    #[test]
    fn lists_hosts_with_integer_flags() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/nginx/proxy-hosts")
                .header("authorization", "Bearer jwt");
            then.status(200).json_body(json!([{
                "id": 4,
                "domain_names": ["sonarr.home.lan"],
                "forward_scheme": "http",
                "forward_host": "10.0.0.20",
                "forward_port": 8989,
                "certificate_id": 0,
                "ssl_forced": 1,
                "block_exploits": true,
                "caching_enabled": 0,
                "allow_websocket_upgrade": 1,
                "enabled": 1,
                "advanced_config": ""
            }]));
        });

        let hosts = client(&server).list_proxy_hosts().unwrap();
        mock.assert();
        let item = hosts[0].to_list_item();
        assert_eq!(item.domain_names, vec!["sonarr.home.lan"]);
        assert!(item.ssl_forced);
        assert!(item.enabled);

        let detail = hosts[0].to_proxy_host();
        assert_eq!(detail.certificate_id, None);
        assert!(detail.websocket);
        assert!(!detail.caching_enabled);
    }

    #[test]
    fn shows_certificate() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/nginx/certificates/2");
            then.status(200).json_body(json!({
                "id": 2,
                "provider": "letsencrypt",
                "nice_name": "home.lan",
                "domain_names": ["*.home.lan", "home.lan"],
                "expires_on": "2025-03-01 10:00:00"
            }));
        });

        let cert = client(&server).get_certificate(2).unwrap().to_certificate();
        assert_eq!(cert.nice_name, "home.lan");
        assert_eq!(cert.domain_names.len(), 2);
    }

    #[test]
    fn missing_host_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/nginx/proxy-hosts/77");
            then.status(404).json_body(json!({"error": {"message": "Not Found"}}));
        });

        let err = client(&server).get_proxy_host(77).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn login_returns_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/tokens")
                .json_body(json!({"identity": "admin@example.com", "secret": "changeme"}));
            then.status(200)
                .json_body(json!({"token": "eyJhbGciOi", "expires": "2025-01-01T00:00:00Z"}));
        });

        let token = login(server.base_url(), "admin@example.com", "changeme", false).unwrap();
        mock.assert();
        assert_eq!(token, "eyJhbGciOi");
    }

    #[test]
    fn rejected_login_is_an_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/tokens");
            then.status(401)
                .json_body(json!({"error": {"message": "Invalid email or password"}}));
        });

        let err = login(server.base_url(), "a@b.c", "wrong", false).unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
        assert_eq!(err.to_string(), "invalid credentials");
    }
}
