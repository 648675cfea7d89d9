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

//! Keycloak admin API: realms, users, clients, roles and groups.
//!
//! Requests authenticate with a service-account token obtained through the
//! client-credentials grant against the login realm. The target realm is the
//! one being inspected and may differ from the login realm.

use crate::client::{ApiClient, Auth, Authenticator};
use crate::config::Endpoint;
use crate::error::{CliError, Result};
use crate::format::format_unix_millis;
use crate::services::serde_helpers::null_default;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const TIMEOUT: Duration = Duration::from_secs(10);

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Only the path of this URL is ever used.
const PATH_BASE: &str = "http://keycloak.invalid/";

/// Exchanges client credentials for an access token on first use and reuses
/// it for the rest of the process.
#[derive(Debug)]
pub struct ClientCredentials {
    api: ApiClient,
    realm: String,
    client_id: String,
    client_secret: String,
    token: OnceCell<String>,
}

#[derive(Serialize)]
struct TokenForm<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ClientCredentials {
    pub fn new(
        url: String,
        realm: String,
        client_id: String,
        client_secret: String,
        insecure: bool,
    ) -> Result<Self> {
        let api = ApiClient::new(Endpoint::new(url, Auth::None, insecure)?, TIMEOUT)?;
        Ok(Self {
            api,
            realm,
            client_id,
            client_secret,
            token: OnceCell::new(),
        })
    }

    fn fetch(&self) -> Result<String> {
        let path = encoded_path(
            "/realms",
            &[&self.realm, "protocol", "openid-connect", "token"],
        )?;
        debug!(realm = %self.realm, client_id = %self.client_id, "requesting access token");
        let response: TokenResponse = self
            .api
            .post_form(
                &path,
                &TokenForm {
                    grant_type: "client_credentials",
                    client_id: &self.client_id,
                    client_secret: &self.client_secret,
                },
            )
            .map_err(|err| match err {
                CliError::Auth(_) | CliError::Status { status: 400, .. } => CliError::auth(
                    format!("client credentials rejected by realm {}", self.realm),
                ),
                other => other,
            })?;
        Ok(response.access_token)
    }
}

impl Authenticator for ClientCredentials {
    fn bearer_token(&self) -> Result<String> {
        if let Some(token) = self.token.get() {
            return Ok(token.clone());
        }
        let token = self.fetch()?;
        Ok(self.token.get_or_init(|| token).clone())
    }
}

/// Login settings for the admin API.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

pub fn endpoint(credentials: Credentials, insecure: bool) -> Result<Endpoint> {
    let authenticator = ClientCredentials::new(
        credentials.url.clone(),
        credentials.realm,
        credentials.client_id,
        credentials.client_secret,
        insecure,
    )?;
    Endpoint::new(
        credentials.url,
        Auth::Delegated(Box::new(authenticator)),
        insecure,
    )
}

// API types

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiRealm {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub realm: String,
    #[serde(deserialize_with = "null_default")]
    pub display_name: String,
    pub enabled: bool,
    #[serde(deserialize_with = "null_default")]
    pub ssl_required: String,
    pub registration_allowed: bool,
    pub login_with_email_allowed: bool,
    pub verify_email: bool,
    pub reset_password_allowed: bool,
    pub access_token_lifespan: i64,
    pub sso_session_idle_timeout: i64,
    pub sso_session_max_lifespan: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiUser {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub username: String,
    #[serde(deserialize_with = "null_default")]
    pub email: String,
    #[serde(deserialize_with = "null_default")]
    pub first_name: String,
    #[serde(deserialize_with = "null_default")]
    pub last_name: String,
    pub enabled: bool,
    pub email_verified: bool,
    pub created_timestamp: i64,
    #[serde(deserialize_with = "null_default")]
    pub attributes: BTreeMap<String, Vec<String>>,
    #[serde(deserialize_with = "null_default")]
    pub required_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSession {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub username: String,
    #[serde(deserialize_with = "null_default")]
    pub user_id: String,
    #[serde(deserialize_with = "null_default")]
    pub ip_address: String,
    pub start: i64,
    pub last_access: i64,
    /// Client UUID to client ID.
    #[serde(deserialize_with = "null_default")]
    pub clients: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiClientRepresentation {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub client_id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    pub enabled: bool,
    #[serde(deserialize_with = "null_default")]
    pub protocol: String,
    pub public_client: bool,
    pub bearer_only: bool,
    #[serde(deserialize_with = "null_default")]
    pub root_url: String,
    #[serde(deserialize_with = "null_default")]
    pub base_url: String,
    #[serde(deserialize_with = "null_default")]
    pub redirect_uris: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub web_origins: Vec<String>,
    pub standard_flow_enabled: bool,
    pub direct_access_grants_enabled: bool,
    pub service_accounts_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiRole {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    pub composite: bool,
    pub client_role: bool,
    #[serde(deserialize_with = "null_default")]
    pub container_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGroup {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub path: String,
    #[serde(deserialize_with = "null_default")]
    pub attributes: BTreeMap<String, Vec<String>>,
    #[serde(deserialize_with = "null_default")]
    pub realm_roles: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub sub_groups: Vec<ApiGroup>,
}

// Display types

#[derive(Debug, Serialize)]
pub struct RealmList {
    pub realms: Vec<RealmItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmItem {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RealmDetail {
    pub realm: RealmDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmDetailItem {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub enabled: bool,
    pub ssl_required: String,
    pub registration_allowed: bool,
    pub login_with_email_allowed: bool,
    pub verify_email: bool,
    pub reset_password_allowed: bool,
    pub access_token_lifespan: i64,
    pub sso_session_idle_timeout: i64,
    pub sso_session_max_lifespan: i64,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserItem>,
}

#[derive(Debug, Serialize)]
pub struct GroupMembers {
    pub members: Vec<UserItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserItem {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    pub enabled: bool,
    pub email_verified: bool,
    pub created: String,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub user: UserDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailItem {
    #[serde(flatten)]
    pub summary: UserItem,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_actions: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub id: String,
    pub username: String,
    pub ip_address: String,
    pub started: String,
    pub last_access: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClientList {
    pub clients: Vec<ClientItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientItem {
    pub id: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub enabled: bool,
    pub protocol: String,
    pub public_client: bool,
}

#[derive(Debug, Serialize)]
pub struct ClientDetail {
    pub client: ClientDetailItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetailItem {
    #[serde(flatten)]
    pub summary: ClientItem,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub bearer_only: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub root_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub web_origins: Vec<String>,
    pub standard_flow_enabled: bool,
    pub direct_access_grants_enabled: bool,
    pub service_accounts_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RoleList {
    pub roles: Vec<RoleItem>,
}

#[derive(Debug, Serialize)]
pub struct RoleDetail {
    pub role: RoleItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleItem {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub composite: bool,
    pub client_role: bool,
}

#[derive(Debug, Serialize)]
pub struct GroupList {
    pub groups: Vec<GroupItem>,
}

#[derive(Debug, Serialize)]
pub struct GroupDetail {
    pub group: GroupItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupItem {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub realm_roles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_groups: Vec<GroupItem>,
}

impl ApiRealm {
    pub fn to_list_item(&self) -> RealmItem {
        RealmItem {
            name: self.realm.clone(),
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            enabled: self.enabled,
        }
    }

    pub fn to_detail(&self) -> RealmDetailItem {
        RealmDetailItem {
            name: self.realm.clone(),
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            enabled: self.enabled,
            ssl_required: self.ssl_required.clone(),
            registration_allowed: self.registration_allowed,
            login_with_email_allowed: self.login_with_email_allowed,
            verify_email: self.verify_email,
            reset_password_allowed: self.reset_password_allowed,
            access_token_lifespan: self.access_token_lifespan,
            sso_session_idle_timeout: self.sso_session_idle_timeout,
            sso_session_max_lifespan: self.sso_session_max_lifespan,
        }
    }
}

impl ApiUser {
    pub fn to_list_item(&self) -> UserItem {
        UserItem {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            enabled: self.enabled,
            email_verified: self.email_verified,
            created: format_unix_millis(self.created_timestamp, TIME_FORMAT),
        }
    }

    pub fn to_detail(&self) -> UserDetailItem {
        UserDetailItem {
            summary: self.to_list_item(),
            required_actions: self.required_actions.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl ApiSession {
    pub fn to_list_item(&self) -> SessionItem {
        SessionItem {
            id: self.id.clone(),
            username: self.username.clone(),
            ip_address: self.ip_address.clone(),
            started: format_unix_millis(self.start, TIME_FORMAT),
            last_access: format_unix_millis(self.last_access, TIME_FORMAT),
            clients: self.clients.values().cloned().collect(),
        }
    }
}

impl ApiClientRepresentation {
    pub fn to_list_item(&self) -> ClientItem {
        ClientItem {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            name: self.name.clone(),
            enabled: self.enabled,
            protocol: self.protocol.clone(),
            public_client: self.public_client,
        }
    }

    pub fn to_detail(&self) -> ClientDetailItem {
        ClientDetailItem {
            summary: self.to_list_item(),
            description: self.description.clone(),
            bearer_only: self.bearer_only,
            root_url: self.root_url.clone(),
            base_url: self.base_url.clone(),
            redirect_uris: self.redirect_uris.clone(),
            web_origins: self.web_origins.clone(),
            standard_flow_enabled: self.standard_flow_enabled,
            direct_access_grants_enabled: self.direct_access_grants_enabled,
            service_accounts_enabled: self.service_accounts_enabled,
        }
    }
}

impl ApiRole {
    pub fn to_item(&self) -> RoleItem {
        RoleItem {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            composite: self.composite,
            client_role: self.client_role,
        }
    }
}

impl ApiGroup {
    pub fn to_item(&self) -> GroupItem {
        GroupItem {
            id: self.id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            attributes: self.attributes.clone(),
            realm_roles: self.realm_roles.clone(),
            sub_groups: self.sub_groups.iter().map(ApiGroup::to_item).collect(),
        }
    }
}

/// The realm a non-realm command operates on.
pub fn require_target_realm(realm: Option<String>) -> Result<String> {
    realm.ok_or_else(|| CliError::config("missing --target-realm or KEYCLOAK_TARGET_REALM"))
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

    pub fn list_realms(&self) -> Result<Vec<ApiRealm>> {
        self.api.get("/admin/realms")
    }

    pub fn get_realm(&self, realm: &str) -> Result<ApiRealm> {
        self.api.get(&admin_path(&[realm])?)
    }

    pub fn list_users(&self, realm: &str) -> Result<Vec<ApiUser>> {
        self.api.get(&admin_path(&[realm, "users"])?)
    }

    pub fn get_user(&self, realm: &str, id: &str) -> Result<ApiUser> {
        self.api.get(&admin_path(&[realm, "users", id])?)
    }

    pub fn user_sessions(&self, realm: &str, id: &str) -> Result<Vec<ApiSession>> {
        self.api.get(&admin_path(&[realm, "users", id, "sessions"])?)
    }

    pub fn list_clients(&self, realm: &str) -> Result<Vec<ApiClientRepresentation>> {
        self.api.get(&admin_path(&[realm, "clients"])?)
    }

    pub fn get_client(&self, realm: &str, uuid: &str) -> Result<ApiClientRepresentation> {
        self.api.get(&admin_path(&[realm, "clients", uuid])?)
    }

    pub fn client_sessions(&self, realm: &str, uuid: &str) -> Result<Vec<ApiSession>> {
        self.api
            .get(&admin_path(&[realm, "clients", uuid, "user-sessions"])?)
    }

    /// Realm roles, or the roles of one client when `client` is set.
    pub fn list_roles(&self, realm: &str, client: Option<&str>) -> Result<Vec<ApiRole>> {
        self.api.get(&admin_path(&roles_segments(realm, client, None))?)
    }

    pub fn get_role(&self, realm: &str, client: Option<&str>, name: &str) -> Result<ApiRole> {
        self.api
            .get(&admin_path(&roles_segments(realm, client, Some(name)))?)
    }

    pub fn list_groups(&self, realm: &str) -> Result<Vec<ApiGroup>> {
        self.api.get(&admin_path(&[realm, "groups"])?)
    }

    pub fn get_group(&self, realm: &str, id: &str) -> Result<ApiGroup> {
        self.api.get(&admin_path(&[realm, "groups", id])?)
    }

    pub fn group_members(&self, realm: &str, id: &str) -> Result<Vec<ApiUser>> {
        self.api.get(&admin_path(&[realm, "groups", id, "members"])?)
    }
}

fn roles_segments<'a>(
    realm: &'a str,
    client: Option<&'a str>,
    name: Option<&'a str>,
) -> Vec<&'a str> {
    let mut segments = vec![realm];
    if let Some(uuid) = client {
        segments.extend(["clients", uuid]);
    }
    segments.push("roles");
    segments.extend(name);
    segments
}

/// `/admin/realms/...` with every segment percent-encoded.
fn admin_path(segments: &[&str]) -> Result<String> {
    encoded_path("/admin/realms", segments)
}

/// Appends `segments` to `prefix`, escaping `/`, `?`, `#` and `%` so user
/// input can never leave its segment. Empty, `.` and `..` are rejected.
fn encoded_path(prefix: &str, segments: &[&str]) -> Result<String> {
    if let Some(bad) = segments
        .iter()
        .find(|segment| matches!(segment.trim(), "" | "." | ".."))
    {
        return Err(CliError::config(format!("invalid path segment: {bad:?}")));
    }
    let mut url = Url::parse(PATH_BASE)
        .and_then(|base| base.join(prefix))
        .map_err(|err| CliError::config(format!("building request path: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| CliError::config("building request path"))?
        .extend(segments);
    Ok(url.path().to_string())
}
