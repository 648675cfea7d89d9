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

//! Portainer stacks, endpoints and the containers behind them.

use crate::client::{ApiClient, Auth};
use crate::config::Endpoint as ServiceEndpoint;
use crate::error::{CliError, Result};
use crate::format::label;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(10);

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

const STACK_TYPES: &[(i64, &str)] = &[(1, "swarm"), (2, "compose"), (3, "kubernetes")];
const STATUSES: &[(i64, &str)] = &[(1, "active"), (2, "inactive")];
const ENDPOINT_TYPES: &[(i64, &str)] = &[
    (1, "docker"),
    (2, "agent"),
    (3, "azure"),
    (4, "edge-agent"),
    (5, "kubernetes"),
];

// Wire types use Portainer's PascalCase keys.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiStack {
    pub id: i64,
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: i64,
    pub status: i64,
    pub endpoint_id: i64,
    #[serde(deserialize_with = "crate::services::serde_helpers::null_default")]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnvVar {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ApiStackFile {
    stack_file_content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiEndpoint {
    pub id: i64,
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: i64,
    pub status: i64,
    #[serde(rename = "URL")]
    pub url: String,
}

/// Container as returned by the Docker API Portainer proxies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiContainer {
    pub id: String,
    #[serde(deserialize_with = "crate::services::serde_helpers::null_default")]
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub created: i64,
    #[serde(deserialize_with = "crate::services::serde_helpers::null_default")]
    pub ports: Vec<ApiPort>,
    #[serde(deserialize_with = "crate::services::serde_helpers::null_default")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiPort {
    #[serde(rename = "IP")]
    pub ip: String,
    pub private_port: i64,
    pub public_port: i64,
    #[serde(rename = "Type")]
    pub kind: String,
}

// Display types

#[derive(Debug, Serialize)]
pub struct StackList {
    pub stacks: Vec<StackListItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackListItem {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub endpoint_id: i64,
}

#[derive(Debug, Serialize)]
pub struct StackDetail {
    pub stack: Stack,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub endpoint_id: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stack_file: String,
}

#[derive(Debug, Serialize)]
pub struct EndpointList {
    pub endpoints: Vec<EndpointItem>,
}

#[derive(Debug, Serialize)]
pub struct EndpointDetail {
    pub endpoint: EndpointItem,
}

#[derive(Debug, Serialize)]
pub struct EndpointItem {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ContainerList {
    pub containers: Vec<ContainerItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerItem {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub stack: String,
    pub endpoint: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    pub created: String,
    pub health: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Port {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<i64>,
    pub container: i64,
    pub protocol: String,
}

impl ApiStack {
    pub fn to_list_item(&self) -> StackListItem {
        StackListItem {
            id: self.id,
            name: self.name.clone(),
            kind: label(self.kind, STACK_TYPES).to_string(),
            status: label(self.status, STATUSES).to_string(),
            endpoint_id: self.endpoint_id,
        }
    }

    pub fn to_stack(&self, stack_file: String) -> Stack {
        Stack {
            id: self.id,
            name: self.name.clone(),
            kind: label(self.kind, STACK_TYPES).to_string(),
            status: label(self.status, STATUSES).to_string(),
            endpoint_id: self.endpoint_id,
            env: self.env.clone(),
            stack_file,
        }
    }
}

impl ApiEndpoint {
    pub fn to_item(&self) -> EndpointItem {
        EndpointItem {
            id: self.id,
            name: self.name.clone(),
            kind: label(self.kind, ENDPOINT_TYPES).to_string(),
            status: label(self.status, STATUSES).to_string(),
            url: self.url.clone(),
        }
    }
}

impl ApiContainer {
    pub fn to_item(&self, endpoint_id: i64) -> ContainerItem {
        let name = self
            .names
            .first()
            .map(|name| name.strip_prefix('/').unwrap_or(name).to_string())
            .unwrap_or_default();

        ContainerItem {
            id: self.id.chars().take(12).collect(),
            name,
            image: self.image.clone(),
            state: self.state.clone(),
            stack: self
                .labels
                .get(COMPOSE_PROJECT_LABEL)
                .cloned()
                .unwrap_or_default(),
            endpoint: endpoint_id,
            ports: self
                .ports
                .iter()
                .map(|p| Port {
                    host: (p.public_port != 0).then_some(p.public_port),
                    container: p.private_port,
                    protocol: p.kind.clone(),
                })
                .collect(),
            created: created_rfc3339(self.created),
            health: health_from_status(&self.status).to_string(),
        }
    }
}

/// Docker only exposes health inside the human status, e.g. `Up 2 hours (healthy)`.
pub fn health_from_status(status: &str) -> &'static str {
    let status = status.to_lowercase();
    if status.contains("(healthy)") {
        "healthy"
    } else if status.contains("(unhealthy)") {
        "unhealthy"
    } else if status.contains("(health: starting)") {
        "starting"
    } else {
        "none"
    }
}

fn created_rfc3339(unix: i64) -> String {
    if unix == 0 {
        return String::new();
    }
    DateTime::from_timestamp(unix, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn sort_containers(items: &mut [ContainerItem]) {
    items.sort_by(|a, b| a.endpoint.cmp(&b.endpoint).then_with(|| a.name.cmp(&b.name)));
}

pub fn endpoint(url: String, token: String, insecure: bool) -> Result<ServiceEndpoint> {
    ServiceEndpoint::new(
        url,
        Auth::ApiKey {
            header: "X-API-Key",
            key: token,
        },
        insecure,
    )
}

#[derive(Debug)]
pub struct Client {
    api: ApiClient,
}

impl Client {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(endpoint, TIMEOUT)?,
        })
    }

    pub fn list_stacks(&self) -> Result<Vec<ApiStack>> {
        self.api.get("/api/stacks")
    }

    /// Stacks are located through the listing, which also carries the
    /// endpoint the stack lives on.
    pub fn find_stack(&self, id: i64) -> Result<ApiStack> {
        self.list_stacks()?
            .into_iter()
            .find(|stack| stack.id == id)
            .ok_or_else(|| CliError::not_found(format!("stack with ID {id}")))
    }

    pub fn stack_file(&self, id: i64) -> Result<String> {
        let file: ApiStackFile = self.api.get(&format!("/api/stacks/{id}/file"))?;
        Ok(file.stack_file_content)
    }

    pub fn show_stack(&self, id: i64) -> Result<StackDetail> {
        let stack = self.find_stack(id)?;
        let file = self.stack_file(id)?;
        Ok(StackDetail {
            stack: stack.to_stack(file),
        })
    }

    pub fn list_endpoints(&self) -> Result<Vec<ApiEndpoint>> {
        self.api.get("/api/endpoints")
    }

    pub fn get_endpoint(&self, id: i64) -> Result<ApiEndpoint> {
        self.api.get(&format!("/api/endpoints/{id}"))
    }

    pub fn list_containers(&self, endpoint_id: i64) -> Result<Vec<ApiContainer>> {
        self.api.get_with_query(
            &format!("/api/endpoints/{endpoint_id}/docker/containers/json"),
            &[("all", "true".to_string())],
        )
    }

    /// Containers of one endpoint, or of every endpoint in turn. The first
    /// endpoint that fails aborts the whole listing.
    pub fn containers(&self, endpoint_id: Option<i64>) -> Result<ContainerList> {
        let endpoint_ids = match endpoint_id {
            Some(id) => vec![id],
            None => self.list_endpoints()?.iter().map(|e| e.id).collect(),
        };

        let mut items = Vec::new();
        for id in endpoint_ids {
            items.extend(self.list_containers(id)?.iter().map(|c| c.to_item(id)));
        }
        sort_containers(&mut items);
        Ok(ContainerList { containers: items })
    }

    /// Containers whose compose project matches the stack name.
    pub fn stack_containers(&self, id: i64) -> Result<ContainerList> {
        let stack = self.find_stack(id)?;
        let mut items: Vec<ContainerItem> = self
            .list_containers(stack.endpoint_id)?
            .iter()
            .map(|c| c.to_item(stack.endpoint_id))
            .filter(|item| item.stack == stack.name)
            .collect();
        sort_containers(&mut items);
        Ok(ContainerList { containers: items })
    }
}
