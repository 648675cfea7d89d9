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

//! Proxmox VE guests (QEMU virtual machines and LXC containers).

use crate::client::{ApiClient, Auth};
use crate::config::Endpoint;
use crate::error::{CliError, Result};
use crate::format::format_uptime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::time::Duration;
use tracing::debug;

pub const TIMEOUT: Duration = Duration::from_secs(10);

const API_PREFIX: &str = "/api2/json";

/// Shown when a guest's address is unknown.
pub const NO_ADDRESS: &str = "-";

#[derive(Debug, Default, Deserialize)]
struct DataResponse<T> {
    #[serde(default)]
    data: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiNode {
    pub node: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiGuest {
    pub vmid: i64,
    pub name: String,
    pub status: String,
    pub cpu: f64,
    pub cpus: i64,
    pub mem: u64,
    pub maxmem: u64,
    pub uptime: u64,
    pub netin: u64,
    pub netout: u64,
    pub diskread: u64,
    pub diskwrite: u64,
}

#[derive(Debug, Default, Deserialize)]
struct AgentNetwork {
    #[serde(default)]
    result: Vec<AgentInterface>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentInterface {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "ip-addresses")]
    ip_addresses: Vec<AgentAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentAddress {
    #[serde(default, rename = "ip-address")]
    ip_address: String,
    #[serde(default, rename = "ip-address-type")]
    ip_address_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LxcInterface {
    name: String,
    inet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestKind {
    Qemu,
    Lxc,
}

impl GuestKind {
    fn segment(self) -> &'static str {
        match self {
            GuestKind::Qemu => "qemu",
            GuestKind::Lxc => "lxc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GuestKind::Qemu => "vm",
            GuestKind::Lxc => "lxc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

impl Action {
    fn segment(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Action::Start => "started",
            Action::Stop => "stopped",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GuestList {
    pub guests: Vec<Guest>,
}

#[derive(Debug, Serialize)]
pub struct Guest {
    pub vmid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub cpu: i64,
    /// Configured maximum, in MB.
    pub memory: u64,
    pub uptime: String,
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResult {
    pub vmid: i64,
    pub name: String,
    pub action: String,
}

impl ApiGuest {
    pub fn to_guest(&self, kind: GuestKind, ip: String) -> Guest {
        Guest {
            vmid: self.vmid,
            name: self.name.clone(),
            kind: kind.label().to_string(),
            status: self.status.clone(),
            cpu: self.cpus,
            memory: self.maxmem / 1024 / 1024,
            uptime: format_uptime(self.uptime),
            ip,
        }
    }

    fn is_running(&self) -> bool {
        self.status == "running"
    }
}

pub fn endpoint(url: String, token_id: String, secret: String, insecure: bool) -> Result<Endpoint> {
    Endpoint::new(url, Auth::TokenPair { token_id, secret }, insecure)
}

#[derive(Debug)]
pub struct Client {
    api: ApiClient,
    node: OnceCell<String>,
}

impl Client {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(endpoint, TIMEOUT)?,
            node: OnceCell::new(),
        })
    }

    fn get<T: DeserializeOwned + Default>(&self, path: &str) -> Result<T> {
        let response: DataResponse<T> = self.api.get(&format!("{API_PREFIX}{path}"))?;
        Ok(response.data)
    }

    /// The first node the cluster reports. Looked up once per client.
    pub fn node(&self) -> Result<String> {
        if let Some(node) = self.node.get() {
            return Ok(node.clone());
        }
        let nodes: Vec<ApiNode> = self.get("/nodes")?;
        let node = nodes
            .into_iter()
            .next()
            .map(|n| n.node)
            .ok_or_else(|| CliError::api("no nodes found"))?;
        Ok(self.node.get_or_init(|| node).clone())
    }

    pub fn list_kind(&self, kind: GuestKind) -> Result<Vec<ApiGuest>> {
        let node = self.node()?;
        self.get(&format!("/nodes/{node}/{}", kind.segment()))
    }

    /// First non-loopback IPv4 address of a running guest, if it reports one.
    pub fn guest_address(&self, kind: GuestKind, vmid: i64) -> Result<Option<String>> {
        let node = self.node()?;
        match kind {
            GuestKind::Qemu => {
                let network: AgentNetwork = self.get(&format!(
                    "/nodes/{node}/qemu/{vmid}/agent/network-get-interfaces"
                ))?;
                Ok(network
                    .result
                    .into_iter()
                    .filter(|iface| iface.name != "lo")
                    .flat_map(|iface| iface.ip_addresses)
                    .find(|addr| {
                        addr.ip_address_type == "ipv4" && !addr.ip_address.starts_with("127.")
                    })
                    .map(|addr| addr.ip_address))
            }
            GuestKind::Lxc => {
                let interfaces: Vec<LxcInterface> =
                    self.get(&format!("/nodes/{node}/lxc/{vmid}/interfaces"))?;
                Ok(interfaces
                    .into_iter()
                    .filter(|iface| iface.name != "lo" && !iface.inet.is_empty())
                    .map(|iface| iface.inet.split('/').next().unwrap_or_default().to_string())
                    .find(|ip| !ip.starts_with("127.")))
            }
        }
    }

    /// Every VM and container, sorted by VMID. A failed address lookup only
    /// costs that guest its `ip`, never the listing.
    pub fn list_guests(&self) -> Result<GuestList> {
        let mut guests = Vec::new();
        for kind in [GuestKind::Qemu, GuestKind::Lxc] {
            for guest in self.list_kind(kind)? {
                let ip = if guest.is_running() {
                    match self.guest_address(kind, guest.vmid) {
                        Ok(ip) => ip.unwrap_or_else(|| NO_ADDRESS.to_string()),
                        Err(err) => {
                            debug!(vmid = guest.vmid, error = %err, "address lookup failed");
                            NO_ADDRESS.to_string()
                        }
                    }
                } else {
                    NO_ADDRESS.to_string()
                };
                guests.push(guest.to_guest(kind, ip));
            }
        }
        guests.sort_by_key(|guest| guest.vmid);
        Ok(GuestList { guests })
    }

    pub fn find_guest(&self, vmid: i64) -> Result<(GuestKind, ApiGuest)> {
        for kind in [GuestKind::Qemu, GuestKind::Lxc] {
            if let Some(guest) = self.list_kind(kind)?.into_iter().find(|g| g.vmid == vmid) {
                return Ok((kind, guest));
            }
        }
        Err(CliError::not_found(format!("guest {vmid} not found")))
    }

    pub fn change_state(&self, vmid: i64, action: Action) -> Result<ActionResult> {
        let (kind, guest) = self.find_guest(vmid)?;
        let node = self.node()?;
        let path = format!(
            "{API_PREFIX}/nodes/{node}/{}/{vmid}/status/{}",
            kind.segment(),
            action.segment()
        );
        let task: DataResponse<Option<String>> = self.api.post(&path)?;
        debug!(vmid, task = ?task.data, "task submitted");
        Ok(ActionResult {
            vmid,
            name: guest.name,
            action: action.past_tense().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> Client {
        let endpoint = endpoint(server.base_url(), "user@pam!cli".into(), "abc123".into(), false)
            .unwrap();
        Client::new(endpoint).unwrap()
    }

    fn mock_nodes(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api2/json/nodes")
                .header("authorization", "PVEAPIToken=user@pam!cli=abc123");
            then.status(200)
                .json_body(json!({"data": [{"node": "pve", "status": "online"}]}));
        })
    }

    #[test]
    fn caches_node_name() {
        let server = MockServer::start();
        let nodes = mock_nodes(&server);

        let client = client(&server);
        assert_eq!(client.node().unwrap(), "pve");
        assert_eq!(client.node().unwrap(), "pve");
        nodes.assert_hits(1);
    }

    #[test]
    fn empty_cluster_is_an_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api2/json/nodes");
            then.status(200).json_body(json!({"data": []}));
        });

        let err = client(&server).node().unwrap_err();
        assert_eq!(err.to_string(), "API error: no nodes found");
    }

    #[test]
    fn failed_address_lookup_degrades_to_sentinel() {
        let server = MockServer::start();
        mock_nodes(&server);
        server.mock(|when, then| {
            when.method(GET).path("/api2/json/nodes/pve/qemu");
            then.status(200).json_body(json!({"data": [
                {"vmid": 101, "name": "web", "status": "running", "cpus": 2, "maxmem": 4294967296u64, "uptime": 3661},
                {"vmid": 100, "name": "db", "status": "running", "cpus": 4, "maxmem": 8589934592u64, "uptime": 90061}
            ]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api2/json/nodes/pve/lxc");
            then.status(200).json_body(json!({"data": [
                {"vmid": 200, "name": "dns", "status": "running", "cpus": 1, "maxmem": 536870912u64, "uptime": 60},
                {"vmid": 201, "name": "old", "status": "stopped", "cpus": 1, "maxmem": 536870912u64}
            ]}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api2/json/nodes/pve/qemu/100/agent/network-get-interfaces");
            then.status(200).json_body(json!({"data": {"result": [
                {"name": "lo", "ip-addresses": [{"ip-address": "127.0.0.1", "ip-address-type": "ipv4"}]},
                {"name": "eth0", "ip-addresses": [
                    {"ip-address": "fe80::1", "ip-address-type": "ipv6"},
                    {"ip-address": "10.0.0.5", "ip-address-type": "ipv4"}
                ]}
            ]}}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api2/json/nodes/pve/qemu/101/agent/network-get-interfaces");
            then.status(500).body("QEMU guest agent is not running");
        });
        server.mock(|when, then| {
            when.method(GET).path("/api2/json/nodes/pve/lxc/200/interfaces");
            then.status(200).json_body(json!({"data": [
                {"name": "lo", "inet": "127.0.0.1/8"},
                {"name": "eth0", "inet": "10.0.0.53/24", "hwaddr": "aa:bb"}
            ]}));
        });

        let listing = client(&server).list_guests().unwrap();
        let summary: Vec<(i64, &str, &str)> = listing
            .guests
            .iter()
            .map(|g| (g.vmid, g.kind.as_str(), g.ip.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (100, "vm", "10.0.0.5"),
                (101, "vm", "-"),
                (200, "lxc", "10.0.0.53"),
                (201, "lxc", "-"),
            ]
        );
        assert_eq!(listing.guests[0].memory, 8192);
        assert_eq!(listing.guests[0].uptime, "1d 1h 1m");
        assert_eq!(listing.guests[1].uptime, "1h 1m");
    }

    #[test]
    fn starts_container_by_vmid() {
        let server = MockServer::start();
        mock_nodes(&server);
        server.mock(|when, then| {
            when.method(GET).path("/api2/json/nodes/pve/qemu");
            then.status(200).json_body(json!({"data": []}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api2/json/nodes/pve/lxc");
            then.status(200)
                .json_body(json!({"data": [{"vmid": 200, "name": "dns", "status": "stopped"}]}));
        });
        let start = server.mock(|when, then| {
            when.method(POST)
                .path("/api2/json/nodes/pve/lxc/200/status/start");
            then.status(200)
                .json_body(json!({"data": "UPID:pve:0001:vzstart:200:root@pam:"}));
        });

        let result = client(&server).change_state(200, Action::Start).unwrap();
        start.assert();
        assert_eq!(result.name, "dns");
        assert_eq!(result.action, "started");
    }

    #[test]
    fn unknown_vmid_is_not_found() {
        let server = MockServer::start();
        mock_nodes(&server);
        for kind in ["qemu", "lxc"] {
            server.mock(|when, then| {
                when.method(GET).path(format!("/api2/json/nodes/pve/{kind}"));
                then.status(200).json_body(json!({"data": []}));
            });
        }

        let err = client(&server).change_state(999, Action::Stop).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "guest 999 not found");
    }
}
