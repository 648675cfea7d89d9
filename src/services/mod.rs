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

//! One adapter per remote service: wire types, display types and a typed
//! client over [`crate::client::ApiClient`].

pub mod abs;
pub mod arr;
pub mod keycloak;
pub mod nproxy;
pub mod portainer;
pub mod pve;
pub mod radarr;
pub mod serde_helpers;
pub mod sonarr;
pub mod transmission;
