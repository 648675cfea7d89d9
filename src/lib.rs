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

//! Shared core for the homelab service CLIs.
//!
//! Each binary under `src/bin` is a thin command surface over one module in
//! [`services`]. Everything they have in common lives here: endpoint
//! resolution, the request mediator, the error taxonomy and YAML output.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod output;
pub mod services;
pub mod session;

pub use error::{CliError, ErrorKind, Result};
