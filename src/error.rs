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

use thiserror::Error;

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Classified failure shared by every client.
///
/// The variant decides the stable `code` string and the process exit code;
/// the message is free text for humans.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Network(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("API error: unexpected status {status} from {path}")]
    Status { status: u16, path: String },
    #[error("API error: failed to parse response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Auth,
    NotFound,
    Network,
    Api,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Auth => "AUTH_FAILED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Api => "API_ERROR",
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config => 1,
            ErrorKind::Auth => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Network => 4,
            ErrorKind::Api => 5,
        }
    }
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        CliError::Config(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        CliError::Auth(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CliError::NotFound(message.into())
    }

    pub fn api(message: impl Into<String>) -> Self {
        CliError::Api(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::Config(_) => ErrorKind::Config,
            CliError::Auth(_) => ErrorKind::Auth,
            CliError::NotFound(_) => ErrorKind::NotFound,
            CliError::Network(_) => ErrorKind::Network,
            CliError::Api(_) | CliError::Status { .. } | CliError::Decode { .. } => ErrorKind::Api,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_kind() {
        assert_eq!(CliError::config("x").exit_code(), 1);
        assert_eq!(CliError::auth("x").exit_code(), 2);
        assert_eq!(CliError::not_found("x").exit_code(), 3);
        assert_eq!(CliError::Network("x".into()).exit_code(), 4);
        assert_eq!(CliError::api("x").exit_code(), 5);
        assert_eq!(
            CliError::Status {
                status: 500,
                path: "/x".into()
            }
            .exit_code(),
            5
        );
    }

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(CliError::config("").code(), "CONFIG_ERROR");
        assert_eq!(CliError::auth("").code(), "AUTH_FAILED");
        assert_eq!(CliError::not_found("").code(), "NOT_FOUND");
        assert_eq!(CliError::Network(String::new()).code(), "NETWORK_ERROR");
        assert_eq!(
            CliError::Decode {
                path: "/x".into(),
                reason: "eof".into()
            }
            .code(),
            "API_ERROR"
        );
    }

    #[test]
    fn status_and_decode_failures_read_differently() {
        let status = CliError::Status {
            status: 502,
            path: "/api/stacks".into(),
        };
        let decode = CliError::Decode {
            path: "/api/stacks".into(),
            reason: "expected value".into(),
        };
        assert_eq!(
            status.to_string(),
            "API error: unexpected status 502 from /api/stacks"
        );
        assert!(decode.to_string().starts_with("API error: failed to parse"));
        assert_eq!(CliError::not_found("torrent 7 not found").to_string(), "torrent 7 not found");
    }
}
