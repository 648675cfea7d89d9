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

use crate::client::Auth;
use crate::error::{CliError, Result};
use std::env;

/// One configuration input: a human name, the flag that sets it and the
/// environment variable it falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub name: &'static str,
    pub flag: &'static str,
    pub env: &'static str,
}

impl Setting {
    pub const fn new(name: &'static str, flag: &'static str, env: &'static str) -> Self {
        Self { name, flag, env }
    }

    fn missing(&self) -> CliError {
        CliError::config(format!(
            "missing {}. Use --{} or set {}",
            self.name, self.flag, self.env
        ))
    }
}

/// Explicit value first, then the environment. Blank values count as absent.
pub fn resolve_optional(explicit: Option<&str>, setting: &Setting) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env::var(setting.env)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
}

pub fn resolve(explicit: Option<&str>, setting: &Setting) -> Result<String> {
    resolve_optional(explicit, setting).ok_or_else(|| setting.missing())
}

/// Like [`resolve`], and additionally insists on an http(s) scheme. The
/// trailing slash is dropped so paths can be appended verbatim.
pub fn resolve_url(explicit: Option<&str>, setting: &Setting) -> Result<String> {
    let url = resolve(explicit, setting)?;
    check_scheme(&url)?;
    Ok(url.trim_end_matches('/').to_string())
}

fn check_scheme(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CliError::config("URL must start with http:// or https://"))
    }
}

/// Parses a positive integer identifier taken from a positional argument.
pub fn parse_id(arg: &str, what: &str) -> Result<i64> {
    let id: i64 = arg
        .trim()
        .parse()
        .map_err(|_| CliError::config(format!("invalid {what}: {arg}")))?;
    if id <= 0 {
        return Err(CliError::config(format!("{what} must be positive")));
    }
    Ok(id)
}

/// Everything needed to reach one service. Built once per invocation and
/// handed to the client that owns it.
#[derive(Debug)]
pub struct Endpoint {
    pub base_url: String,
    pub auth: Auth,
    pub verify_tls: bool,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, auth: Auth, insecure: bool) -> Result<Self> {
        let base_url = base_url.into();
        check_scheme(&base_url)?;
        auth.validate()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            verify_tls: !insecure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const URL: Setting = Setting::new("URL", "url", "CLI_TOOLS_TEST_URL");

    #[test]
    fn explicit_value_beats_environment() {
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        unsafe {
            env::set_var("CLI_TOOLS_TEST_URL", "https://from-env.test");
        }
        let url = resolve_url(Some("https://flag.test/"), &URL).unwrap();
        assert_eq!(url, "https://flag.test");

        let url = resolve_url(Some("  "), &URL).unwrap();
        assert_eq!(url, "https://from-env.test");
        unsafe {
            env::remove_var("CLI_TOOLS_TEST_URL");
        }
    }

    #[test]
    fn missing_setting_names_flag_and_variable() {
        let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        unsafe {
            env::set_var("CLI_TOOLS_TEST_URL", "");
        }
        let err = resolve(None, &URL).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(
            err.to_string(),
            "missing URL. Use --url or set CLI_TOOLS_TEST_URL"
        );
        assert_eq!(resolve_optional(None, &URL), None);
        unsafe {
            env::remove_var("CLI_TOOLS_TEST_URL");
        }
    }

    #[test]
    fn rejects_url_without_scheme() {
        let err = resolve_url(Some("nas.local:9091"), &URL).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42", "ID").unwrap(), 42);
        assert_eq!(
            parse_id("abc", "ID").unwrap_err().to_string(),
            "invalid ID: abc"
        );
        assert_eq!(
            parse_id("0", "stack ID").unwrap_err().to_string(),
            "stack ID must be positive"
        );
        assert!(parse_id("-3", "ID").is_err());
    }

    #[test]
    fn endpoint_requires_credentials() {
        let err = Endpoint::new("https://pve.local:8006", Auth::Bearer(String::new()), false)
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        let endpoint =
            Endpoint::new("https://pve.local:8006/", Auth::Bearer("t".into()), true).unwrap();
        assert_eq!(endpoint.base_url, "https://pve.local:8006");
        assert!(!endpoint.verify_tls);
    }
}
