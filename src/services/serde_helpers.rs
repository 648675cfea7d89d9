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

//! Lenient decoding for fields services are inconsistent about.

use serde::{Deserialize, Deserializer};

/// Treats an explicit `null` like a missing field.
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `true`/`false`, `0`/`1` or `null` for a boolean flag.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => value,
        Some(Flag::Int(value)) => value != 0,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Host {
        #[serde(default, deserialize_with = "flexible_bool")]
        enabled: bool,
        #[serde(default, deserialize_with = "null_default")]
        name: String,
    }

    #[test]
    fn integers_and_nulls_decode() {
        let host: Host = serde_json::from_value(json!({"enabled": 1, "name": null})).unwrap();
        assert!(host.enabled);
        assert_eq!(host.name, "");

        let host: Host = serde_json::from_value(json!({"enabled": false})).unwrap();
        assert!(!host.enabled);

        let host: Host = serde_json::from_value(json!({})).unwrap();
        assert!(!host.enabled);
    }
}
