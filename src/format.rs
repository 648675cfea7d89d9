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

//! Presentation helpers shared by the display mappers. All pure; none fail.

use chrono::{DateTime, Local, TimeZone, Utc};

pub const DESCRIPTION_LIMIT: usize = 500;

pub const UNKNOWN: &str = "unknown";

const BYTE_UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

pub fn format_bytes(bytes: u64) -> String {
    const STEP: u64 = 1024;
    if bytes < STEP {
        return format!("{bytes} B");
    }
    let mut div = STEP;
    let mut exp = 0;
    let mut n = bytes / STEP;
    while n >= STEP && exp < BYTE_UNITS.len() - 1 {
        div *= STEP;
        exp += 1;
        n /= STEP;
    }
    let mut value = bytes as f64 / div as f64;
    // Values that would round up to 1024.0 belong to the next unit.
    if (value * 10.0).round() >= 10_240.0 && exp < BYTE_UNITS.len() - 1 {
        value /= STEP as f64;
        exp += 1;
    }
    format!("{:.1} {}", value, BYTE_UNITS[exp])
}

/// Byte counts that arrive as signed or floating values on the wire.
pub fn format_bytes_f64(bytes: f64) -> String {
    format_bytes(bytes.max(0.0) as u64)
}

pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// `"3h 25m"`, or `"25m"` below one hour.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Playback position: `"1:02:03"` or `"2:03"`.
pub fn format_time_position(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Runtime in minutes; zero means the service does not know it yet.
pub fn format_runtime(minutes: u64) -> String {
    if minutes == 0 {
        return "-".to_string();
    }
    format_duration((minutes * 60) as f64)
}

pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    // Minutes are noise next to whole days.
    if minutes > 0 && (days == 0 || hours > 0) {
        parts.push(format!("{minutes}m"));
    }
    if parts.is_empty() {
        return format!("{seconds}s");
    }
    parts.join(" ")
}

pub fn format_eta(seconds: i64) -> String {
    if seconds < 0 {
        return "-".to_string();
    }
    if seconds == 0 {
        return "done".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Unix seconds in local time; `0` is the wire's "never".
pub fn format_unix_seconds(timestamp: i64, pattern: &str) -> String {
    if timestamp == 0 {
        return "-".to_string();
    }
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_unix_millis(timestamp: i64, pattern: &str) -> String {
    if timestamp == 0 {
        return "-".to_string();
    }
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_datetime(time: Option<&DateTime<Utc>>, pattern: &str) -> String {
    time.map(|t| t.with_timezone(&Local).format(pattern).to_string())
        .unwrap_or_default()
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

pub fn format_ratio(ratio: f64) -> String {
    if ratio < 0.0 {
        return "-".to_string();
    }
    format!("{ratio:.2}")
}

pub fn format_episode(season: i64, episode: i64) -> String {
    format!("S{season:02}E{episode:02}")
}

/// Looks `code` up in a fixed table, falling back to `"unknown"`.
pub fn label(code: i64, table: &[(i64, &'static str)]) -> &'static str {
    table
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN)
}

/// Caps `text` at `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_use_binary_steps() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_572_864), "1.5 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
        assert_eq!(format_bytes(u64::MAX), "16.0 EB");
        assert_eq!(format_bytes_f64(-4.0), "0 B");
        assert_eq!(format_speed(2048), "2.0 KB/s");
    }

    fn reparse_bytes(text: &str) -> u64 {
        let (number, unit) = text.split_once(' ').unwrap();
        let exp = match unit {
            "B" => 0,
            other => BYTE_UNITS.iter().position(|u| *u == other).unwrap() as i32 + 1,
        };
        (number.parse::<f64>().unwrap() * 1024f64.powi(exp)).round() as u64
    }

    #[test]
    fn formatted_bytes_survive_a_reparse() {
        let mut samples: Vec<u64> = (0..5_000).collect();
        samples.extend(1_048_000..1_049_000);
        for exp in 10..63 {
            let base = 1u64 << exp;
            samples.extend([base - 1, base, base + base / 2, base + base / 3]);
        }
        samples.push(u64::MAX);

        for bytes in samples {
            let once = format_bytes(bytes);
            let twice = format_bytes(reparse_bytes(&once));
            assert_eq!(once, twice, "{bytes} bytes");
        }
        assert_eq!(format_bytes(1_048_575), "1.0 MB");
    }

    #[test]
    fn larger_tiers_never_sort_below_smaller_ones() {
        let tiers = ["B", "KB", "MB", "GB", "TB"];
        let tier = |s: String| {
            let unit = s.rsplit(' ').next().unwrap().to_string();
            tiers.iter().position(|t| *t == unit).unwrap()
        };
        let mut last = 0;
        for exp in 0..40 {
            let current = tier(format_bytes(1u64 << exp));
            assert!(current >= last);
            last = current;
        }
    }

    #[test]
    fn durations_and_positions() {
        assert_eq!(format_duration(0.0), "0m");
        assert_eq!(format_duration(1500.0), "25m");
        assert_eq!(format_duration(12_300.5), "3h 25m");
        assert_eq!(format_time_position(123.0), "2:03");
        assert_eq!(format_time_position(3723.0), "1:02:03");
        assert_eq!(format_runtime(0), "-");
        assert_eq!(format_runtime(45), "45m");
        assert_eq!(format_runtime(142), "2h 22m");
    }

    #[test]
    fn uptime_drops_zero_parts() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(59), "59s");
        assert_eq!(format_uptime(60), "1m");
        assert_eq!(format_uptime(3600), "1h");
        assert_eq!(format_uptime(3661), "1h 1m");
        assert_eq!(format_uptime(86_400), "1d");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
        assert_eq!(format_uptime(86_460), "1d");
    }

    #[test]
    fn eta_rendering() {
        assert_eq!(format_eta(-1), "-");
        assert_eq!(format_eta(-2), "-");
        assert_eq!(format_eta(0), "done");
        assert_eq!(format_eta(42), "42s");
        assert_eq!(format_eta(125), "2m 5s");
        assert_eq!(format_eta(7_380), "2h 3m");
        assert_eq!(format_eta(190_000), "2d 4h");
    }

    #[test]
    fn zero_timestamps_render_as_dash() {
        assert_eq!(format_unix_seconds(0, "%Y-%m-%d"), "-");
        assert_eq!(format_unix_millis(0, "%Y-%m-%d %H:%M"), "-");
        assert_eq!(format_datetime(None, "%Y-%m-%d"), "");

        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        assert_eq!(
            format_unix_seconds(1_700_000_000, "%Y-%m-%d %H:%M:%S"),
            expected
        );
        assert_eq!(
            format_unix_millis(1_700_000_000_000, "%Y-%m-%d %H:%M:%S"),
            expected
        );
    }

    #[test]
    fn percent_ratio_episode() {
        assert_eq!(format_percent(0.5), "50%");
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(0.0), "0%");
        assert_eq!(format_ratio(-1.0), "-");
        assert_eq!(format_ratio(1.5), "1.50");
        assert_eq!(format_episode(1, 2), "S01E02");
        assert_eq!(format_episode(12, 105), "S12E105");
    }

    #[test]
    fn unknown_codes_get_a_label() {
        let table = [(1, "swarm"), (2, "compose")];
        assert_eq!(label(2, &table), "compose");
        assert_eq!(label(9, &table), "unknown");
        assert_eq!(label(-1, &[]), "unknown");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("short", DESCRIPTION_LIMIT), "short");
        let long = "é".repeat(600);
        let cut = truncate(&long, DESCRIPTION_LIMIT);
        assert_eq!(cut.chars().count(), 500);
        assert!(cut.ends_with("..."));
        let exact = "a".repeat(500);
        assert_eq!(truncate(&exact, DESCRIPTION_LIMIT), exact);
    }
}
