// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durations in XML schema format, as written to the result stream.
//!
//! Consumers of the result stream expect `Duration` fields formatted as XML schema durations:
//! `PT0S`, `PT0.25S`, `PT1H2M3.5S`. Only the day and time components are supported; year and
//! month components have no fixed length and are rejected.

use crate::errors::DurationParseError;
use std::{fmt::Write as _, time::Duration};

const NANOS_PER_SEC: u32 = 1_000_000_000;
const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Formats a duration in XML schema format.
///
/// The output uses hour, minute and second components, omitting zero components. Fractional
/// seconds are written with up to nine digits and no trailing zeroes.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if total_secs == 0 && nanos == 0 {
        return "PT0S".to_owned();
    }

    let hours = total_secs / SECS_PER_HOUR;
    let minutes = (total_secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = total_secs % SECS_PER_MINUTE;

    let mut out = String::from("PT");
    // Writing to a String is infallible.
    if hours > 0 {
        let _ = write!(out, "{hours}H");
    }
    if minutes > 0 {
        let _ = write!(out, "{minutes}M");
    }
    if secs > 0 || nanos > 0 {
        let _ = write!(out, "{secs}");
        if nanos > 0 {
            let frac = format!("{nanos:09}");
            let _ = write!(out, ".{}", frac.trim_end_matches('0'));
        }
        out.push('S');
    }
    out
}

/// Parses a duration in XML schema format.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let err = |reason| DurationParseError::new(input, reason);

    let rest = input
        .strip_prefix('P')
        .ok_or_else(|| err("duration must start with `P`"))?;
    if rest.is_empty() {
        return Err(err("duration has no components"));
    }

    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(err("`T` must be followed by a time component"));
            }
            (date, Some(time))
        }
        None => (rest, None),
    };

    let mut total = Duration::ZERO;
    if !date.is_empty() {
        let days = date
            .strip_suffix('D')
            .ok_or_else(|| err("only day components are supported before `T`"))?;
        let days = parse_integer(days).ok_or_else(|| err("invalid day count"))?;
        total += Duration::from_secs(
            days.checked_mul(SECS_PER_DAY)
                .ok_or_else(|| err("duration overflows"))?,
        );
    }

    if let Some(mut time) = time {
        // Components must appear in H, M, S order, each at most once.
        let mut next_allowed = 0;
        while !time.is_empty() {
            let pos = time
                .find(['H', 'M', 'S'])
                .ok_or_else(|| err("time component is missing its unit"))?;
            let (value, unit) = (&time[..pos], &time[pos..pos + 1]);
            time = &time[pos + 1..];

            let order = match unit {
                "H" => 0,
                "M" => 1,
                _ => 2,
            };
            if order < next_allowed {
                return Err(err("time components are out of order or repeated"));
            }
            next_allowed = order + 1;

            let component = match unit {
                "H" => hours_or_minutes(value, SECS_PER_HOUR),
                "M" => hours_or_minutes(value, SECS_PER_MINUTE),
                _ => parse_seconds(value),
            }
            .ok_or_else(|| err("invalid time component"))?;
            total = total
                .checked_add(component)
                .ok_or_else(|| err("duration overflows"))?;
        }
    }

    Ok(total)
}

fn parse_integer(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn hours_or_minutes(value: &str, unit_secs: u64) -> Option<Duration> {
    let count = parse_integer(value)?;
    Some(Duration::from_secs(count.checked_mul(unit_secs)?))
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (value, None),
    };
    let secs = parse_integer(whole)?;
    let nanos = match frac {
        Some(frac) => {
            if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let digits: u32 = frac.parse().ok()?;
            digits * 10u32.pow(9 - frac.len() as u32)
        }
        None => 0,
    };
    debug_assert!(nanos < NANOS_PER_SEC);
    Some(Duration::new(secs, nanos))
}

/// Serde support for durations in XML schema format.
///
/// Use with `#[serde(with = "conventest_metadata::xsd_duration")]`.
pub mod xsd_duration {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as an XML schema duration string.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    /// Deserializes a duration from an XML schema duration string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
