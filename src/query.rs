//! Query Intent Builder.
//!
//! Turns user-facing filter state into a normalized canonical query and a
//! stable serialized form. The serialized string doubles as the reactive
//! dependency key for resources and as the wire query string, so it must
//! be byte-stable for equal inputs: fields appear in insertion order and
//! empty values are omitted entirely rather than serialized as `key=`.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

// ---------------------------------------------------------------------------
// Date presets
// ---------------------------------------------------------------------------

/// Relative date-range presets offered by the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePreset {
    /// Trailing 7 days.
    D7,
    /// Trailing 30 days.
    D30,
    /// Trailing 90 days.
    D90,
    /// Year to date.
    Ytd,
}

impl FromStr for DatePreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" => Ok(Self::D7),
            "30d" => Ok(Self::D30),
            "90d" => Ok(Self::D90),
            "ytd" => Ok(Self::Ytd),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DatePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::D7 => write!(f, "7d"),
            Self::D30 => write!(f, "30d"),
            Self::D90 => write!(f, "90d"),
            Self::Ytd => write!(f, "ytd"),
        }
    }
}

/// Resolve a preset into a concrete `[from, to]` window anchored at `now`.
///
/// Pure and total over the enumerated presets. `now` is explicit so that
/// resolving the same intent twice within one pass yields the same window.
pub fn resolve_date_range(
    preset: DatePreset,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = match preset {
        DatePreset::D7 => now - Duration::days(7),
        DatePreset::D30 => now - Duration::days(30),
        DatePreset::D90 => now - Duration::days(90),
        DatePreset::Ytd => Utc
            .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(now),
    };
    (from, now)
}

/// Parse a preset label, failing closed to "no range applied".
///
/// An unknown label is a display concern, not a correctness one, so it is
/// logged and dropped rather than propagated as an error.
pub fn parse_preset(label: &str) -> Option<DatePreset> {
    match DatePreset::from_str(label) {
        Ok(preset) => Some(preset),
        Err(()) => {
            warn!(preset = label, "unknown date preset; applying no range");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Media type
// ---------------------------------------------------------------------------

/// Media-type filter. `All` is a sentinel meaning "omit the filter".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    #[default]
    All,
    Tv,
    Radio,
    Online,
    OutOfHome,
}

impl MediaType {
    /// Wire value, or `None` for the `All` sentinel.
    pub fn wire_value(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Tv => Some("TV"),
            Self::Radio => Some("RADIO"),
            Self::Online => Some("ONLINE"),
            Self::OutOfHome => Some("OUT_OF_HOME"),
        }
    }
}

// ---------------------------------------------------------------------------
// Intent and canonical query
// ---------------------------------------------------------------------------

/// User-facing filter state, exactly as entered. Immutable value; all
/// normalization happens in [`build_canonical`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryIntent {
    pub date_preset: String,
    pub free_text: String,
    pub city: String,
    pub media_type: MediaType,
}

/// Normalized, omission-clean filter state. Optional fields are absent
/// (never empty-stringed) when the intent carried nothing meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Derive the canonical query from an intent.
///
/// Trims every string field, drops empties, resolves the date preset
/// against `now`, and maps the `All` media-type sentinel to omission.
/// Re-deriving from the same `(intent, now)` is byte-identical.
pub fn build_canonical(intent: &QueryIntent, now: DateTime<Utc>) -> CanonicalQuery {
    let range = parse_preset(&intent.date_preset).map(|p| resolve_date_range(p, now));
    CanonicalQuery {
        date_from: range.map(|(from, _)| from),
        date_to: range.map(|(_, to)| to),
        q: non_empty(&intent.free_text),
        city: non_empty(&intent.city),
        media_type: intent.media_type.wire_value().map(str::to_string),
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl CanonicalQuery {
    /// Serialize to a query string in fixed insertion order, merging
    /// `extra` pagination/sort entries on top. Entries whose value trims
    /// to empty are omitted — the output never contains `key=`.
    pub fn serialize(&self, extra: &[(&str, Option<String>)]) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    parts.push(format!("{key}={}", urlencoding::encode(trimmed)));
                }
            }
        };
        push("dateFrom", self.date_from.map(|d| d.to_rfc3339()));
        push("dateTo", self.date_to.map(|d| d.to_rfc3339()));
        push("q", self.q.clone());
        push("city", self.city.clone());
        push("mediaType", self.media_type.clone());
        for (key, value) in extra {
            push(key, value.clone());
        }
        parts.join("&")
    }
}
