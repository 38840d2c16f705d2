//! Token matchers for the overlay fields.
//!
//! Matching is order-independent across the line and first-match-wins per
//! field: a second token that looks like a date lands in `unrecognized`
//! instead of overwriting the first. A malformed line never errors, it just
//! yields fewer fields.

use chrono::{NaiveDate, NaiveTime};

use super::normalize::normalize_overlay_text;

/// Sanity band for overlay temperatures, degrees Celsius.
pub const TEMPERATURE_RANGE_C: (f64, f64) = (-40.0, 60.0);

/// Sanity band for overlay barometric pressure, inches of mercury.
pub const PRESSURE_RANGE_INHG: (f64, f64) = (25.0, 35.0);

/// Typed candidate fields parsed from one overlay line. Absence is not an
/// error; the parser carries no per-field confidence beyond present/absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayFields {
    /// Canonical camera token, e.g. `TRAILCAM05`.
    pub camera_token: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub temperature_c: Option<f64>,
    pub pressure_inhg: Option<f64>,
    /// Tokens that matched no field, matched an already-filled field, or
    /// failed a sanity range.
    pub unrecognized: Vec<String>,
    /// Normalized line the fields were parsed from; kept for logs.
    pub raw_text: String,
}

/// Parse one raw recognized overlay line into typed fields.
pub fn parse_overlay(raw: &str) -> OverlayFields {
    let text = normalize_overlay_text(raw);
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let mut fields = OverlayFields {
        raw_text: text.clone(),
        ..Default::default()
    };

    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        let next = tokens.get(i + 1).copied();

        if let Some(date) = match_date(tok) {
            if fields.date.is_none() {
                fields.date = Some(date);
            } else {
                fields.unrecognized.push(tok.to_string());
            }
            i += 1;
            continue;
        }

        if let Some((time, consumed_next)) = match_time(tok, next) {
            if fields.time.is_none() {
                fields.time = Some(time);
                i += if consumed_next { 2 } else { 1 };
            } else {
                fields.unrecognized.push(tok.to_string());
                i += 1;
            }
            continue;
        }

        if let Some(value) = match_temperature(tok) {
            if fields.temperature_c.is_none() && in_range(value, TEMPERATURE_RANGE_C) {
                fields.temperature_c = Some(value);
            } else {
                fields.unrecognized.push(tok.to_string());
            }
            i += 1;
            continue;
        }

        if let Some((value, consumed_next)) = match_pressure(tok, next) {
            if fields.pressure_inhg.is_none() && in_range(value, PRESSURE_RANGE_INHG) {
                fields.pressure_inhg = Some(value);
                i += if consumed_next { 2 } else { 1 };
            } else {
                // The unit token, if separate, falls out as unrecognized too.
                fields.unrecognized.push(tok.to_string());
                i += 1;
            }
            continue;
        }

        if let Some(token) = normalize_camera_token(tok) {
            if fields.camera_token.is_none() {
                fields.camera_token = Some(token);
            } else {
                fields.unrecognized.push(tok.to_string());
            }
            i += 1;
            continue;
        }

        fields.unrecognized.push(tok.to_string());
        i += 1;
    }

    fields
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    value >= min && value <= max
}

/// `MM/DD/YYYY` with 1-2 digit month/day and a 4-digit year. Impossible
/// calendar dates fail here and end up unrecognized.
fn match_date(tok: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = tok.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let (m, d, y) = (parts[0], parts[1], parts[2]);
    if m.is_empty() || m.len() > 2 || d.is_empty() || d.len() > 2 || y.len() != 4 {
        return None;
    }
    if ![m, d, y].iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// `HH:MM[:SS]` with an attached or following `AM`/`PM`. Returns the time in
/// 24-hour form and whether the meridiem was consumed from the next token.
fn match_time(tok: &str, next: Option<&str>) -> Option<(NaiveTime, bool)> {
    let (body, attached_pm) = if let Some(b) = tok.strip_suffix("AM") {
        (b, Some(false))
    } else if let Some(b) = tok.strip_suffix("PM") {
        (b, Some(true))
    } else {
        (tok, None)
    };

    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }
    if parts[0].is_empty() || parts[0].len() > 2 {
        return None;
    }
    if parts[1..].iter().any(|p| p.len() != 2) {
        return None;
    }
    if !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let mut hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: u32 = if parts.len() == 3 {
        parts[2].parse().ok()?
    } else {
        0
    };

    let (meridiem, consumed_next) = match attached_pm {
        Some(pm) => (Some(pm), false),
        None => match next {
            Some("AM") => (Some(false), true),
            Some("PM") => (Some(true), true),
            _ => (None, false),
        },
    };

    if let Some(pm) = meridiem {
        if hour == 0 || hour > 12 {
            return None;
        }
        hour = match (pm, hour) {
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, 12) => 0,
            (false, h) => h,
        };
    }

    NaiveTime::from_hms_opt(hour, minute, second).map(|t| (t, consumed_next))
}

/// A numeral directly followed by the Celsius marker, e.g. `14.2C`.
fn match_temperature(tok: &str) -> Option<f64> {
    let body = tok.strip_suffix('C')?;
    parse_decimal(body)
}

/// A numeral carrying the inHg marker, attached (`29.87INHG`) or as the
/// following token.
fn match_pressure(tok: &str, next: Option<&str>) -> Option<(f64, bool)> {
    if let Some(body) = tok.strip_suffix("INHG") {
        return parse_decimal(body).map(|v| (v, false));
    }
    if next == Some("INHG") {
        return parse_decimal(tok).map(|v| (v, true));
    }
    None
}

/// Locale-invariant decimal: optional leading `-`, digits, at most one `.`.
fn parse_decimal(s: &str) -> Option<f64> {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.is_empty() || body.chars().filter(|c| *c == '.').count() > 1 {
        return None;
    }
    if !body.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Normalize a camera token to its canonical letter-prefix +
/// zero-padded-digit-suffix form.
///
/// The recognizer confuses `O`, `Q` and `D` for `0` inside numeric IDs, so
/// those substitutions apply to the suffix only — the alphabetic prefix is
/// kept verbatim. `TRAILCAMQ5` -> `TRAILCAM05`, `TRAILCAM105` stays.
/// Normalization is idempotent.
pub fn normalize_camera_token(raw: &str) -> Option<String> {
    let tok: String = raw
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .collect();
    if tok.is_empty() || !tok.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    // The numeric suffix is the trailing run of digits and digit-confusable
    // letters; everything before it must be a plain alphabetic prefix.
    let mut start = tok.len();
    for (idx, ch) in tok.char_indices().rev() {
        if ch.is_ascii_digit() || matches!(ch, 'O' | 'Q' | 'D') {
            start = idx;
        } else {
            break;
        }
    }

    let prefix = &tok[..start];
    let suffix = &tok[start..];
    if suffix.is_empty() || suffix.len() > 3 {
        return None;
    }
    // A pure O/Q/D run is a word ending, not an ID.
    if !suffix.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if prefix.len() < 2 || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let digits: String = suffix
        .chars()
        .map(|c| match c {
            'O' | 'Q' | 'D' => '0',
            other => other,
        })
        .collect();
    let n: u32 = digits.parse().ok()?;

    if n < 100 {
        Some(format!("{prefix}{n:02}"))
    } else {
        Some(format!("{prefix}{n}"))
    }
}
