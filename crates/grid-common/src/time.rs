//! Time axes and CF time-unit handling.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GridError, GridResult};

/// A regular time axis: `count` instants spaced `step_secs` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAxis {
    /// Instant of the first timestep
    pub start: NaiveDateTime,
    /// Step length in seconds
    pub step_secs: i64,
    /// Number of timesteps
    pub count: usize,
}

impl TimeAxis {
    pub fn new(start: NaiveDateTime, step_secs: i64, count: usize) -> GridResult<Self> {
        if step_secs <= 0 {
            return Err(GridError::InvalidGrid(format!(
                "timestep length must be positive, got {}s",
                step_secs
            )));
        }
        if count == 0 {
            return Err(GridError::InvalidGrid(
                "time axis needs at least one timestep".to_string(),
            ));
        }
        Ok(Self {
            start,
            step_secs,
            count,
        })
    }

    /// Instant of the zero-based step `index`.
    pub fn instant(&self, index: usize) -> NaiveDateTime {
        self.start + Duration::seconds(self.step_secs * index as i64)
    }

    /// Instant of the last timestep.
    pub fn end(&self) -> NaiveDateTime {
        self.instant(self.count - 1)
    }

    /// All instants of the axis in order.
    pub fn instants(&self) -> Vec<NaiveDateTime> {
        (0..self.count).map(|i| self.instant(i)).collect()
    }

    /// Default units: seconds since the first timestep.
    pub fn default_units(&self) -> TimeUnits {
        TimeUnits {
            unit: TimeUnit::Seconds,
            epoch: self.start,
        }
    }

    /// Numeric offsets of every instant expressed in `units`.
    pub fn offsets(&self, units: &TimeUnits) -> Vec<f64> {
        (0..self.count).map(|i| units.offset(self.instant(i))).collect()
    }
}

/// Unit part of a CF time specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => Some(Self::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(Self::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(Self::Hours),
            "days" | "day" | "d" => Some(Self::Days),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    /// Length of one unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86400.0,
        }
    }
}

/// A parsed CF time unit string such as `"days since 1900-01-01 00:00:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    /// Reference instant, normalised to UTC
    pub epoch: NaiveDateTime,
}

impl TimeUnits {
    /// Parse a CF units string.
    ///
    /// Accepts formats like:
    /// - "seconds since 2000-01-01"
    /// - "hours since 2000-01-01 06:00:00"
    /// - "days since 1900-01-01T00:00:00Z"
    /// - "seconds since 2000-01-01 00:00:00.0 00:00"
    pub fn parse(s: &str) -> GridResult<Self> {
        let invalid = |message: &str| GridError::InvalidTimeUnits {
            units: s.to_string(),
            message: message.to_string(),
        };

        let mut tokens = s.split_whitespace();
        let unit = tokens
            .next()
            .and_then(TimeUnit::from_str)
            .ok_or_else(|| invalid("unknown time unit"))?;

        match tokens.next() {
            Some(since) if since.eq_ignore_ascii_case("since") => {}
            _ => return Err(invalid("expected 'since'")),
        }

        let date_token = tokens.next().ok_or_else(|| invalid("missing reference date"))?;

        // "2000-01-01T06:00:00Z" carries date and time in one token
        let (date_part, mut time_part) = match date_token.split_once('T') {
            Some((d, t)) => (d, Some(t.to_string())),
            None => (date_token, None),
        };

        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| invalid("reference date must be YYYY-MM-DD"))?;

        let mut zone: Option<String> = None;
        if time_part.is_none() {
            time_part = tokens.next().map(|t| t.to_string());
        }
        if let Some(t) = time_part.as_mut() {
            if let Some(stripped) = t.strip_suffix('Z') {
                *t = stripped.to_string();
                zone = Some("UTC".to_string());
            }
        }
        if let Some(z) = tokens.next() {
            zone = Some(z.to_string());
        }
        if tokens.next().is_some() {
            return Err(invalid("trailing tokens"));
        }

        let time = match time_part {
            Some(t) => parse_clock(&t).ok_or_else(|| invalid("reference time must be HH:MM[:SS[.f]]"))?,
            None => NaiveTime::MIN,
        };

        let offset = match zone {
            Some(z) => parse_zone(&z).ok_or_else(|| invalid("unrecognised time zone"))?,
            None => Duration::zero(),
        };

        Ok(Self {
            unit,
            epoch: NaiveDateTime::new(date, time) - offset,
        })
    }

    /// Offset of `instant` from the epoch, in this unit.
    pub fn offset(&self, instant: NaiveDateTime) -> f64 {
        let delta = instant - self.epoch;
        delta.num_milliseconds() as f64 / 1000.0 / self.unit.seconds()
    }

    /// Instant corresponding to a numeric offset.
    pub fn instant(&self, offset: f64) -> NaiveDateTime {
        let millis = (offset * self.unit.seconds() * 1000.0).round() as i64;
        self.epoch + Duration::milliseconds(millis)
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.as_str(),
            self.epoch.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn parse_zone(s: &str) -> Option<Duration> {
    if s.eq_ignore_ascii_case("UTC") || s.eq_ignore_ascii_case("GMT") || s == "Z" {
        return Some(Duration::zero());
    }

    let (sign, body) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => (1, s),
    };
    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (body.parse::<i32>().ok()?, 0),
    };
    let secs = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(secs).map(|o| Duration::seconds(o.local_minus_utc() as i64))
}

/// Calendars the time axis can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    #[default]
    Gregorian,
    Standard,
    ProlepticGregorian,
}

impl Calendar {
    /// Parse from string (case-insensitive). Non-Gregorian model calendars are rejected.
    pub fn parse(s: &str) -> GridResult<Self> {
        match s.to_lowercase().as_str() {
            "gregorian" => Ok(Self::Gregorian),
            "standard" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            _ => Err(GridError::UnsupportedCalendar(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gregorian => "gregorian",
            Self::Standard => "standard",
            Self::ProlepticGregorian => "proleptic_gregorian",
        }
    }
}
