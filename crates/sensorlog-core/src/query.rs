// Time-range query parsing
//
// Search and count share one request shape:
// `{"limit": int, "skip": int, "startTime": RFC3339, "endTime": RFC3339}`, all optional.
// A missing or unparsable time falls back to a default window ending now;
// a structurally invalid body is an error.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{Result, SensorError};

/// Width of the default search window, counted back from now
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Fractional digits kept on query bounds (microseconds, what Postgres stores)
pub const BOUND_PRECISION_DIGITS: u16 = 6;

/// Query request body as received from the request dispatcher
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Maximum number of records to return. 0 or absent means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Number of matching records to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    /// Inclusive lower bound. Defaults to now minus one day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(example = "2023-12-31T00:00:00Z"))]
    pub start_time: Option<String>,
    /// Inclusive upper bound. Defaults to now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(example = "2024-01-02T00:00:00Z"))]
    pub end_time: Option<String>,
}

impl QueryRequest {
    /// Decode a request body. An empty body (or JSON `null`) means all defaults.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let parsed: Option<Self> = serde_json::from_slice(body)
            .map_err(|e| SensorError::invalid_query(e.to_string()))?;
        Ok(parsed.unwrap_or_default())
    }

    /// Normalize into a concrete query relative to `now`.
    ///
    /// Bounds are truncated to microseconds so every backend compares against
    /// the same instants.
    pub fn normalize(&self, now: DateTime<Utc>) -> EventQuery {
        let start = self
            .start_time
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| now - Duration::hours(DEFAULT_WINDOW_HOURS));
        let end = self
            .end_time
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now);

        EventQuery {
            start: start.trunc_subsecs(BOUND_PRECISION_DIGITS),
            end: end.trunc_subsecs(BOUND_PRECISION_DIGITS),
            limit: self.limit.unwrap_or(0),
            skip: self.skip.unwrap_or(0),
        }
    }
}

/// Parse an RFC 3339 timestamp and normalize it to UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value = %value, error = %e, "Unparsable timestamp, using default");
            None
        }
    }
}

/// Normalized range query over one partition
///
/// `start` and `end` are both inclusive. No ordering between them is enforced;
/// an inverted range simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 0 means unlimited
    pub limit: u64,
    pub skip: u64,
}

impl EventQuery {
    /// Query covering `[start, end]` with no pagination
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            limit: 0,
            skip: 0,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Whether an instant lies inside the inclusive range
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts <= self.end
    }

    /// Limit as an optional bound, `None` when unlimited
    pub fn limit_bound(&self) -> Option<u64> {
        (self.limit > 0).then_some(self.limit)
    }
}
