// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timestamp encoding.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision in UTC, so lexical order in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::DbError;

/// The current instant, truncated to the stored precision.
pub(crate) fn now() -> DateTime<Utc> {
	Utc::now().trunc_subsecs(6)
}

pub(crate) fn encode(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}
