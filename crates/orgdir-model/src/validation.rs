// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Pre-persist validation for directory fields.
//!
//! Every input type runs these checks before the repository layer touches the
//! database, so a rejected write never leaves a partial row behind.

use regex::Regex;
use std::sync::LazyLock;

static SHORT_NAME_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._-]*$").unwrap());

static ZIPCODE_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(\d{5}(-\d{4})?)$").unwrap());

/// Maximum length of name, short name, city, course id and logo columns.
pub const MAX_CHAR_LEN: usize = 255;

/// Maximum length of the zipcode column.
pub const MAX_ZIPCODE_LEN: usize = 10;

/// Maximum length of a history change reason.
pub const MAX_CHANGE_REASON_LEN: usize = 100;

pub const SHORT_NAME_MESSAGE: &str = "Please do not use spaces or special characters in the short name \
	 field. Only allowed special characters are period (.), hyphen (-) and underscore (_).";

/// A field value rejected before persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
	pub field: &'static str,
	pub message: String,
}

impl ValidationError {
	pub fn new(field: &'static str, message: impl Into<String>) -> Self {
		Self {
			field,
			message: message.into(),
		}
	}
}

/// Reject values longer than `max` characters.
pub fn validate_max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
	let len = value.chars().count();
	if len > max {
		return Err(ValidationError::new(
			field,
			format!("must be at most {max} characters (got {len})"),
		));
	}
	Ok(())
}

/// Reject empty values and values longer than `max` characters.
pub fn validate_required(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
	if value.is_empty() {
		return Err(ValidationError::new(field, "must not be empty"));
	}
	validate_max_len(field, value, max)
}

/// Short names may only contain ASCII letters, digits, `.`, `-` and `_`.
pub fn validate_short_name(value: &str) -> Result<(), ValidationError> {
	validate_required("short_name", value, MAX_CHAR_LEN)?;
	if !SHORT_NAME_REGEX.is_match(value) {
		return Err(ValidationError::new("short_name", SHORT_NAME_MESSAGE));
	}
	Ok(())
}

/// US zipcode in `12345` or `12345-6789` form.
pub fn validate_zipcode(value: &str) -> Result<(), ValidationError> {
	if !ZIPCODE_REGEX.is_match(value) {
		return Err(ValidationError::new("zipcode", "Must be a valid zipcode"));
	}
	Ok(())
}

/// Logo references are opaque storage paths; only the length is checked.
pub fn validate_logo(value: &str) -> Result<(), ValidationError> {
	validate_max_len("logo", value, MAX_CHAR_LEN)
}

pub fn validate_change_reason(value: &str) -> Result<(), ValidationError> {
	validate_max_len("history_change_reason", value, MAX_CHANGE_REASON_LEN)
}
