// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit history types.
//!
//! Every mutation of an audited entity appends one [`HistoricalRecord`]
//! holding a full snapshot of the row plus who changed it, when, why, and
//! how ([`HistoryType`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{HistoryId, HistoryType, UserId};
use crate::validation::{validate_change_reason, ValidationError};

/// Who is making a change and why. Recorded on the history row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeContext {
	pub user: Option<UserId>,
	pub reason: Option<String>,
}

impl ChangeContext {
	/// A change with no attributed user or reason.
	pub fn system() -> Self {
		Self::default()
	}

	pub fn by(user: UserId) -> Self {
		Self {
			user: Some(user),
			reason: None,
		}
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());
		self
	}

	/// # Errors
	/// Returns a `history_change_reason` error when the reason is too long.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if let Some(reason) = &self.reason {
			validate_change_reason(reason)?;
		}
		Ok(())
	}
}

/// One row of an entity's history: the entity as it was after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord<T> {
	pub history_id: HistoryId,
	pub history_date: DateTime<Utc>,
	pub history_type: HistoryType,
	pub history_change_reason: Option<String>,
	/// Acting user. Cleared when that user is deleted.
	pub history_user: Option<UserId>,
	pub snapshot: T,
}
