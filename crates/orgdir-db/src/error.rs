// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use orgdir_model::ValidationError;
use sqlx::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Validation error: {0}")]
	Validation(#[from] ValidationError),

	#[error("Uniqueness violation: {0}")]
	Uniqueness(String),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Referential integrity violation: {0}")]
	ReferentialIntegrity(String),

	#[error("Database error: {0}")]
	Sqlx(#[source] sqlx::Error),

	#[error("Migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),

	#[error("Internal: {0}")]
	Internal(String),
}

/// Store-level constraint violations surface with the same kinds as the
/// application pre-checks.
impl From<sqlx::Error> for DbError {
	fn from(err: sqlx::Error) -> Self {
		if let sqlx::Error::Database(db_err) = &err {
			match db_err.kind() {
				ErrorKind::UniqueViolation => return DbError::Uniqueness(db_err.message().to_string()),
				ErrorKind::ForeignKeyViolation => {
					return DbError::ReferentialIntegrity(db_err.message().to_string())
				}
				_ => {}
			}
		}
		DbError::Sqlx(err)
	}
}

impl DbError {
	pub fn is_uniqueness(&self) -> bool {
		matches!(self, DbError::Uniqueness(_))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, DbError::NotFound(_))
	}

	pub fn is_validation(&self) -> bool {
		matches!(self, DbError::Validation(_))
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
