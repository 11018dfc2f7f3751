// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dynamic WHERE clauses for list queries.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection};

use crate::error::DbError;

pub(crate) const DEFAULT_LIMIT: i64 = 50;
pub(crate) const MAX_LIMIT: i64 = 1000;

/// Resolve a requested page to `(limit, offset)`.
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
	let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
	let offset = offset.unwrap_or(0).max(0);
	(limit, offset)
}

pub(crate) enum Arg {
	Int(i64),
	Text(String),
	Bool(bool),
}

/// Conditions joined with `AND`, each with its bound arguments in order.
#[derive(Default)]
pub(crate) struct Conditions {
	clauses: Vec<String>,
	args: Vec<Arg>,
}

impl Conditions {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn push(&mut self, clause: impl Into<String>, arg: Arg) {
		self.clauses.push(clause.into());
		self.args.push(arg);
	}

	/// Case-insensitive substring match on any of `columns`.
	pub(crate) fn push_search(&mut self, columns: &[&str], term: &str) {
		let pattern = like_pattern(term);
		let clause = columns
			.iter()
			.map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
			.collect::<Vec<_>>()
			.join(" OR ");
		self.clauses.push(format!("({clause})"));
		for _ in columns {
			self.args.push(Arg::Text(pattern.clone()));
		}
	}

	pub(crate) fn where_clause(&self) -> String {
		if self.clauses.is_empty() {
			"1=1".to_string()
		} else {
			self.clauses.join(" AND ")
		}
	}

	pub(crate) fn bind<'q>(
		&'q self,
		mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
	) -> Query<'q, Sqlite, SqliteArguments<'q>> {
		for arg in &self.args {
			query = match arg {
				Arg::Int(v) => query.bind(*v),
				Arg::Text(v) => query.bind(v.as_str()),
				Arg::Bool(v) => query.bind(*v),
			};
		}
		query
	}
}

/// Bump `modified` on row `id` of `table`, taking the write lock.
///
/// Run first in an update transaction so the row read that follows cannot
/// be stale. Returns `false` if the row does not exist.
pub(crate) async fn touch_row(
	conn: &mut SqliteConnection,
	table: &str,
	id: i64,
	modified: &str,
) -> Result<bool, DbError> {
	let sql = format!("UPDATE {table} SET modified = ? WHERE id = ?");
	let result = sqlx::query(&sql)
		.bind(modified)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected() > 0)
}

/// Whether a row of `table` other than `except` uses `short_name`.
pub(crate) async fn short_name_taken(
	conn: &mut SqliteConnection,
	table: &str,
	short_name: &str,
	except: i64,
) -> Result<bool, DbError> {
	let sql = format!("SELECT COUNT(*) FROM {table} WHERE short_name = ? AND id != ?");
	let (count,): (i64,) = sqlx::query_as(&sql)
		.bind(short_name)
		.bind(except)
		.fetch_one(&mut *conn)
		.await?;
	Ok(count > 0)
}

fn like_pattern(term: &str) -> String {
	let mut escaped = String::with_capacity(term.len() + 2);
	escaped.push('%');
	for c in term.chars() {
		if matches!(c, '\\' | '%' | '_') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped.push('%');
	escaped
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn page_defaults_and_clamps() {
		assert_eq!(page(None, None), (50, 0));
		assert_eq!(page(Some(5000), Some(10)), (1000, 10));
		assert_eq!(page(Some(0), Some(-3)), (1, 0));
	}

	#[test]
	fn like_pattern_escapes_wildcards() {
		assert_eq!(like_pattern("edX"), "%edX%");
		assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
	}

	#[test]
	fn empty_conditions_match_everything() {
		let mut conditions = Conditions::new();
		assert_eq!(conditions.where_clause(), "1=1");

		conditions.push("active = ?", Arg::Bool(true));
		conditions.push_search(&["name", "short_name"], "x");
		assert_eq!(
			conditions.where_clause(),
			"active = ? AND (name LIKE ? ESCAPE '\\' OR short_name LIKE ? ESCAPE '\\')"
		);
		assert_eq!(conditions.args.len(), 3);
	}
}
