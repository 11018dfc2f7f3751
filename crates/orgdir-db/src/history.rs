// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only history shadows for audited entities.
//!
//! Each audited table has a shadow table with the same tracked columns plus
//! `history_id`, `history_date`, `history_change_reason`, `history_type` and
//! `history_user_id`. Repositories call [`append`] inside the transaction of
//! the primary write, so a snapshot exists exactly when the write commits.
//! Shadow rows are never updated or deleted.

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use orgdir_model::{ChangeContext, HistoricalRecord, HistoryId, HistoryType, UserId};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use std::marker::PhantomData;

use crate::error::DbError;
use crate::timestamp;

/// An entity whose mutations are mirrored into a history shadow table.
pub trait Audited: Sized + Send + Unpin + 'static {
	/// Primary table.
	const TABLE: &'static str;
	/// Shadow table.
	const HISTORY_TABLE: &'static str;
	/// Tracked columns, present under the same names in both tables.
	const COLUMNS: &'static [&'static str];

	/// Decode the tracked columns of a primary or shadow row.
	fn from_row(row: &SqliteRow) -> Result<Self, DbError>;
}

/// Comma separated tracked columns of `T`.
pub(crate) fn column_list<T: Audited>() -> String {
	T::COLUMNS.join(", ")
}

/// Snapshot the current row `entity_id` of `T::TABLE` into its shadow table.
///
/// Must run on the connection of the transaction that performed the primary
/// write. For deletions, call before the row is removed.
///
/// # Errors
/// Returns `DbError::NotFound` if the row does not exist and
/// `DbError::ReferentialIntegrity` if the acting user is unknown.
pub(crate) async fn append<T: Audited>(
	conn: &mut SqliteConnection,
	entity_id: i64,
	history_type: HistoryType,
	ctx: &ChangeContext,
	at: DateTime<Utc>,
) -> Result<HistoryId, DbError> {
	let appended = append_where::<T>(conn, "id", entity_id, history_type, ctx, at).await?;
	if appended != 1 {
		return Err(DbError::NotFound(format!(
			"{} row {entity_id} to snapshot",
			T::TABLE
		)));
	}

	let (history_id,): (i64,) = sqlx::query_as("SELECT last_insert_rowid()")
		.fetch_one(&mut *conn)
		.await?;
	let history_id = HistoryId::new(history_id);
	tracing::trace!(
		table = T::HISTORY_TABLE,
		entity_id,
		history_id = %history_id,
		history_type = %history_type,
		"history row appended"
	);
	Ok(history_id)
}

/// Snapshot every row of `T::TABLE` whose `column` equals `value`.
///
/// Returns the number of history rows written.
pub(crate) async fn append_where<T: Audited>(
	conn: &mut SqliteConnection,
	column: &str,
	value: i64,
	history_type: HistoryType,
	ctx: &ChangeContext,
	at: DateTime<Utc>,
) -> Result<u64, DbError> {
	let columns = column_list::<T>();
	let sql = format!(
		"INSERT INTO {history} ({columns}, history_date, history_change_reason, history_type, history_user_id) \
		 SELECT {columns}, ?, ?, ?, ? FROM {table} WHERE {column} = ? ORDER BY id",
		history = T::HISTORY_TABLE,
		table = T::TABLE,
	);

	let result = sqlx::query(&sql)
		.bind(timestamp::encode(at))
		.bind(ctx.reason.as_deref())
		.bind(history_type.code())
		.bind(ctx.user.map(i64::from))
		.bind(value)
		.execute(&mut *conn)
		.await?;

	Ok(result.rows_affected())
}

fn record_from_row<T: Audited>(row: &SqliteRow) -> Result<HistoricalRecord<T>, DbError> {
	let history_type_code: String = row.try_get("history_type")?;
	let history_type = HistoryType::from_code(&history_type_code)
		.ok_or_else(|| DbError::Internal(format!("Invalid history_type: {history_type_code}")))?;
	let history_date: String = row.try_get("history_date")?;
	let history_user: Option<i64> = row.try_get("history_user_id")?;

	Ok(HistoricalRecord {
		history_id: HistoryId::new(row.try_get("history_id")?),
		history_date: timestamp::decode(&history_date, "history_date")?,
		history_type,
		history_change_reason: row.try_get("history_change_reason")?,
		history_user: history_user.map(UserId::new),
		snapshot: T::from_row(row)?,
	})
}

fn order_newest_first(select: &str, extra: &str) -> String {
	format!("{select}{extra} ORDER BY history_date DESC, history_id DESC")
}

/// The history of one entity, newest first.
///
/// Nothing is read until [`stream`](Self::stream) is polled. Every call to
/// `stream` starts a fresh query from the newest row.
pub struct HistoryCursor<T> {
	pool: SqlitePool,
	entity_id: i64,
	select: String,
	stream_sql: String,
	_entity: PhantomData<fn() -> T>,
}

impl<T: Audited> HistoryCursor<T> {
	pub(crate) fn new(pool: SqlitePool, entity_id: i64) -> Self {
		let select = format!(
			"SELECT {columns}, history_id, history_date, history_change_reason, history_type, history_user_id \
			 FROM {history} WHERE id = ?",
			columns = column_list::<T>(),
			history = T::HISTORY_TABLE,
		);
		let stream_sql = order_newest_first(&select, "");
		Self {
			pool,
			entity_id,
			select,
			stream_sql,
			_entity: PhantomData,
		}
	}

	pub fn entity_id(&self) -> i64 {
		self.entity_id
	}

	fn ordered(&self, extra: &str) -> String {
		order_newest_first(&self.select, extra)
	}

	/// Stream snapshots ordered by `(history_date desc, history_id desc)`.
	pub fn stream(&self) -> BoxStream<'_, Result<HistoricalRecord<T>, DbError>> {
		sqlx::query(&self.stream_sql)
			.bind(self.entity_id)
			.fetch(&self.pool)
			.map(|row| {
				row.map_err(DbError::from)
					.and_then(|row| record_from_row::<T>(&row))
			})
			.boxed()
	}

	/// Collect the full history, newest first.
	///
	/// # Errors
	/// Returns `DbError` if the query fails or a row cannot be decoded.
	#[tracing::instrument(skip(self), fields(table = T::HISTORY_TABLE, entity_id = self.entity_id))]
	pub async fn collect(&self) -> Result<Vec<HistoricalRecord<T>>, DbError> {
		self.stream().try_collect().await
	}

	/// The most recent history row.
	///
	/// # Errors
	/// Returns `DbError` if the query fails or the row cannot be decoded.
	#[tracing::instrument(skip(self), fields(table = T::HISTORY_TABLE, entity_id = self.entity_id))]
	pub async fn latest(&self) -> Result<Option<HistoricalRecord<T>>, DbError> {
		let sql = format!("{} LIMIT 1", self.ordered(""));
		let row = sqlx::query(&sql)
			.bind(self.entity_id)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| record_from_row(&r)).transpose()
	}

	/// The entity as it stood at `at`.
	///
	/// `None` if the entity had not been created yet or had been deleted.
	///
	/// # Errors
	/// Returns `DbError` if the query fails or the row cannot be decoded.
	#[tracing::instrument(skip(self), fields(table = T::HISTORY_TABLE, entity_id = self.entity_id))]
	pub async fn as_of(&self, at: DateTime<Utc>) -> Result<Option<T>, DbError> {
		let sql = format!("{} LIMIT 1", self.ordered(" AND history_date <= ?"));
		let row = sqlx::query(&sql)
			.bind(self.entity_id)
			.bind(timestamp::encode(at))
			.fetch_optional(&self.pool)
			.await?;

		match row.map(|r| record_from_row::<T>(&r)).transpose()? {
			Some(record) if record.history_type != HistoryType::Deleted => Ok(Some(record.snapshot)),
			_ => Ok(None),
		}
	}

	/// Number of history rows for the entity.
	///
	/// # Errors
	/// Returns `DbError::Sqlx` if the query fails.
	pub async fn count(&self) -> Result<i64, DbError> {
		let sql = format!(
			"SELECT COUNT(*) FROM {} WHERE id = ?",
			T::HISTORY_TABLE
		);
		let (count,): (i64,) = sqlx::query_as(&sql)
			.bind(self.entity_id)
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}
