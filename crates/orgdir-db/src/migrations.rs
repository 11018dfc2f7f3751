// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embedded schema migrations.
//!
//! The SQL lives in `crates/orgdir-db/migrations/` and is compiled into the
//! binary. `auth_user` and `django_site` are owned by the host application and
//! must exist before the directory schema is applied. A standalone database
//! can get minimal stand-ins from [`create_host_placeholders`].

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;
use crate::schema;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply all pending migrations.
///
/// # Errors
/// - `DbError::ReferentialIntegrity` if a host-owned table is missing
/// - `DbError::Migration` if a migration fails or the applied set has
///   diverged from the embedded one
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	ensure_host_tables(pool).await?;
	MIGRATOR.run(pool).await?;
	tracing::info!(
		migrations = MIGRATOR.iter().count(),
		"directory schema up to date"
	);
	Ok(())
}

async fn ensure_host_tables(pool: &SqlitePool) -> Result<(), DbError> {
	for table in schema::HOST_TABLES {
		let (count,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
				.bind(table)
				.fetch_one(pool)
				.await?;
		if count == 0 {
			tracing::warn!(table, "host table missing");
			return Err(DbError::ReferentialIntegrity(format!(
				"host table {table} does not exist; create it before applying the directory schema"
			)));
		}
	}
	Ok(())
}

/// Create id-only `auth_user` and `django_site` tables where the host has not.
///
/// # Errors
/// Returns `DbError::Sqlx` if a table cannot be created.
#[tracing::instrument(skip(pool))]
pub async fn create_host_placeholders(pool: &SqlitePool) -> Result<(), DbError> {
	for table in schema::HOST_TABLES {
		sqlx::query(&format!(
			"CREATE TABLE IF NOT EXISTS {table} (id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT)"
		))
		.execute(pool)
		.await?;
	}
	tracing::debug!("host placeholder tables ensured");
	Ok(())
}

/// Embedded migration versions and descriptions, in apply order.
pub fn embedded_migrations() -> Vec<(i64, String)> {
	MIGRATOR
		.iter()
		.map(|m| (m.version, m.description.to_string()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{create_external_tables, create_test_pool};
	use crate::OrganizationRepository;
	use orgdir_model::{ChangeContext, NewOrganization};

	#[test]
	fn migrations_are_ordered() {
		let versions: Vec<i64> = embedded_migrations().iter().map(|(v, _)| *v).collect();
		assert_eq!(versions, vec![1, 2]);
	}

	#[tokio::test]
	async fn run_migrations_is_idempotent() {
		let pool = create_test_pool().await;
		create_external_tables(&pool).await;
		run_migrations(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		for table in schema::DIRECTORY_TABLES {
			let (count,): (i64,) =
				sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
					.bind(table)
					.fetch_one(&pool)
					.await
					.unwrap();
			assert_eq!(count, 1, "missing table {table}");
		}
	}

	#[tokio::test]
	async fn run_migrations_without_host_tables_names_the_missing_table() {
		let pool = create_test_pool().await;

		let err = run_migrations(&pool).await.unwrap_err();

		assert!(matches!(&err, DbError::ReferentialIntegrity(msg) if msg.contains("auth_user")));
		let (applied,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
				.bind(schema::ORGANIZATION)
				.fetch_one(&pool)
				.await
				.unwrap();
		assert_eq!(applied, 0);
	}

	#[tokio::test]
	async fn placeholders_make_a_standalone_database_writable() {
		let pool = create_test_pool().await;
		create_host_placeholders(&pool).await.unwrap();
		create_host_placeholders(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let repo = OrganizationRepository::new(pool);
		let org = repo
			.create(&NewOrganization::new("Org", "org"), &ChangeContext::system())
			.await
			.unwrap();
		assert_eq!(repo.latest_history(org.id).await.unwrap().unwrap().snapshot, org);
	}
}
