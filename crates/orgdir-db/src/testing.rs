// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use orgdir_model::{SiteId, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::migrations::run_migrations;
use crate::schema;

/// In-memory pool with enforced foreign keys. A single connection keeps every
/// query on the same database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.unwrap()
		.foreign_keys(true);
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap()
}

/// Minimal stand-ins for the host-owned `auth_user` and `django_site` tables.
pub async fn create_external_tables(pool: &SqlitePool) {
	sqlx::query(&format!(
		r#"
		CREATE TABLE IF NOT EXISTS {} (
			id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
			username varchar(150) NOT NULL UNIQUE
		)
		"#,
		schema::AUTH_USER
	))
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(&format!(
		r#"
		CREATE TABLE IF NOT EXISTS {} (
			id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
			domain varchar(100) NOT NULL UNIQUE,
			name varchar(50) NOT NULL
		)
		"#,
		schema::SITE
	))
	.execute(pool)
	.await
	.unwrap();
}

/// Migrated in-memory pool with the external tables in place.
pub async fn create_directory_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	prepare_directory(&pool).await;
	pool
}

/// Create the external tables and apply the directory migrations.
pub async fn prepare_directory(pool: &SqlitePool) {
	create_external_tables(pool).await;
	run_migrations(pool).await.unwrap();
}

pub async fn insert_test_user(pool: &SqlitePool, username: &str) -> UserId {
	let result = sqlx::query(&format!(
		"INSERT INTO {} (username) VALUES (?)",
		schema::AUTH_USER
	))
	.bind(username)
	.execute(pool)
	.await
	.unwrap();
	UserId::new(result.last_insert_rowid())
}

pub async fn delete_test_user(pool: &SqlitePool, user_id: UserId) {
	sqlx::query(&format!("DELETE FROM {} WHERE id = ?", schema::AUTH_USER))
		.bind(user_id.into_inner())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn insert_test_site(pool: &SqlitePool, domain: &str) -> SiteId {
	let result = sqlx::query(&format!(
		"INSERT INTO {} (domain, name) VALUES (?, ?)",
		schema::SITE
	))
	.bind(domain)
	.bind(domain)
	.execute(pool)
	.await
	.unwrap();
	SiteId::new(result.last_insert_rowid())
}
