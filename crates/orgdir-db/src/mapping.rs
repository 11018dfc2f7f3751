// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User to organization mapping repository.
//!
//! Mappings carry no history shadow. A user holds at most one mapping per
//! organization; the store has no unique index for the pair, so the insert
//! itself checks for an existing grant.

use async_trait::async_trait;
use orgdir_model::{
	MappingFilter, MappingFlags, MappingId, OrganizationId, UserId, UserOrganizationMapping,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::DbError;
use crate::query::{page, Arg, Conditions};
use crate::schema;

const MAPPING_COLUMNS: &str = "id, user_id, organization_id, is_active, is_amc_admin";

#[async_trait]
pub trait MappingStore: Send + Sync {
	async fn grant(
		&self,
		user_id: UserId,
		organization_id: OrganizationId,
		flags: MappingFlags,
	) -> Result<UserOrganizationMapping, DbError>;
	async fn get(&self, id: MappingId) -> Result<Option<UserOrganizationMapping>, DbError>;
	async fn get_for(
		&self,
		user_id: UserId,
		organization_id: OrganizationId,
	) -> Result<Option<UserOrganizationMapping>, DbError>;
	async fn list(&self, filter: &MappingFilter) -> Result<Vec<UserOrganizationMapping>, DbError>;
	async fn set_flags(
		&self,
		id: MappingId,
		flags: MappingFlags,
	) -> Result<UserOrganizationMapping, DbError>;
	async fn revoke(&self, id: MappingId) -> Result<(), DbError>;
}

#[derive(Clone)]
pub struct MappingRepository {
	pool: SqlitePool,
}

impl MappingRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	fn row_to_mapping(row: &SqliteRow) -> Result<UserOrganizationMapping, DbError> {
		Ok(UserOrganizationMapping {
			id: MappingId::new(row.try_get("id")?),
			user_id: UserId::new(row.try_get("user_id")?),
			organization_id: OrganizationId::new(row.try_get("organization_id")?),
			is_active: row.try_get("is_active")?,
			is_amc_admin: row.try_get("is_amc_admin")?,
		})
	}

	/// Grant a user access to an organization.
	///
	/// # Errors
	/// - `DbError::NotFound` if the organization does not exist
	/// - `DbError::Uniqueness` if the user already has a mapping for it
	/// - `DbError::ReferentialIntegrity` if the user does not exist
	#[tracing::instrument(skip(self), fields(user_id = %user_id, org_id = %organization_id))]
	pub async fn grant(
		&self,
		user_id: UserId,
		organization_id: OrganizationId,
		flags: MappingFlags,
	) -> Result<UserOrganizationMapping, DbError> {
		let (org_count,): (i64,) = sqlx::query_as(&format!(
			"SELECT COUNT(*) FROM {} WHERE id = ?",
			schema::ORGANIZATION
		))
		.bind(organization_id.into_inner())
		.fetch_one(&self.pool)
		.await?;
		if org_count == 0 {
			return Err(DbError::NotFound(format!("organization {organization_id}")));
		}

		let sql = format!(
			"INSERT INTO {table} (user_id, organization_id, is_active, is_amc_admin) \
			 SELECT ?, ?, ?, ? WHERE NOT EXISTS \
			 (SELECT 1 FROM {table} WHERE user_id = ? AND organization_id = ?) \
			 RETURNING {MAPPING_COLUMNS}",
			table = schema::USER_ORGANIZATION_MAPPING,
		);
		let row = sqlx::query(&sql)
			.bind(user_id.into_inner())
			.bind(organization_id.into_inner())
			.bind(flags.is_active)
			.bind(flags.is_amc_admin)
			.bind(user_id.into_inner())
			.bind(organization_id.into_inner())
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| {
				DbError::Uniqueness(format!(
					"user {user_id} already mapped to organization {organization_id}"
				))
			})?;

		let mapping = Self::row_to_mapping(&row)?;
		tracing::debug!(mapping_id = %mapping.id, "user organization mapping granted");
		Ok(mapping)
	}

	#[tracing::instrument(skip(self), fields(mapping_id = %id))]
	pub async fn get(&self, id: MappingId) -> Result<Option<UserOrganizationMapping>, DbError> {
		let sql = format!(
			"SELECT {MAPPING_COLUMNS} FROM {} WHERE id = ?",
			schema::USER_ORGANIZATION_MAPPING
		);
		let row = sqlx::query(&sql)
			.bind(id.into_inner())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| Self::row_to_mapping(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, org_id = %organization_id))]
	pub async fn get_for(
		&self,
		user_id: UserId,
		organization_id: OrganizationId,
	) -> Result<Option<UserOrganizationMapping>, DbError> {
		let sql = format!(
			"SELECT {MAPPING_COLUMNS} FROM {} WHERE user_id = ? AND organization_id = ? ORDER BY id LIMIT 1",
			schema::USER_ORGANIZATION_MAPPING
		);
		let row = sqlx::query(&sql)
			.bind(user_id.into_inner())
			.bind(organization_id.into_inner())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| Self::row_to_mapping(&r)).transpose()
	}

	/// List mappings ordered by id.
	#[tracing::instrument(skip(self, filter))]
	pub async fn list(&self, filter: &MappingFilter) -> Result<Vec<UserOrganizationMapping>, DbError> {
		let mut conditions = Conditions::new();
		if let Some(user_id) = filter.user_id {
			conditions.push("user_id = ?", Arg::Int(user_id.into_inner()));
		}
		if let Some(organization_id) = filter.organization_id {
			conditions.push("organization_id = ?", Arg::Int(organization_id.into_inner()));
		}
		if let Some(is_active) = filter.is_active {
			conditions.push("is_active = ?", Arg::Bool(is_active));
		}
		if let Some(is_amc_admin) = filter.is_amc_admin {
			conditions.push("is_amc_admin = ?", Arg::Bool(is_amc_admin));
		}
		let (limit, offset) = page(filter.limit, filter.offset);

		let sql = format!(
			"SELECT {MAPPING_COLUMNS} FROM {} WHERE {} ORDER BY id LIMIT ? OFFSET ?",
			schema::USER_ORGANIZATION_MAPPING,
			conditions.where_clause(),
		);
		let rows = conditions
			.bind(sqlx::query(&sql))
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(Self::row_to_mapping).collect()
	}

	/// # Errors
	/// Returns `DbError::NotFound` if the mapping does not exist.
	#[tracing::instrument(skip(self), fields(mapping_id = %id))]
	pub async fn set_flags(
		&self,
		id: MappingId,
		flags: MappingFlags,
	) -> Result<UserOrganizationMapping, DbError> {
		let sql = format!(
			"UPDATE {} SET is_active = ?, is_amc_admin = ? WHERE id = ? RETURNING {MAPPING_COLUMNS}",
			schema::USER_ORGANIZATION_MAPPING
		);
		let row = sqlx::query(&sql)
			.bind(flags.is_active)
			.bind(flags.is_amc_admin)
			.bind(id.into_inner())
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("user organization mapping {id}")))?;

		tracing::debug!(mapping_id = %id, is_active = flags.is_active, is_amc_admin = flags.is_amc_admin, "mapping flags set");
		Self::row_to_mapping(&row)
	}

	/// # Errors
	/// Returns `DbError::NotFound` if the mapping does not exist.
	#[tracing::instrument(skip(self), fields(mapping_id = %id))]
	pub async fn revoke(&self, id: MappingId) -> Result<(), DbError> {
		let sql = format!(
			"DELETE FROM {} WHERE id = ?",
			schema::USER_ORGANIZATION_MAPPING
		);
		let result = sqlx::query(&sql)
			.bind(id.into_inner())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user organization mapping {id}")));
		}
		tracing::debug!(mapping_id = %id, "mapping revoked");
		Ok(())
	}
}

#[async_trait]
impl MappingStore for MappingRepository {
	async fn grant(
		&self,
		user_id: UserId,
		organization_id: OrganizationId,
		flags: MappingFlags,
	) -> Result<UserOrganizationMapping, DbError> {
		self.grant(user_id, organization_id, flags).await
	}

	async fn get(&self, id: MappingId) -> Result<Option<UserOrganizationMapping>, DbError> {
		self.get(id).await
	}

	async fn get_for(
		&self,
		user_id: UserId,
		organization_id: OrganizationId,
	) -> Result<Option<UserOrganizationMapping>, DbError> {
		self.get_for(user_id, organization_id).await
	}

	async fn list(&self, filter: &MappingFilter) -> Result<Vec<UserOrganizationMapping>, DbError> {
		self.list(filter).await
	}

	async fn set_flags(
		&self,
		id: MappingId,
		flags: MappingFlags,
	) -> Result<UserOrganizationMapping, DbError> {
		self.set_flags(id, flags).await
	}

	async fn revoke(&self, id: MappingId) -> Result<(), DbError> {
		self.revoke(id).await
	}
}
