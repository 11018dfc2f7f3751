// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization repository for database operations.
//!
//! This module provides database access for organizations including:
//! - Organization CRUD with history snapshots
//! - Site links (`organizations_organization_sites`)
//! - History queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgdir_model::{
	ChangeContext, HistoricalRecord, HistoryType, NewOrganization, Organization,
	OrganizationFilter, OrganizationId, OrganizationUpdate, SiteId,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::DbError;
use crate::history::{self, column_list, Audited, HistoryCursor};
use crate::query::{page, short_name_taken, touch_row, Arg, Conditions};
use crate::schema;
use crate::timestamp;
use crate::{InstitutionCourseRepository, OrganizationCourseRepository};
use orgdir_model::{OrganizationCourse, OrganizationInstitutionCourse};

impl Audited for Organization {
	const TABLE: &'static str = schema::ORGANIZATION;
	const HISTORY_TABLE: &'static str = schema::HISTORICAL_ORGANIZATION;
	const COLUMNS: &'static [&'static str] = &[
		"id",
		"created",
		"modified",
		"name",
		"short_name",
		"description",
		"logo",
		"active",
	];

	fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
		let created: String = row.try_get("created")?;
		let modified: String = row.try_get("modified")?;

		Ok(Organization {
			id: OrganizationId::new(row.try_get("id")?),
			name: row.try_get("name")?,
			short_name: row.try_get("short_name")?,
			description: row.try_get("description")?,
			logo: row.try_get("logo")?,
			active: row.try_get("active")?,
			created: timestamp::decode(&created, "created")?,
			modified: timestamp::decode(&modified, "modified")?,
		})
	}
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
	async fn create(
		&self,
		new: &NewOrganization,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError>;
	async fn get(&self, id: OrganizationId) -> Result<Option<Organization>, DbError>;
	async fn get_by_short_name(&self, short_name: &str) -> Result<Option<Organization>, DbError>;
	async fn update(
		&self,
		id: OrganizationId,
		update: OrganizationUpdate,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError>;
	async fn deactivate(
		&self,
		id: OrganizationId,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError>;
	async fn delete(&self, id: OrganizationId, ctx: &ChangeContext) -> Result<(), DbError>;
	async fn list(&self, filter: &OrganizationFilter) -> Result<Vec<Organization>, DbError>;
	async fn add_site(&self, id: OrganizationId, site_id: SiteId) -> Result<bool, DbError>;
	async fn remove_site(&self, id: OrganizationId, site_id: SiteId) -> Result<bool, DbError>;
	async fn list_sites(&self, id: OrganizationId) -> Result<Vec<SiteId>, DbError>;
	fn history_for(&self, id: OrganizationId) -> HistoryCursor<Organization>;
	async fn latest_history(
		&self,
		id: OrganizationId,
	) -> Result<Option<HistoricalRecord<Organization>>, DbError>;
	async fn as_of(
		&self,
		id: OrganizationId,
		at: DateTime<Utc>,
	) -> Result<Option<Organization>, DbError>;
}

/// Repository for organization database operations.
#[derive(Clone)]
pub struct OrganizationRepository {
	pool: SqlitePool,
}

impl OrganizationRepository {
	/// Create a new organization repository.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	fn not_found(id: OrganizationId) -> DbError {
		DbError::NotFound(format!("organization {id}"))
	}

	fn short_name_in_use(short_name: &str) -> DbError {
		DbError::Uniqueness(format!(
			"organization with short_name '{short_name}' already exists"
		))
	}

	async fn ensure_short_name_free(&self, short_name: &str) -> Result<(), DbError> {
		match self.get_by_short_name(short_name).await? {
			Some(_) => Err(Self::short_name_in_use(short_name)),
			None => Ok(()),
		}
	}

	/// Create a new organization and record its `Created` snapshot.
	///
	/// # Errors
	/// - `DbError::Validation` if a field is malformed
	/// - `DbError::Uniqueness` if `short_name` is already taken
	/// - `DbError::ReferentialIntegrity` if the acting user does not exist
	#[tracing::instrument(skip(self, new, ctx), fields(short_name = %new.short_name))]
	pub async fn create(
		&self,
		new: &NewOrganization,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError> {
		new.validate()?;
		ctx.validate()?;
		self.ensure_short_name_free(&new.short_name).await?;

		let now = timestamp::now();
		let sql = format!(
			"INSERT INTO {} (created, modified, name, short_name, description, logo, active) \
			 VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
			schema::ORGANIZATION,
			column_list::<Organization>(),
		);

		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&sql)
			.bind(timestamp::encode(now))
			.bind(timestamp::encode(now))
			.bind(&new.name)
			.bind(&new.short_name)
			.bind(new.description.as_deref())
			.bind(new.logo.as_deref())
			.bind(new.active)
			.fetch_one(&mut *tx)
			.await?;
		let org = Organization::from_row(&row)?;
		history::append::<Organization>(
			&mut tx,
			org.id.into_inner(),
			HistoryType::Created,
			ctx,
			now,
		)
		.await?;
		tx.commit().await?;

		tracing::debug!(org_id = %org.id, short_name = %org.short_name, "organization created");
		Ok(org)
	}

	/// Get an organization by ID.
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn get(&self, id: OrganizationId) -> Result<Option<Organization>, DbError> {
		let sql = format!(
			"SELECT {} FROM {} WHERE id = ?",
			column_list::<Organization>(),
			schema::ORGANIZATION
		);
		let row = sqlx::query(&sql)
			.bind(id.into_inner())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| Organization::from_row(&r)).transpose()
	}

	/// Get an organization by its short name.
	///
	/// # Returns
	/// `None` if no organization uses this short name. Matching is exact.
	#[tracing::instrument(skip(self), fields(short_name = %short_name))]
	pub async fn get_by_short_name(
		&self,
		short_name: &str,
	) -> Result<Option<Organization>, DbError> {
		let sql = format!(
			"SELECT {} FROM {} WHERE short_name = ?",
			column_list::<Organization>(),
			schema::ORGANIZATION
		);
		let row = sqlx::query(&sql)
			.bind(short_name)
			.fetch_optional(&self.pool)
			.await?;

		let result = row.map(|r| Organization::from_row(&r)).transpose()?;
		if let Some(ref org) = result {
			tracing::debug!(org_id = %org.id, "organization found by short_name");
		}
		Ok(result)
	}

	/// Apply a partial update, bump `modified` and record a `Changed` snapshot.
	///
	/// An empty update still records a snapshot.
	///
	/// # Errors
	/// - `DbError::Validation` if a changed field is malformed
	/// - `DbError::NotFound` if the organization does not exist
	/// - `DbError::Uniqueness` if the new `short_name` is taken
	#[tracing::instrument(skip(self, update, ctx), fields(org_id = %id))]
	pub async fn update(
		&self,
		id: OrganizationId,
		update: OrganizationUpdate,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError> {
		update.validate()?;
		ctx.validate()?;

		let now = timestamp::now();
		let mut tx = self.pool.begin().await?;
		if !touch_row(&mut tx, schema::ORGANIZATION, id.into_inner(), &timestamp::encode(now)).await? {
			return Err(Self::not_found(id));
		}
		let select = format!(
			"SELECT {} FROM {} WHERE id = ?",
			column_list::<Organization>(),
			schema::ORGANIZATION
		);
		let current = sqlx::query(&select)
			.bind(id.into_inner())
			.fetch_one(&mut *tx)
			.await?;
		let mut org = Organization::from_row(&current)?;
		if let Some(short_name) = &update.short_name {
			if *short_name != org.short_name
				&& short_name_taken(&mut tx, schema::ORGANIZATION, short_name, id.into_inner()).await?
			{
				return Err(Self::short_name_in_use(short_name));
			}
		}
		update.apply(&mut org);

		let sql = format!(
			"UPDATE {} SET name = ?, short_name = ?, description = ?, logo = ?, active = ? \
			 WHERE id = ? RETURNING {}",
			schema::ORGANIZATION,
			column_list::<Organization>(),
		);
		let row = sqlx::query(&sql)
			.bind(&org.name)
			.bind(&org.short_name)
			.bind(org.description.as_deref())
			.bind(org.logo.as_deref())
			.bind(org.active)
			.bind(id.into_inner())
			.fetch_one(&mut *tx)
			.await?;
		let org = Organization::from_row(&row)?;
		history::append::<Organization>(&mut tx, id.into_inner(), HistoryType::Changed, ctx, now)
			.await?;
		tx.commit().await?;

		tracing::debug!(org_id = %id, "organization updated");
		Ok(org)
	}

	/// Set `active = false`, keeping the row.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the organization does not exist.
	#[tracing::instrument(skip(self, ctx), fields(org_id = %id))]
	pub async fn deactivate(
		&self,
		id: OrganizationId,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError> {
		ctx.validate()?;

		let now = timestamp::now();
		let sql = format!(
			"UPDATE {} SET active = 0, modified = ? WHERE id = ? RETURNING {}",
			schema::ORGANIZATION,
			column_list::<Organization>(),
		);

		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&sql)
			.bind(timestamp::encode(now))
			.bind(id.into_inner())
			.fetch_optional(&mut *tx)
			.await?
			.ok_or_else(|| Self::not_found(id))?;
		let org = Organization::from_row(&row)?;
		history::append::<Organization>(&mut tx, id.into_inner(), HistoryType::Changed, ctx, now)
			.await?;
		tx.commit().await?;

		tracing::debug!(org_id = %id, "organization deactivated");
		Ok(org)
	}

	/// Delete an organization.
	///
	/// Records `Deleted` snapshots for the organization and for every course
	/// link of either kind that the delete cascades to. Site links,
	/// institution links and user mappings are removed by cascade.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the organization does not exist.
	#[tracing::instrument(skip(self, ctx), fields(org_id = %id))]
	pub async fn delete(&self, id: OrganizationId, ctx: &ChangeContext) -> Result<(), DbError> {
		ctx.validate()?;

		let now = timestamp::now();
		let mut tx = self.pool.begin().await?;
		history::append::<Organization>(&mut tx, id.into_inner(), HistoryType::Deleted, ctx, now)
			.await
			.map_err(|e| if e.is_not_found() { Self::not_found(id) } else { e })?;
		let courses = history::append_where::<OrganizationCourse>(
			&mut tx,
			"organization_id",
			id.into_inner(),
			HistoryType::Deleted,
			ctx,
			now,
		)
		.await?;
		let institution_courses = history::append_where::<OrganizationInstitutionCourse>(
			&mut tx,
			"organization_id",
			id.into_inner(),
			HistoryType::Deleted,
			ctx,
			now,
		)
		.await?;

		let sql = format!("DELETE FROM {} WHERE id = ?", schema::ORGANIZATION);
		sqlx::query(&sql)
			.bind(id.into_inner())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!(
			org_id = %id,
			courses,
			institution_courses,
			"organization deleted"
		);
		Ok(())
	}

	/// List organizations ordered by name.
	///
	/// # Arguments
	/// * `filter` - All set fields must match. Limit defaults to 50, capped at 1000.
	#[tracing::instrument(skip(self, filter))]
	pub async fn list(&self, filter: &OrganizationFilter) -> Result<Vec<Organization>, DbError> {
		let mut conditions = Conditions::new();
		if let Some(active) = filter.active {
			conditions.push("active = ?", Arg::Bool(active));
		}
		if let Some(search) = &filter.search {
			conditions.push_search(&["name", "short_name"], search);
		}
		if let Some(site_id) = filter.site_id {
			conditions.push(
				format!(
					"id IN (SELECT organization_id FROM {} WHERE site_id = ?)",
					schema::ORGANIZATION_SITES
				),
				Arg::Int(site_id.into_inner()),
			);
		}
		if let Some(user_id) = filter.user_id {
			conditions.push(
				format!(
					"id IN (SELECT organization_id FROM {} WHERE user_id = ?)",
					schema::USER_ORGANIZATION_MAPPING
				),
				Arg::Int(user_id.into_inner()),
			);
		}
		let (limit, offset) = page(filter.limit, filter.offset);

		let sql = format!(
			"SELECT {} FROM {} WHERE {} ORDER BY name, id LIMIT ? OFFSET ?",
			column_list::<Organization>(),
			schema::ORGANIZATION,
			conditions.where_clause(),
		);
		let rows = conditions
			.bind(sqlx::query(&sql))
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		let orgs = rows
			.iter()
			.map(Organization::from_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = orgs.len(), "organizations listed");
		Ok(orgs)
	}

	/// Link an organization to a site.
	///
	/// # Returns
	/// `true` if a link was created, `false` if it already existed.
	///
	/// # Errors
	/// - `DbError::NotFound` if the organization does not exist
	/// - `DbError::ReferentialIntegrity` if the site does not exist
	#[tracing::instrument(skip(self), fields(org_id = %id, site_id = %site_id))]
	pub async fn add_site(&self, id: OrganizationId, site_id: SiteId) -> Result<bool, DbError> {
		if self.get(id).await?.is_none() {
			return Err(Self::not_found(id));
		}

		let sql = format!(
			"INSERT OR IGNORE INTO {} (organization_id, site_id) VALUES (?, ?)",
			schema::ORGANIZATION_SITES
		);
		let result = sqlx::query(&sql)
			.bind(id.into_inner())
			.bind(site_id.into_inner())
			.execute(&self.pool)
			.await?;

		let added = result.rows_affected() > 0;
		tracing::debug!(org_id = %id, site_id = %site_id, added, "organization site linked");
		Ok(added)
	}

	/// Remove a site link. Returns whether a link existed.
	#[tracing::instrument(skip(self), fields(org_id = %id, site_id = %site_id))]
	pub async fn remove_site(&self, id: OrganizationId, site_id: SiteId) -> Result<bool, DbError> {
		let sql = format!(
			"DELETE FROM {} WHERE organization_id = ? AND site_id = ?",
			schema::ORGANIZATION_SITES
		);
		let result = sqlx::query(&sql)
			.bind(id.into_inner())
			.bind(site_id.into_inner())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn list_sites(&self, id: OrganizationId) -> Result<Vec<SiteId>, DbError> {
		let sql = format!(
			"SELECT site_id FROM {} WHERE organization_id = ? ORDER BY site_id",
			schema::ORGANIZATION_SITES
		);
		let ids: Vec<(i64,)> = sqlx::query_as(&sql)
			.bind(id.into_inner())
			.fetch_all(&self.pool)
			.await?;

		Ok(ids.into_iter().map(|(site_id,)| SiteId::new(site_id)).collect())
	}

	/// Snapshots of an organization, newest first. Lazy and restartable.
	pub fn history_for(&self, id: OrganizationId) -> HistoryCursor<Organization> {
		HistoryCursor::new(self.pool.clone(), id.into_inner())
	}

	pub async fn latest_history(
		&self,
		id: OrganizationId,
	) -> Result<Option<HistoricalRecord<Organization>>, DbError> {
		self.history_for(id).latest().await
	}

	/// The organization as it stood at `at`, or `None` if it did not exist.
	pub async fn as_of(
		&self,
		id: OrganizationId,
		at: DateTime<Utc>,
	) -> Result<Option<Organization>, DbError> {
		self.history_for(id).as_of(at).await
	}

	/// Course links owned by this organization.
	pub fn courses(&self) -> OrganizationCourseRepository {
		OrganizationCourseRepository::new(self.pool.clone())
	}

	/// Institution course links owned by this organization.
	pub fn institution_courses(&self) -> InstitutionCourseRepository {
		InstitutionCourseRepository::new(self.pool.clone())
	}
}

#[async_trait]
impl OrganizationStore for OrganizationRepository {
	async fn create(
		&self,
		new: &NewOrganization,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError> {
		self.create(new, ctx).await
	}

	async fn get(&self, id: OrganizationId) -> Result<Option<Organization>, DbError> {
		self.get(id).await
	}

	async fn get_by_short_name(&self, short_name: &str) -> Result<Option<Organization>, DbError> {
		self.get_by_short_name(short_name).await
	}

	async fn update(
		&self,
		id: OrganizationId,
		update: OrganizationUpdate,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError> {
		self.update(id, update, ctx).await
	}

	async fn deactivate(
		&self,
		id: OrganizationId,
		ctx: &ChangeContext,
	) -> Result<Organization, DbError> {
		self.deactivate(id, ctx).await
	}

	async fn delete(&self, id: OrganizationId, ctx: &ChangeContext) -> Result<(), DbError> {
		self.delete(id, ctx).await
	}

	async fn list(&self, filter: &OrganizationFilter) -> Result<Vec<Organization>, DbError> {
		self.list(filter).await
	}

	async fn add_site(&self, id: OrganizationId, site_id: SiteId) -> Result<bool, DbError> {
		self.add_site(id, site_id).await
	}

	async fn remove_site(&self, id: OrganizationId, site_id: SiteId) -> Result<bool, DbError> {
		self.remove_site(id, site_id).await
	}

	async fn list_sites(&self, id: OrganizationId) -> Result<Vec<SiteId>, DbError> {
		self.list_sites(id).await
	}

	fn history_for(&self, id: OrganizationId) -> HistoryCursor<Organization> {
		self.history_for(id)
	}

	async fn latest_history(
		&self,
		id: OrganizationId,
	) -> Result<Option<HistoricalRecord<Organization>>, DbError> {
		self.latest_history(id).await
	}

	async fn as_of(
		&self,
		id: OrganizationId,
		at: DateTime<Utc>,
	) -> Result<Option<Organization>, DbError> {
		self.as_of(id, at).await
	}
}
