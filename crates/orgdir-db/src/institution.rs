// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Institution repository.
//!
//! Institutions are schools grouped under one or more organizations through
//! `organizations_organizationinstitution_organizations`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgdir_model::{
	ChangeContext, HistoricalRecord, HistoryType, InstitutionFilter, InstitutionId,
	InstitutionUpdate, NewInstitution, Organization, OrganizationId, OrganizationInstitution,
	UsState,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::DbError;
use crate::history::{self, column_list, Audited, HistoryCursor};
use crate::query::{page, short_name_taken, touch_row, Arg, Conditions};
use crate::schema;
use crate::timestamp;

impl Audited for OrganizationInstitution {
	const TABLE: &'static str = schema::INSTITUTION;
	const HISTORY_TABLE: &'static str = schema::HISTORICAL_INSTITUTION;
	const COLUMNS: &'static [&'static str] = &[
		"id",
		"created",
		"modified",
		"name",
		"short_name",
		"description",
		"logo",
		"zipcode",
		"city",
		"state",
		"active",
	];

	fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
		let created: String = row.try_get("created")?;
		let modified: String = row.try_get("modified")?;
		let state: Option<String> = row.try_get("state")?;
		let state = state
			.map(|code| code.parse::<UsState>())
			.transpose()
			.map_err(|e| DbError::Internal(format!("Invalid state: {}", e.message)))?;

		Ok(OrganizationInstitution {
			id: InstitutionId::new(row.try_get("id")?),
			name: row.try_get("name")?,
			short_name: row.try_get("short_name")?,
			description: row.try_get("description")?,
			logo: row.try_get("logo")?,
			zipcode: row.try_get("zipcode")?,
			city: row.try_get("city")?,
			state,
			active: row.try_get("active")?,
			created: timestamp::decode(&created, "created")?,
			modified: timestamp::decode(&modified, "modified")?,
		})
	}
}

#[async_trait]
pub trait InstitutionStore: Send + Sync {
	async fn create(
		&self,
		new: &NewInstitution,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError>;
	async fn get(&self, id: InstitutionId) -> Result<Option<OrganizationInstitution>, DbError>;
	async fn get_by_short_name(
		&self,
		short_name: &str,
	) -> Result<Option<OrganizationInstitution>, DbError>;
	async fn update(
		&self,
		id: InstitutionId,
		update: InstitutionUpdate,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError>;
	async fn deactivate(
		&self,
		id: InstitutionId,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError>;
	async fn delete(&self, id: InstitutionId, ctx: &ChangeContext) -> Result<(), DbError>;
	async fn list(&self, filter: &InstitutionFilter)
		-> Result<Vec<OrganizationInstitution>, DbError>;
	async fn add_organization(
		&self,
		id: InstitutionId,
		organization_id: OrganizationId,
	) -> Result<bool, DbError>;
	async fn remove_organization(
		&self,
		id: InstitutionId,
		organization_id: OrganizationId,
	) -> Result<bool, DbError>;
	async fn list_organizations(&self, id: InstitutionId) -> Result<Vec<Organization>, DbError>;
	async fn list_for_organization(
		&self,
		organization_id: OrganizationId,
	) -> Result<Vec<OrganizationInstitution>, DbError>;
	fn history_for(&self, id: InstitutionId) -> HistoryCursor<OrganizationInstitution>;
	async fn latest_history(
		&self,
		id: InstitutionId,
	) -> Result<Option<HistoricalRecord<OrganizationInstitution>>, DbError>;
	async fn as_of(
		&self,
		id: InstitutionId,
		at: DateTime<Utc>,
	) -> Result<Option<OrganizationInstitution>, DbError>;
}

#[derive(Clone)]
pub struct InstitutionRepository {
	pool: SqlitePool,
}

impl InstitutionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	fn not_found(id: InstitutionId) -> DbError {
		DbError::NotFound(format!("organization institution {id}"))
	}

	fn short_name_in_use(short_name: &str) -> DbError {
		DbError::Uniqueness(format!(
			"organization institution with short_name '{short_name}' already exists"
		))
	}

	async fn ensure_short_name_free(&self, short_name: &str) -> Result<(), DbError> {
		match self.get_by_short_name(short_name).await? {
			Some(_) => Err(Self::short_name_in_use(short_name)),
			None => Ok(()),
		}
	}

	/// Create an institution and record its `Created` snapshot.
	///
	/// # Errors
	/// - `DbError::Validation` for a malformed short name, zipcode or length
	/// - `DbError::Uniqueness` if `short_name` is already taken
	#[tracing::instrument(skip(self, new, ctx), fields(short_name = %new.short_name))]
	pub async fn create(
		&self,
		new: &NewInstitution,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError> {
		new.validate()?;
		ctx.validate()?;
		self.ensure_short_name_free(&new.short_name).await?;

		let now = timestamp::now();
		let sql = format!(
			"INSERT INTO {} (created, modified, name, short_name, description, logo, zipcode, city, state, active) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
			schema::INSTITUTION,
			column_list::<OrganizationInstitution>(),
		);

		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&sql)
			.bind(timestamp::encode(now))
			.bind(timestamp::encode(now))
			.bind(&new.name)
			.bind(&new.short_name)
			.bind(new.description.as_deref())
			.bind(new.logo.as_deref())
			.bind(new.zipcode.as_deref())
			.bind(new.city.as_deref())
			.bind(new.state.map(UsState::code))
			.bind(new.active)
			.fetch_one(&mut *tx)
			.await?;
		let institution = OrganizationInstitution::from_row(&row)?;
		history::append::<OrganizationInstitution>(
			&mut tx,
			institution.id.into_inner(),
			HistoryType::Created,
			ctx,
			now,
		)
		.await?;
		tx.commit().await?;

		tracing::debug!(institution_id = %institution.id, "organization institution created");
		Ok(institution)
	}

	#[tracing::instrument(skip(self), fields(institution_id = %id))]
	pub async fn get(&self, id: InstitutionId) -> Result<Option<OrganizationInstitution>, DbError> {
		let sql = format!(
			"SELECT {} FROM {} WHERE id = ?",
			column_list::<OrganizationInstitution>(),
			schema::INSTITUTION
		);
		let row = sqlx::query(&sql)
			.bind(id.into_inner())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| OrganizationInstitution::from_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(short_name = %short_name))]
	pub async fn get_by_short_name(
		&self,
		short_name: &str,
	) -> Result<Option<OrganizationInstitution>, DbError> {
		let sql = format!(
			"SELECT {} FROM {} WHERE short_name = ?",
			column_list::<OrganizationInstitution>(),
			schema::INSTITUTION
		);
		let row = sqlx::query(&sql)
			.bind(short_name)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| OrganizationInstitution::from_row(&r)).transpose()
	}

	/// Apply a partial update and record a `Changed` snapshot.
	///
	/// # Errors
	/// - `DbError::Validation` if a changed field is malformed
	/// - `DbError::NotFound` if the institution does not exist
	/// - `DbError::Uniqueness` if the new `short_name` is taken
	#[tracing::instrument(skip(self, update, ctx), fields(institution_id = %id))]
	pub async fn update(
		&self,
		id: InstitutionId,
		update: InstitutionUpdate,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError> {
		update.validate()?;
		ctx.validate()?;

		let now = timestamp::now();
		let mut tx = self.pool.begin().await?;
		if !touch_row(&mut tx, schema::INSTITUTION, id.into_inner(), &timestamp::encode(now)).await? {
			return Err(Self::not_found(id));
		}
		let select = format!(
			"SELECT {} FROM {} WHERE id = ?",
			column_list::<OrganizationInstitution>(),
			schema::INSTITUTION
		);
		let current = sqlx::query(&select)
			.bind(id.into_inner())
			.fetch_one(&mut *tx)
			.await?;
		let mut institution = OrganizationInstitution::from_row(&current)?;
		if let Some(short_name) = &update.short_name {
			if *short_name != institution.short_name
				&& short_name_taken(&mut tx, schema::INSTITUTION, short_name, id.into_inner()).await?
			{
				return Err(Self::short_name_in_use(short_name));
			}
		}
		update.apply(&mut institution);

		let sql = format!(
			"UPDATE {} SET name = ?, short_name = ?, description = ?, logo = ?, zipcode = ?, city = ?, \
			 state = ?, active = ? WHERE id = ? RETURNING {}",
			schema::INSTITUTION,
			column_list::<OrganizationInstitution>(),
		);
		let row = sqlx::query(&sql)
			.bind(&institution.name)
			.bind(&institution.short_name)
			.bind(institution.description.as_deref())
			.bind(institution.logo.as_deref())
			.bind(institution.zipcode.as_deref())
			.bind(institution.city.as_deref())
			.bind(institution.state.map(UsState::code))
			.bind(institution.active)
			.bind(id.into_inner())
			.fetch_one(&mut *tx)
			.await?;
		let institution = OrganizationInstitution::from_row(&row)?;
		history::append::<OrganizationInstitution>(
			&mut tx,
			id.into_inner(),
			HistoryType::Changed,
			ctx,
			now,
		)
		.await?;
		tx.commit().await?;

		tracing::debug!(institution_id = %id, "organization institution updated");
		Ok(institution)
	}

	#[tracing::instrument(skip(self, ctx), fields(institution_id = %id))]
	pub async fn deactivate(
		&self,
		id: InstitutionId,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError> {
		ctx.validate()?;

		let now = timestamp::now();
		let sql = format!(
			"UPDATE {} SET active = 0, modified = ? WHERE id = ? RETURNING {}",
			schema::INSTITUTION,
			column_list::<OrganizationInstitution>(),
		);

		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&sql)
			.bind(timestamp::encode(now))
			.bind(id.into_inner())
			.fetch_optional(&mut *tx)
			.await?
			.ok_or_else(|| Self::not_found(id))?;
		let institution = OrganizationInstitution::from_row(&row)?;
		history::append::<OrganizationInstitution>(
			&mut tx,
			id.into_inner(),
			HistoryType::Changed,
			ctx,
			now,
		)
		.await?;
		tx.commit().await?;

		tracing::debug!(institution_id = %id, "organization institution deactivated");
		Ok(institution)
	}

	/// Delete an institution. Its organization links are removed by cascade.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the institution does not exist.
	#[tracing::instrument(skip(self, ctx), fields(institution_id = %id))]
	pub async fn delete(&self, id: InstitutionId, ctx: &ChangeContext) -> Result<(), DbError> {
		ctx.validate()?;

		let now = timestamp::now();
		let mut tx = self.pool.begin().await?;
		history::append::<OrganizationInstitution>(
			&mut tx,
			id.into_inner(),
			HistoryType::Deleted,
			ctx,
			now,
		)
		.await
		.map_err(|e| if e.is_not_found() { Self::not_found(id) } else { e })?;

		let sql = format!("DELETE FROM {} WHERE id = ?", schema::INSTITUTION);
		sqlx::query(&sql)
			.bind(id.into_inner())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!(institution_id = %id, "organization institution deleted");
		Ok(())
	}

	/// List institutions ordered by name.
	#[tracing::instrument(skip(self, filter))]
	pub async fn list(
		&self,
		filter: &InstitutionFilter,
	) -> Result<Vec<OrganizationInstitution>, DbError> {
		let mut conditions = Conditions::new();
		if let Some(active) = filter.active {
			conditions.push("active = ?", Arg::Bool(active));
		}
		if let Some(search) = &filter.search {
			conditions.push_search(&["name", "short_name"], search);
		}
		if let Some(state) = filter.state {
			conditions.push("state = ?", Arg::Text(state.code().to_string()));
		}
		if let Some(city) = &filter.city {
			conditions.push("city = ? COLLATE NOCASE", Arg::Text(city.clone()));
		}
		if let Some(organization_id) = filter.organization_id {
			conditions.push(
				format!(
					"id IN (SELECT organizationinstitution_id FROM {} WHERE organization_id = ?)",
					schema::INSTITUTION_ORGANIZATIONS
				),
				Arg::Int(organization_id.into_inner()),
			);
		}
		let (limit, offset) = page(filter.limit, filter.offset);

		let sql = format!(
			"SELECT {} FROM {} WHERE {} ORDER BY name, id LIMIT ? OFFSET ?",
			column_list::<OrganizationInstitution>(),
			schema::INSTITUTION,
			conditions.where_clause(),
		);
		let rows = conditions
			.bind(sqlx::query(&sql))
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(OrganizationInstitution::from_row).collect()
	}

	/// Link an institution to an organization.
	///
	/// # Returns
	/// `true` if a link was created, `false` if it already existed.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if either side does not exist.
	#[tracing::instrument(skip(self), fields(institution_id = %id, org_id = %organization_id))]
	pub async fn add_organization(
		&self,
		id: InstitutionId,
		organization_id: OrganizationId,
	) -> Result<bool, DbError> {
		if self.get(id).await?.is_none() {
			return Err(Self::not_found(id));
		}

		let sql = format!(
			"INSERT OR IGNORE INTO {} (organizationinstitution_id, organization_id) VALUES (?, ?)",
			schema::INSTITUTION_ORGANIZATIONS
		);
		let added = sqlx::query(&sql)
			.bind(id.into_inner())
			.bind(organization_id.into_inner())
			.execute(&self.pool)
			.await
			.map_err(|e| match DbError::from(e) {
				DbError::ReferentialIntegrity(_) => {
					DbError::NotFound(format!("organization {organization_id}"))
				}
				other => other,
			})?
			.rows_affected()
			> 0;

		tracing::debug!(institution_id = %id, org_id = %organization_id, added, "institution organization linked");
		Ok(added)
	}

	#[tracing::instrument(skip(self), fields(institution_id = %id, org_id = %organization_id))]
	pub async fn remove_organization(
		&self,
		id: InstitutionId,
		organization_id: OrganizationId,
	) -> Result<bool, DbError> {
		let sql = format!(
			"DELETE FROM {} WHERE organizationinstitution_id = ? AND organization_id = ?",
			schema::INSTITUTION_ORGANIZATIONS
		);
		let result = sqlx::query(&sql)
			.bind(id.into_inner())
			.bind(organization_id.into_inner())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Organizations linked to an institution, ordered by name.
	#[tracing::instrument(skip(self), fields(institution_id = %id))]
	pub async fn list_organizations(&self, id: InstitutionId) -> Result<Vec<Organization>, DbError> {
		let columns = Organization::COLUMNS
			.iter()
			.map(|c| format!("o.{c} AS {c}"))
			.collect::<Vec<_>>()
			.join(", ");
		let sql = format!(
			"SELECT {columns} FROM {orgs} o \
			 JOIN {links} l ON l.organization_id = o.id \
			 WHERE l.organizationinstitution_id = ? ORDER BY o.name, o.id",
			orgs = schema::ORGANIZATION,
			links = schema::INSTITUTION_ORGANIZATIONS,
		);
		let rows = sqlx::query(&sql)
			.bind(id.into_inner())
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(Organization::from_row).collect()
	}

	/// Institutions linked to an organization, ordered by name.
	pub async fn list_for_organization(
		&self,
		organization_id: OrganizationId,
	) -> Result<Vec<OrganizationInstitution>, DbError> {
		self.list(&InstitutionFilter {
			organization_id: Some(organization_id),
			limit: Some(crate::query::MAX_LIMIT),
			..Default::default()
		})
		.await
	}

	pub fn history_for(&self, id: InstitutionId) -> HistoryCursor<OrganizationInstitution> {
		HistoryCursor::new(self.pool.clone(), id.into_inner())
	}

	pub async fn latest_history(
		&self,
		id: InstitutionId,
	) -> Result<Option<HistoricalRecord<OrganizationInstitution>>, DbError> {
		self.history_for(id).latest().await
	}

	pub async fn as_of(
		&self,
		id: InstitutionId,
		at: DateTime<Utc>,
	) -> Result<Option<OrganizationInstitution>, DbError> {
		self.history_for(id).as_of(at).await
	}
}

#[async_trait]
impl InstitutionStore for InstitutionRepository {
	async fn create(
		&self,
		new: &NewInstitution,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError> {
		self.create(new, ctx).await
	}

	async fn get(&self, id: InstitutionId) -> Result<Option<OrganizationInstitution>, DbError> {
		self.get(id).await
	}

	async fn get_by_short_name(
		&self,
		short_name: &str,
	) -> Result<Option<OrganizationInstitution>, DbError> {
		self.get_by_short_name(short_name).await
	}

	async fn update(
		&self,
		id: InstitutionId,
		update: InstitutionUpdate,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError> {
		self.update(id, update, ctx).await
	}

	async fn deactivate(
		&self,
		id: InstitutionId,
		ctx: &ChangeContext,
	) -> Result<OrganizationInstitution, DbError> {
		self.deactivate(id, ctx).await
	}

	async fn delete(&self, id: InstitutionId, ctx: &ChangeContext) -> Result<(), DbError> {
		self.delete(id, ctx).await
	}

	async fn list(
		&self,
		filter: &InstitutionFilter,
	) -> Result<Vec<OrganizationInstitution>, DbError> {
		self.list(filter).await
	}

	async fn add_organization(
		&self,
		id: InstitutionId,
		organization_id: OrganizationId,
	) -> Result<bool, DbError> {
		self.add_organization(id, organization_id).await
	}

	async fn remove_organization(
		&self,
		id: InstitutionId,
		organization_id: OrganizationId,
	) -> Result<bool, DbError> {
		self.remove_organization(id, organization_id).await
	}

	async fn list_organizations(&self, id: InstitutionId) -> Result<Vec<Organization>, DbError> {
		self.list_organizations(id).await
	}

	async fn list_for_organization(
		&self,
		organization_id: OrganizationId,
	) -> Result<Vec<OrganizationInstitution>, DbError> {
		self.list_for_organization(organization_id).await
	}

	fn history_for(&self, id: InstitutionId) -> HistoryCursor<OrganizationInstitution> {
		self.history_for(id)
	}

	async fn latest_history(
		&self,
		id: InstitutionId,
	) -> Result<Option<HistoricalRecord<OrganizationInstitution>>, DbError> {
		self.latest_history(id).await
	}

	async fn as_of(
		&self,
		id: InstitutionId,
		at: DateTime<Utc>,
	) -> Result<Option<OrganizationInstitution>, DbError> {
		self.as_of(id, at).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_directory_test_pool;
	use crate::OrganizationRepository;
	use orgdir_model::NewOrganization;

	async fn make_repos() -> (InstitutionRepository, OrganizationRepository) {
		let pool = create_directory_test_pool().await;
		(
			InstitutionRepository::new(pool.clone()),
			OrganizationRepository::new(pool),
		)
	}

	fn school(short_name: &str) -> NewInstitution {
		NewInstitution::new(format!("School {short_name}"), short_name)
	}

	#[tokio::test]
	async fn create_stores_address_fields() {
		let (repo, _) = make_repos().await;
		let new = school("mit")
			.with_zipcode("02139")
			.with_city("Cambridge")
			.with_state_code("MA")
			.unwrap();

		let created = repo.create(&new, &ChangeContext::system()).await.unwrap();
		let fetched = repo.get(created.id).await.unwrap().unwrap();

		assert_eq!(fetched.zipcode.as_deref(), Some("02139"));
		assert_eq!(fetched.city.as_deref(), Some("Cambridge"));
		assert_eq!(fetched.state, Some(UsState::Massachusetts));
		assert_eq!(fetched, created);

		let history = repo.history_for(created.id).collect().await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].history_type, HistoryType::Created);
		assert_eq!(history[0].snapshot.state, Some(UsState::Massachusetts));
	}

	#[tokio::test]
	async fn zipcode_formats() {
		let (repo, _) = make_repos().await;
		let ctx = ChangeContext::system();

		for (i, zip) in ["12345", "12345-6789"].iter().enumerate() {
			repo.create(&school(&format!("ok{i}")).with_zipcode(*zip), &ctx)
				.await
				.unwrap();
		}
		for (i, zip) in ["1234", "ABCDE"].iter().enumerate() {
			let err = repo
				.create(&school(&format!("bad{i}")).with_zipcode(*zip), &ctx)
				.await
				.unwrap_err();
			assert!(err.is_validation(), "{zip} accepted");
		}
		assert_eq!(repo.list(&InstitutionFilter::default()).await.unwrap().len(), 2);
	}

	#[test]
	fn state_codes() {
		assert!(school("s").with_state_code("CA").is_ok());
		let err = school("s").with_state_code("ZZ").unwrap_err();
		assert_eq!(err.field, "state");
	}

	#[tokio::test]
	async fn duplicate_short_name_is_rejected() {
		let (repo, _) = make_repos().await;
		repo.create(&school("dup"), &ChangeContext::system()).await.unwrap();

		let err = repo
			.create(&school("dup"), &ChangeContext::system())
			.await
			.unwrap_err();
		assert!(err.is_uniqueness());
	}

	#[tokio::test]
	async fn institution_and_organization_short_names_are_independent() {
		let (repo, orgs) = make_repos().await;
		orgs.create(&NewOrganization::new("Org", "shared"), &ChangeContext::system())
			.await
			.unwrap();
		repo.create(&school("shared"), &ChangeContext::system())
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn update_clears_state_and_validates_zipcode() {
		let (repo, _) = make_repos().await;
		let ctx = ChangeContext::system();
		let inst = repo
			.create(&school("s").with_state(UsState::California), &ctx)
			.await
			.unwrap();

		let err = repo
			.update(
				inst.id,
				InstitutionUpdate {
					zipcode: Some(Some("9".to_string())),
					..Default::default()
				},
				&ctx,
			)
			.await
			.unwrap_err();
		assert!(err.is_validation());

		let updated = repo
			.update(
				inst.id,
				InstitutionUpdate {
					state: Some(None),
					city: Some(Some("Oakland".to_string())),
					..Default::default()
				},
				&ctx,
			)
			.await
			.unwrap();
		assert_eq!(updated.state, None);
		assert_eq!(updated.city.as_deref(), Some("Oakland"));
		assert_eq!(repo.history_for(inst.id).count().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn list_filters_by_state_city_and_organization() {
		let (repo, orgs) = make_repos().await;
		let ctx = ChangeContext::system();
		let org = orgs.create(&NewOrganization::new("Org", "org"), &ctx).await.unwrap();
		let ca = repo
			.create(&school("ca").with_state(UsState::California).with_city("Fresno"), &ctx)
			.await
			.unwrap();
		let ny = repo
			.create(&school("ny").with_state(UsState::NewYork), &ctx)
			.await
			.unwrap();
		repo.add_organization(ny.id, org.id).await.unwrap();

		let in_ca = repo
			.list(&InstitutionFilter {
				state: Some(UsState::California),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(in_ca, vec![ca.clone()]);

		let in_fresno = repo
			.list(&InstitutionFilter {
				city: Some("fresno".to_string()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(in_fresno, vec![ca]);

		assert_eq!(repo.list_for_organization(org.id).await.unwrap(), vec![ny]);
	}

	#[tokio::test]
	async fn organization_links() {
		let (repo, orgs) = make_repos().await;
		let ctx = ChangeContext::system();
		let beta = orgs.create(&NewOrganization::new("Beta", "beta"), &ctx).await.unwrap();
		let alpha = orgs.create(&NewOrganization::new("Alpha", "alpha"), &ctx).await.unwrap();
		let inst = repo.create(&school("s"), &ctx).await.unwrap();

		assert!(repo.add_organization(inst.id, beta.id).await.unwrap());
		assert!(repo.add_organization(inst.id, alpha.id).await.unwrap());
		assert!(!repo.add_organization(inst.id, alpha.id).await.unwrap());

		let linked = repo.list_organizations(inst.id).await.unwrap();
		assert_eq!(linked, vec![alpha.clone(), beta.clone()]);

		assert!(repo.remove_organization(inst.id, alpha.id).await.unwrap());
		assert_eq!(repo.list_organizations(inst.id).await.unwrap(), vec![beta.clone()]);

		let err = repo
			.add_organization(inst.id, OrganizationId::new(999))
			.await
			.unwrap_err();
		assert!(err.is_not_found());

		// Deleting the organization drops the link but keeps the institution.
		orgs.delete(beta.id, &ctx).await.unwrap();
		assert!(repo.list_organizations(inst.id).await.unwrap().is_empty());
		assert!(repo.get(inst.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn delete_records_snapshot_and_removes_links() {
		let (repo, orgs) = make_repos().await;
		let ctx = ChangeContext::system();
		let org = orgs.create(&NewOrganization::new("Org", "org"), &ctx).await.unwrap();
		let inst = repo.create(&school("s"), &ctx).await.unwrap();
		repo.add_organization(inst.id, org.id).await.unwrap();
		repo.deactivate(inst.id, &ctx).await.unwrap();

		repo.delete(inst.id, &ctx).await.unwrap();

		assert!(repo.get(inst.id).await.unwrap().is_none());
		assert!(repo.list_for_organization(org.id).await.unwrap().is_empty());
		let history = repo.history_for(inst.id).collect().await.unwrap();
		let types: Vec<_> = history.iter().map(|h| h.history_type).collect();
		assert_eq!(
			types,
			vec![HistoryType::Deleted, HistoryType::Changed, HistoryType::Created]
		);
		assert!(!history[0].snapshot.active);

		let err = repo.delete(inst.id, &ctx).await.unwrap_err();
		assert!(err.is_not_found());
	}
}
