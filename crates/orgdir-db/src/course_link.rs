// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Course link repository.
//!
//! One generic repository serves both link kinds. Each kind has its own
//! table and history shadow; the `(course_id, organization_id)` pair is
//! unique per table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgdir_model::{
	ChangeContext, CourseLink, CourseLinkFilter, CourseLinkParts, CourseLinkUpdate,
	HistoricalRecord, HistoryType, NewCourseLink, OrganizationCourse, OrganizationId,
	OrganizationInstitutionCourse,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::marker::PhantomData;

use crate::error::DbError;
use crate::history::{self, column_list, Audited, HistoryCursor};
use crate::query::{page, touch_row, Arg, Conditions};
use crate::schema;
use crate::timestamp;

const COURSE_LINK_COLUMNS: &[&str] = &[
	"id",
	"created",
	"modified",
	"course_id",
	"active",
	"organization_id",
];

fn course_link_from_row<L: CourseLink>(row: &SqliteRow) -> Result<L, DbError> {
	let created: String = row.try_get("created")?;
	let modified: String = row.try_get("modified")?;
	// Nullable in the history shadow only.
	let organization_id: Option<i64> = row.try_get("organization_id")?;
	let organization_id = organization_id
		.ok_or_else(|| DbError::Internal(format!("{} without organization_id", L::KIND)))?;

	Ok(L::from_parts(CourseLinkParts {
		id: row.try_get("id")?,
		course_id: row.try_get("course_id")?,
		organization_id: OrganizationId::new(organization_id),
		active: row.try_get("active")?,
		created: timestamp::decode(&created, "created")?,
		modified: timestamp::decode(&modified, "modified")?,
	}))
}

macro_rules! impl_audited_course_link {
	($link:ty, $table:expr, $history:expr) => {
		impl Audited for $link {
			const TABLE: &'static str = $table;
			const HISTORY_TABLE: &'static str = $history;
			const COLUMNS: &'static [&'static str] = COURSE_LINK_COLUMNS;

			fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
				course_link_from_row(row)
			}
		}
	};
}

impl_audited_course_link!(
	OrganizationCourse,
	schema::ORGANIZATION_COURSE,
	schema::HISTORICAL_ORGANIZATION_COURSE
);
impl_audited_course_link!(
	OrganizationInstitutionCourse,
	schema::INSTITUTION_COURSE,
	schema::HISTORICAL_INSTITUTION_COURSE
);

#[async_trait]
pub trait CourseLinkStore<L: CourseLink + Audited>: Send + Sync {
	async fn link(&self, new: &NewCourseLink, ctx: &ChangeContext) -> Result<L, DbError>;
	async fn get(&self, id: L::Id) -> Result<Option<L>, DbError>;
	async fn get_by_pair(
		&self,
		organization_id: OrganizationId,
		course_id: &str,
	) -> Result<Option<L>, DbError>;
	async fn list(&self, filter: &CourseLinkFilter) -> Result<Vec<L>, DbError>;
	async fn update(
		&self,
		id: L::Id,
		update: CourseLinkUpdate,
		ctx: &ChangeContext,
	) -> Result<L, DbError>;
	async fn deactivate(&self, id: L::Id, ctx: &ChangeContext) -> Result<L, DbError>;
	async fn delete(&self, id: L::Id, ctx: &ChangeContext) -> Result<(), DbError>;
	fn history_for(&self, id: L::Id) -> HistoryCursor<L>;
	async fn latest_history(&self, id: L::Id) -> Result<Option<HistoricalRecord<L>>, DbError>;
	async fn as_of(&self, id: L::Id, at: DateTime<Utc>) -> Result<Option<L>, DbError>;
}

/// Repository for one course link kind.
pub struct CourseLinkRepository<L> {
	pool: SqlitePool,
	_link: PhantomData<fn() -> L>,
}

impl<L> Clone for CourseLinkRepository<L> {
	fn clone(&self) -> Self {
		Self {
			pool: self.pool.clone(),
			_link: PhantomData,
		}
	}
}

pub type OrganizationCourseRepository = CourseLinkRepository<OrganizationCourse>;
pub type InstitutionCourseRepository = CourseLinkRepository<OrganizationInstitutionCourse>;

impl<L: CourseLink + Audited> CourseLinkRepository<L> {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			_link: PhantomData,
		}
	}

	fn raw(id: L::Id) -> i64 {
		id.into()
	}

	fn not_found(id: L::Id) -> DbError {
		DbError::NotFound(format!("{} {id}", L::KIND))
	}

	fn duplicate(organization_id: OrganizationId, course_id: &str) -> DbError {
		DbError::Uniqueness(format!(
			"{} for course '{course_id}' and organization {organization_id} already exists",
			L::KIND
		))
	}

	async fn organization_exists(&self, organization_id: OrganizationId) -> Result<bool, DbError> {
		let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", schema::ORGANIZATION);
		let (count,): (i64,) = sqlx::query_as(&sql)
			.bind(organization_id.into_inner())
			.fetch_one(&self.pool)
			.await?;
		Ok(count > 0)
	}

	/// Link a course to an organization and record a `Created` snapshot.
	///
	/// # Errors
	/// - `DbError::Validation` if the course key is empty or too long
	/// - `DbError::NotFound` if the organization does not exist
	/// - `DbError::Uniqueness` if the pair is already linked
	#[tracing::instrument(skip(self, new, ctx), fields(kind = L::KIND, org_id = %new.organization_id, course_id = %new.course_id))]
	pub async fn link(&self, new: &NewCourseLink, ctx: &ChangeContext) -> Result<L, DbError> {
		new.validate()?;
		ctx.validate()?;
		if !self.organization_exists(new.organization_id).await? {
			return Err(DbError::NotFound(format!(
				"organization {}",
				new.organization_id
			)));
		}
		if self
			.get_by_pair(new.organization_id, &new.course_id)
			.await?
			.is_some()
		{
			return Err(Self::duplicate(new.organization_id, &new.course_id));
		}

		let now = timestamp::now();
		let sql = format!(
			"INSERT INTO {} (created, modified, course_id, active, organization_id) \
			 VALUES (?, ?, ?, ?, ?) RETURNING {}",
			L::TABLE,
			column_list::<L>(),
		);

		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&sql)
			.bind(timestamp::encode(now))
			.bind(timestamp::encode(now))
			.bind(&new.course_id)
			.bind(new.active)
			.bind(new.organization_id.into_inner())
			.fetch_one(&mut *tx)
			.await?;
		let link = L::from_row(&row)?;
		history::append::<L>(&mut tx, Self::raw(link.id()), HistoryType::Created, ctx, now).await?;
		tx.commit().await?;

		tracing::debug!(kind = L::KIND, link_id = %link.id(), "course linked");
		Ok(link)
	}

	#[tracing::instrument(skip(self, id), fields(kind = L::KIND, link_id = %id))]
	pub async fn get(&self, id: L::Id) -> Result<Option<L>, DbError> {
		let sql = format!(
			"SELECT {} FROM {} WHERE id = ?",
			column_list::<L>(),
			L::TABLE
		);
		let row = sqlx::query(&sql)
			.bind(Self::raw(id))
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| L::from_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(kind = L::KIND, org_id = %organization_id, course_id = %course_id))]
	pub async fn get_by_pair(
		&self,
		organization_id: OrganizationId,
		course_id: &str,
	) -> Result<Option<L>, DbError> {
		let sql = format!(
			"SELECT {} FROM {} WHERE organization_id = ? AND course_id = ?",
			column_list::<L>(),
			L::TABLE
		);
		let row = sqlx::query(&sql)
			.bind(organization_id.into_inner())
			.bind(course_id)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| L::from_row(&r)).transpose()
	}

	/// List links ordered by id.
	#[tracing::instrument(skip(self, filter), fields(kind = L::KIND))]
	pub async fn list(&self, filter: &CourseLinkFilter) -> Result<Vec<L>, DbError> {
		let mut conditions = Conditions::new();
		if let Some(organization_id) = filter.organization_id {
			conditions.push("organization_id = ?", Arg::Int(organization_id.into_inner()));
		}
		if let Some(course_id) = &filter.course_id {
			conditions.push("course_id = ?", Arg::Text(course_id.clone()));
		}
		if let Some(active) = filter.active {
			conditions.push("active = ?", Arg::Bool(active));
		}
		let (limit, offset) = page(filter.limit, filter.offset);

		let sql = format!(
			"SELECT {} FROM {} WHERE {} ORDER BY id LIMIT ? OFFSET ?",
			column_list::<L>(),
			L::TABLE,
			conditions.where_clause(),
		);
		let rows = conditions
			.bind(sqlx::query(&sql))
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(L::from_row).collect()
	}

	/// Change the course key or active flag and record a `Changed` snapshot.
	///
	/// # Errors
	/// - `DbError::NotFound` if the link does not exist
	/// - `DbError::Uniqueness` if the new course key is already linked to the
	///   same organization
	#[tracing::instrument(skip(self, id, update, ctx), fields(kind = L::KIND, link_id = %id))]
	pub async fn update(
		&self,
		id: L::Id,
		update: CourseLinkUpdate,
		ctx: &ChangeContext,
	) -> Result<L, DbError> {
		update.validate()?;
		ctx.validate()?;

		let now = timestamp::now();
		let mut tx = self.pool.begin().await?;
		if !touch_row(&mut tx, L::TABLE, Self::raw(id), &timestamp::encode(now)).await? {
			return Err(Self::not_found(id));
		}
		let select = format!(
			"SELECT {} FROM {} WHERE id = ?",
			column_list::<L>(),
			L::TABLE
		);
		let current = sqlx::query(&select)
			.bind(Self::raw(id))
			.fetch_one(&mut *tx)
			.await?;
		let current = L::from_row(&current)?;
		let course_id = update
			.course_id
			.unwrap_or_else(|| current.course_id().to_string());
		let active = update.active.unwrap_or_else(|| current.active());
		if course_id != current.course_id() {
			let taken_sql = format!(
				"SELECT COUNT(*) FROM {} WHERE organization_id = ? AND course_id = ? AND id != ?",
				L::TABLE
			);
			let (taken,): (i64,) = sqlx::query_as(&taken_sql)
				.bind(current.organization_id().into_inner())
				.bind(&course_id)
				.bind(Self::raw(id))
				.fetch_one(&mut *tx)
				.await?;
			if taken > 0 {
				return Err(Self::duplicate(current.organization_id(), &course_id));
			}
		}

		let sql = format!(
			"UPDATE {} SET course_id = ?, active = ? WHERE id = ? RETURNING {}",
			L::TABLE,
			column_list::<L>(),
		);
		let row = sqlx::query(&sql)
			.bind(&course_id)
			.bind(active)
			.bind(Self::raw(id))
			.fetch_one(&mut *tx)
			.await?;
		let link = L::from_row(&row)?;
		history::append::<L>(&mut tx, Self::raw(id), HistoryType::Changed, ctx, now).await?;
		tx.commit().await?;

		tracing::debug!(kind = L::KIND, link_id = %id, "course link updated");
		Ok(link)
	}

	pub async fn deactivate(&self, id: L::Id, ctx: &ChangeContext) -> Result<L, DbError> {
		self.update(
			id,
			CourseLinkUpdate {
				course_id: None,
				active: Some(false),
			},
			ctx,
		)
		.await
	}

	/// Delete a link, recording a `Deleted` snapshot first.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the link does not exist.
	#[tracing::instrument(skip(self, id, ctx), fields(kind = L::KIND, link_id = %id))]
	pub async fn delete(&self, id: L::Id, ctx: &ChangeContext) -> Result<(), DbError> {
		ctx.validate()?;

		let now = timestamp::now();
		let mut tx = self.pool.begin().await?;
		history::append::<L>(&mut tx, Self::raw(id), HistoryType::Deleted, ctx, now)
			.await
			.map_err(|e| if e.is_not_found() { Self::not_found(id) } else { e })?;

		let sql = format!("DELETE FROM {} WHERE id = ?", L::TABLE);
		sqlx::query(&sql)
			.bind(Self::raw(id))
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!(kind = L::KIND, link_id = %id, "course link deleted");
		Ok(())
	}

	pub fn history_for(&self, id: L::Id) -> HistoryCursor<L> {
		HistoryCursor::new(self.pool.clone(), Self::raw(id))
	}

	pub async fn latest_history(&self, id: L::Id) -> Result<Option<HistoricalRecord<L>>, DbError> {
		self.history_for(id).latest().await
	}

	pub async fn as_of(&self, id: L::Id, at: DateTime<Utc>) -> Result<Option<L>, DbError> {
		self.history_for(id).as_of(at).await
	}
}

#[async_trait]
impl<L: CourseLink + Audited> CourseLinkStore<L> for CourseLinkRepository<L> {
	async fn link(&self, new: &NewCourseLink, ctx: &ChangeContext) -> Result<L, DbError> {
		self.link(new, ctx).await
	}

	async fn get(&self, id: L::Id) -> Result<Option<L>, DbError> {
		self.get(id).await
	}

	async fn get_by_pair(
		&self,
		organization_id: OrganizationId,
		course_id: &str,
	) -> Result<Option<L>, DbError> {
		self.get_by_pair(organization_id, course_id).await
	}

	async fn list(&self, filter: &CourseLinkFilter) -> Result<Vec<L>, DbError> {
		self.list(filter).await
	}

	async fn update(
		&self,
		id: L::Id,
		update: CourseLinkUpdate,
		ctx: &ChangeContext,
	) -> Result<L, DbError> {
		self.update(id, update, ctx).await
	}

	async fn deactivate(&self, id: L::Id, ctx: &ChangeContext) -> Result<L, DbError> {
		self.deactivate(id, ctx).await
	}

	async fn delete(&self, id: L::Id, ctx: &ChangeContext) -> Result<(), DbError> {
		self.delete(id, ctx).await
	}

	fn history_for(&self, id: L::Id) -> HistoryCursor<L> {
		self.history_for(id)
	}

	async fn latest_history(&self, id: L::Id) -> Result<Option<HistoricalRecord<L>>, DbError> {
		self.latest_history(id).await
	}

	async fn as_of(&self, id: L::Id, at: DateTime<Utc>) -> Result<Option<L>, DbError> {
		self.as_of(id, at).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_directory_test_pool;
	use crate::OrganizationRepository;
	use orgdir_model::{CourseLinkId, NewOrganization};

	const DEMO: &str = "course-v1:edX+DemoX+Demo_Course";

	async fn setup() -> (SqlitePool, OrganizationId) {
		let pool = create_directory_test_pool().await;
		let org = OrganizationRepository::new(pool.clone())
			.create(&NewOrganization::new("edX", "edX"), &ChangeContext::system())
			.await
			.unwrap();
		(pool, org.id)
	}

	#[tokio::test]
	async fn link_and_lookup() {
		let (pool, org_id) = setup().await;
		let repo = OrganizationCourseRepository::new(pool);

		let link = repo
			.link(&NewCourseLink::new(org_id, DEMO), &ChangeContext::system())
			.await
			.unwrap();

		assert_eq!(link.course_id, DEMO);
		assert_eq!(link.organization_id, org_id);
		assert!(link.active);
		assert_eq!(repo.get(link.id).await.unwrap(), Some(link.clone()));
		assert_eq!(repo.get_by_pair(org_id, DEMO).await.unwrap(), Some(link.clone()));
		assert!(repo.get_by_pair(org_id, "other").await.unwrap().is_none());

		let history = repo.history_for(link.id).collect().await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].history_type, HistoryType::Created);
		assert_eq!(history[0].snapshot, link);
	}

	#[tokio::test]
	async fn duplicate_pair_is_rejected() {
		let (pool, org_id) = setup().await;
		let repo = OrganizationCourseRepository::new(pool);
		repo.link(&NewCourseLink::new(org_id, DEMO), &ChangeContext::system())
			.await
			.unwrap();

		let err = repo
			.link(&NewCourseLink::new(org_id, DEMO), &ChangeContext::system())
			.await
			.unwrap_err();
		assert!(err.is_uniqueness());
	}

	#[tokio::test]
	async fn link_kinds_are_stored_separately() {
		let (pool, org_id) = setup().await;
		let courses = OrganizationCourseRepository::new(pool.clone());
		let institution_courses = InstitutionCourseRepository::new(pool);

		courses
			.link(&NewCourseLink::new(org_id, DEMO), &ChangeContext::system())
			.await
			.unwrap();
		let inst_link = institution_courses
			.link(&NewCourseLink::new(org_id, DEMO), &ChangeContext::system())
			.await
			.unwrap();

		assert_eq!(inst_link.course_id, DEMO);
		assert_eq!(
			institution_courses.list(&CourseLinkFilter::default()).await.unwrap().len(),
			1
		);
	}

	#[tokio::test]
	async fn link_to_missing_organization_is_not_found() {
		let (pool, _) = setup().await;
		let repo = OrganizationCourseRepository::new(pool);

		let err = repo
			.link(
				&NewCourseLink::new(OrganizationId::new(999), DEMO),
				&ChangeContext::system(),
			)
			.await
			.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn update_deactivate_and_delete() {
		let (pool, org_id) = setup().await;
		let repo = OrganizationCourseRepository::new(pool);
		let ctx = ChangeContext::system();
		let link = repo.link(&NewCourseLink::new(org_id, DEMO), &ctx).await.unwrap();
		let other = repo.link(&NewCourseLink::new(org_id, "other"), &ctx).await.unwrap();

		let err = repo
			.update(
				other.id,
				CourseLinkUpdate {
					course_id: Some(DEMO.to_string()),
					active: None,
				},
				&ctx,
			)
			.await
			.unwrap_err();
		assert!(err.is_uniqueness());

		let renamed = repo
			.update(
				link.id,
				CourseLinkUpdate {
					course_id: Some("course-v1:edX+DemoX+2026".to_string()),
					active: None,
				},
				&ctx,
			)
			.await
			.unwrap();
		assert_eq!(renamed.course_id, "course-v1:edX+DemoX+2026");
		assert!(renamed.active);

		let inactive = repo.deactivate(link.id, &ctx).await.unwrap();
		assert!(!inactive.active);
		assert_eq!(inactive.course_id, renamed.course_id);

		repo.delete(link.id, &ctx).await.unwrap();
		assert!(repo.get(link.id).await.unwrap().is_none());

		let types: Vec<_> = repo
			.history_for(link.id)
			.collect()
			.await
			.unwrap()
			.into_iter()
			.map(|h| h.history_type)
			.collect();
		assert_eq!(
			types,
			vec![
				HistoryType::Deleted,
				HistoryType::Changed,
				HistoryType::Changed,
				HistoryType::Created
			]
		);

		let err = repo.delete(link.id, &ctx).await.unwrap_err();
		assert!(err.is_not_found());
		let err = repo
			.update(CourseLinkId::new(999), CourseLinkUpdate::default(), &ctx)
			.await
			.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn list_filters_by_course_and_active() {
		let (pool, org_id) = setup().await;
		let orgs = OrganizationRepository::new(pool.clone());
		let other_org = orgs
			.create(&NewOrganization::new("Other", "other"), &ChangeContext::system())
			.await
			.unwrap();
		let repo = OrganizationCourseRepository::new(pool);
		let ctx = ChangeContext::system();

		let a = repo.link(&NewCourseLink::new(org_id, DEMO), &ctx).await.unwrap();
		let b = repo.link(&NewCourseLink::new(other_org.id, DEMO), &ctx).await.unwrap();
		let c = repo.link(&NewCourseLink::new(org_id, "c2"), &ctx).await.unwrap();
		repo.deactivate(c.id, &ctx).await.unwrap();

		let by_course = repo
			.list(&CourseLinkFilter {
				course_id: Some(DEMO.to_string()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(
			by_course.iter().map(|l| l.id).collect::<Vec<_>>(),
			vec![a.id, b.id]
		);

		let active_for_org = repo
			.list(&CourseLinkFilter {
				organization_id: Some(org_id),
				active: Some(true),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(active_for_org, vec![a]);
	}
}
