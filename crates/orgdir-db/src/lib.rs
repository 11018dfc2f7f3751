// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the organizational directory.
//!
//! One repository per entity type, each owning a [`sqlx::SqlitePool`] and
//! exposed behind an `async_trait` store trait. Every mutation of an audited
//! entity appends a snapshot to its history shadow table in the same
//! transaction (see [`history`]).

pub mod course_link;
pub mod error;
pub mod history;
pub mod institution;
pub mod mapping;
pub mod migrations;
pub mod organization;
pub mod pool;
mod query;
pub mod schema;
pub mod testing;
mod timestamp;

pub use course_link::{
	CourseLinkRepository, CourseLinkStore, InstitutionCourseRepository,
	OrganizationCourseRepository,
};
pub use error::{DbError, Result};
pub use history::{Audited, HistoryCursor};
pub use institution::{InstitutionRepository, InstitutionStore};
pub use mapping::{MappingRepository, MappingStore};
pub use migrations::{create_host_placeholders, embedded_migrations, run_migrations};
pub use organization::{OrganizationRepository, OrganizationStore};
pub use pool::{create_pool, create_pool_from_url};

pub use sqlx::SqlitePool;

/// All repositories over one pool.
#[derive(Clone)]
pub struct Directory {
	pub organizations: OrganizationRepository,
	pub institutions: InstitutionRepository,
	pub courses: OrganizationCourseRepository,
	pub institution_courses: InstitutionCourseRepository,
	pub mappings: MappingRepository,
}

impl Directory {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			organizations: OrganizationRepository::new(pool.clone()),
			institutions: InstitutionRepository::new(pool.clone()),
			courses: OrganizationCourseRepository::new(pool.clone()),
			institution_courses: InstitutionCourseRepository::new(pool.clone()),
			mappings: MappingRepository::new(pool),
		}
	}
}
