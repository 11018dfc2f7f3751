// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Domain types for the organizational directory.
//!
//! This crate provides:
//! - [`Organization`] - course publishers, linked to sites and users
//! - [`OrganizationInstitution`] - schools grouped under organizations
//! - [`OrganizationCourse`] / [`OrganizationInstitutionCourse`] - course key links
//! - [`UserOrganizationMapping`] - per-user access grants
//! - [`HistoricalRecord`] - audit snapshots written on every mutation
//! - [`validation`] - pre-persist field checks
//!
//! Persistence lives in `orgdir-db`; nothing here touches a database.

pub mod course;
pub mod history;
pub mod institution;
pub mod mapping;
pub mod organization;
pub mod types;
pub mod validation;

pub use course::{
	CourseLink, CourseLinkFilter, CourseLinkParts, CourseLinkUpdate, NewCourseLink,
	OrganizationCourse, OrganizationInstitutionCourse,
};
pub use history::{ChangeContext, HistoricalRecord};
pub use institution::{InstitutionFilter, InstitutionUpdate, NewInstitution, OrganizationInstitution};
pub use mapping::{MappingFilter, MappingFlags, UserOrganizationMapping};
pub use organization::{NewOrganization, Organization, OrganizationFilter, OrganizationUpdate};
pub use types::{
	CourseLinkId, HistoryId, HistoryType, InstitutionCourseLinkId, InstitutionId, MappingId,
	OrganizationId, SiteId, UserId, UsState,
};
pub use validation::ValidationError;
