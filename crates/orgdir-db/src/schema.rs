// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted table names.

pub const ORGANIZATION: &str = "organizations_organization";
pub const ORGANIZATION_SITES: &str = "organizations_organization_sites";
pub const HISTORICAL_ORGANIZATION: &str = "organizations_historicalorganization";

pub const INSTITUTION: &str = "organizations_organizationinstitution";
pub const INSTITUTION_ORGANIZATIONS: &str = "organizations_organizationinstitution_organizations";
pub const HISTORICAL_INSTITUTION: &str = "organizations_historicalorganizationinstitution";

pub const ORGANIZATION_COURSE: &str = "organizations_organizationcourse";
pub const HISTORICAL_ORGANIZATION_COURSE: &str = "organizations_historicalorganizationcourse";

pub const INSTITUTION_COURSE: &str = "organizations_organizationinstitutioncourse";
pub const HISTORICAL_INSTITUTION_COURSE: &str =
	"organizations_historicalorganizationinstitutioncourse";

pub const USER_ORGANIZATION_MAPPING: &str = "organizations_userorganizationmapping";

/// Externally owned user table.
pub const AUTH_USER: &str = "auth_user";
/// Externally owned site table.
pub const SITE: &str = "django_site";

/// Host-owned tables the directory schema references.
pub const HOST_TABLES: [&str; 2] = [AUTH_USER, SITE];

/// Every table created by the embedded migrations.
pub const DIRECTORY_TABLES: [&str; 11] = [
	ORGANIZATION,
	ORGANIZATION_SITES,
	HISTORICAL_ORGANIZATION,
	INSTITUTION,
	INSTITUTION_ORGANIZATIONS,
	HISTORICAL_INSTITUTION,
	ORGANIZATION_COURSE,
	HISTORICAL_ORGANIZATION_COURSE,
	INSTITUTION_COURSE,
	HISTORICAL_INSTITUTION_COURSE,
	USER_ORGANIZATION_MAPPING,
];
