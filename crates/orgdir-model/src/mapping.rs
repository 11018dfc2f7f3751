// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User to organization access grants.

use serde::{Deserialize, Serialize};

use crate::types::{MappingId, OrganizationId, UserId};

/// Grants a user access to an organization's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOrganizationMapping {
	pub id: MappingId,
	pub user_id: UserId,
	pub organization_id: OrganizationId,
	pub is_active: bool,
	pub is_amc_admin: bool,
}

/// Flags carried by a grant. Both default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFlags {
	#[serde(default)]
	pub is_active: bool,
	#[serde(default)]
	pub is_amc_admin: bool,
}

impl MappingFlags {
	pub fn active() -> Self {
		Self {
			is_active: true,
			is_amc_admin: false,
		}
	}

	pub fn admin() -> Self {
		Self {
			is_active: true,
			is_amc_admin: true,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFilter {
	pub user_id: Option<UserId>,
	pub organization_id: Option<OrganizationId>,
	pub is_active: Option<bool>,
	pub is_amc_admin: Option<bool>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}
