// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization types.
//!
//! An [`Organization`] publishes or provides one or more courses. It carries a
//! display name, a globally unique [short name](crate::validation::validate_short_name),
//! optional description and logo, and a soft-deactivation flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{OrganizationId, SiteId, UserId};
use crate::validation::{
	validate_logo, validate_required, validate_short_name, ValidationError, MAX_CHAR_LEN,
};

/// An organization row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
	pub id: OrganizationId,
	pub name: String,
	pub short_name: String,
	pub description: Option<String>,
	/// Storage path of the logo image.
	pub logo: Option<String>,
	pub active: bool,
	pub created: DateTime<Utc>,
	pub modified: DateTime<Utc>,
}

impl fmt::Display for Organization {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name, self.short_name)
	}
}

fn default_active() -> bool {
	true
}

/// Fields for creating an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
	pub name: String,
	pub short_name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub logo: Option<String>,
	#[serde(default = "default_active")]
	pub active: bool,
}

impl NewOrganization {
	pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			short_name: short_name.into(),
			description: None,
			logo: None,
			active: true,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
		self.logo = Some(logo.into());
		self
	}

	/// # Errors
	/// Returns the first field that fails validation.
	pub fn validate(&self) -> Result<(), ValidationError> {
		validate_required("name", &self.name, MAX_CHAR_LEN)?;
		validate_short_name(&self.short_name)?;
		if let Some(logo) = &self.logo {
			validate_logo(logo)?;
		}
		Ok(())
	}
}

/// Partial update of an organization. `None` leaves a field untouched; for
/// nullable fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationUpdate {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub short_name: Option<String>,
	#[serde(default)]
	pub description: Option<Option<String>>,
	#[serde(default)]
	pub logo: Option<Option<String>>,
	#[serde(default)]
	pub active: Option<bool>,
}

impl OrganizationUpdate {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.short_name.is_none()
			&& self.description.is_none()
			&& self.logo.is_none()
			&& self.active.is_none()
	}

	/// # Errors
	/// Returns the first changed field that fails validation.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if let Some(name) = &self.name {
			validate_required("name", name, MAX_CHAR_LEN)?;
		}
		if let Some(short_name) = &self.short_name {
			validate_short_name(short_name)?;
		}
		if let Some(Some(logo)) = &self.logo {
			validate_logo(logo)?;
		}
		Ok(())
	}

	/// Apply the changed fields onto an existing row.
	pub fn apply(self, org: &mut Organization) {
		if let Some(name) = self.name {
			org.name = name;
		}
		if let Some(short_name) = self.short_name {
			org.short_name = short_name;
		}
		if let Some(description) = self.description {
			org.description = description;
		}
		if let Some(logo) = self.logo {
			org.logo = logo;
		}
		if let Some(active) = self.active {
			org.active = active;
		}
	}
}

/// Filters for listing organizations. All set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationFilter {
	pub active: Option<bool>,
	/// Case-insensitive substring match on name or short name.
	pub search: Option<String>,
	pub site_id: Option<SiteId>,
	pub user_id: Option<UserId>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}
