// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization institution types.
//!
//! An [`OrganizationInstitution`] is a school or academy grouped underneath one
//! or more organizations. Beyond the organization fields it carries a US
//! postal address (zipcode, city, [`UsState`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{InstitutionId, OrganizationId, UsState};
use crate::validation::{
	validate_logo, validate_max_len, validate_required, validate_short_name, validate_zipcode,
	ValidationError, MAX_CHAR_LEN,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInstitution {
	pub id: InstitutionId,
	pub name: String,
	pub short_name: String,
	pub description: Option<String>,
	pub logo: Option<String>,
	pub zipcode: Option<String>,
	pub city: Option<String>,
	pub state: Option<UsState>,
	pub active: bool,
	pub created: DateTime<Utc>,
	pub modified: DateTime<Utc>,
}

impl fmt::Display for OrganizationInstitution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name, self.short_name)
	}
}

fn default_active() -> bool {
	true
}

fn validate_address(zipcode: Option<&str>, city: Option<&str>) -> Result<(), ValidationError> {
	if let Some(zipcode) = zipcode {
		validate_zipcode(zipcode)?;
	}
	if let Some(city) = city {
		validate_max_len("city", city, MAX_CHAR_LEN)?;
	}
	Ok(())
}

/// Fields for creating an institution.
///
/// `state` is carried as the parsed [`UsState`]; callers holding a raw code
/// use [`NewInstitution::with_state_code`], which rejects unknown codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInstitution {
	pub name: String,
	pub short_name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub logo: Option<String>,
	#[serde(default)]
	pub zipcode: Option<String>,
	#[serde(default)]
	pub city: Option<String>,
	#[serde(default)]
	pub state: Option<UsState>,
	#[serde(default = "default_active")]
	pub active: bool,
}

impl NewInstitution {
	pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			short_name: short_name.into(),
			description: None,
			logo: None,
			zipcode: None,
			city: None,
			state: None,
			active: true,
		}
	}

	pub fn with_zipcode(mut self, zipcode: impl Into<String>) -> Self {
		self.zipcode = Some(zipcode.into());
		self
	}

	pub fn with_city(mut self, city: impl Into<String>) -> Self {
		self.city = Some(city.into());
		self
	}

	pub fn with_state(mut self, state: UsState) -> Self {
		self.state = Some(state);
		self
	}

	/// # Errors
	/// Returns a `state` validation error if `code` is not an accepted choice.
	pub fn with_state_code(mut self, code: &str) -> Result<Self, ValidationError> {
		self.state = Some(code.parse()?);
		Ok(self)
	}

	/// # Errors
	/// Returns the first field that fails validation.
	pub fn validate(&self) -> Result<(), ValidationError> {
		validate_required("name", &self.name, MAX_CHAR_LEN)?;
		validate_short_name(&self.short_name)?;
		if let Some(logo) = &self.logo {
			validate_logo(logo)?;
		}
		validate_address(self.zipcode.as_deref(), self.city.as_deref())
	}
}

/// Partial update of an institution. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionUpdate {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub short_name: Option<String>,
	#[serde(default)]
	pub description: Option<Option<String>>,
	#[serde(default)]
	pub logo: Option<Option<String>>,
	#[serde(default)]
	pub zipcode: Option<Option<String>>,
	#[serde(default)]
	pub city: Option<Option<String>>,
	#[serde(default)]
	pub state: Option<Option<UsState>>,
	#[serde(default)]
	pub active: Option<bool>,
}

impl InstitutionUpdate {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.short_name.is_none()
			&& self.description.is_none()
			&& self.logo.is_none()
			&& self.zipcode.is_none()
			&& self.city.is_none()
			&& self.state.is_none()
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
		validate_address(
			self.zipcode.as_ref().and_then(|z| z.as_deref()),
			self.city.as_ref().and_then(|c| c.as_deref()),
		)
	}

	pub fn apply(self, inst: &mut OrganizationInstitution) {
		if let Some(name) = self.name {
			inst.name = name;
		}
		if let Some(short_name) = self.short_name {
			inst.short_name = short_name;
		}
		if let Some(description) = self.description {
			inst.description = description;
		}
		if let Some(logo) = self.logo {
			inst.logo = logo;
		}
		if let Some(zipcode) = self.zipcode {
			inst.zipcode = zipcode;
		}
		if let Some(city) = self.city {
			inst.city = city;
		}
		if let Some(state) = self.state {
			inst.state = state;
		}
		if let Some(active) = self.active {
			inst.active = active;
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionFilter {
	pub active: Option<bool>,
	pub search: Option<String>,
	pub state: Option<UsState>,
	pub city: Option<String>,
	/// Only institutions linked to this organization.
	pub organization_id: Option<OrganizationId>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zipcode_formats() {
		for zip in ["12345", "12345-6789"] {
			assert!(NewInstitution::new("School", "school").with_zipcode(zip).validate().is_ok());
		}
		for zip in ["1234", "ABCDE", "12345 6789"] {
			let err = NewInstitution::new("School", "school")
				.with_zipcode(zip)
				.validate()
				.unwrap_err();
			assert_eq!(err.field, "zipcode");
		}
	}

	#[test]
	fn state_code_parsing() {
		let inst = NewInstitution::new("School", "school").with_state_code("CA").unwrap();
		assert_eq!(inst.state, Some(UsState::California));

		let err = NewInstitution::new("School", "school").with_state_code("ZZ").unwrap_err();
		assert_eq!(err.field, "state");
	}

	#[test]
	fn unknown_state_rejected_on_deserialize() {
		let result: Result<NewInstitution, _> =
			serde_json::from_str(r#"{"name": "S", "short_name": "s", "state": "ZZ"}"#);
		assert!(result.is_err());

		let ok: NewInstitution =
			serde_json::from_str(r#"{"name": "S", "short_name": "s", "state": "TX"}"#).unwrap();
		assert_eq!(ok.state, Some(UsState::Texas));
	}

	#[test]
	fn update_validates_cleared_zipcode_as_ok() {
		let update = InstitutionUpdate {
			zipcode: Some(None),
			..Default::default()
		};
		assert!(update.validate().is_ok());

		let update = InstitutionUpdate {
			zipcode: Some(Some("9999".to_string())),
			..Default::default()
		};
		assert_eq!(update.validate().unwrap_err().field, "zipcode");
	}

	#[test]
	fn city_length_limit() {
		let err = NewInstitution::new("School", "school")
			.with_city("c".repeat(256))
			.validate()
			.unwrap_err();
		assert_eq!(err.field, "city");
	}
}
