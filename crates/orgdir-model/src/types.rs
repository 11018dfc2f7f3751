// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for the directory.
//!
//! - **ID newtypes**: Type-safe wrappers around the store-assigned integer keys
//!   ([`OrganizationId`], [`InstitutionId`], [`UserId`], etc.) preventing
//!   accidental mixing
//! - **History types**: The kind of change a history row records ([`HistoryType`])
//! - **States**: The fixed US state/territory/military-region enumeration
//!   ([`UsState`])
//!
//! All ID types serialize transparently as integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(i64);

		impl $name {
			/// Create an ID from a raw key.
			pub fn new(id: i64) -> Self {
				Self(id)
			}

			/// Get the raw key.
			pub fn into_inner(self) -> i64 {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self(id)
			}
		}

		impl From<$name> for i64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(OrganizationId, "Unique identifier for an organization.");
define_id_type!(InstitutionId, "Unique identifier for an organization institution.");
define_id_type!(CourseLinkId, "Unique identifier for an organization/course link.");
define_id_type!(
	InstitutionCourseLinkId,
	"Unique identifier for an organization institution/course link."
);
define_id_type!(MappingId, "Unique identifier for a user/organization mapping.");
define_id_type!(HistoryId, "Unique identifier for a history row.");
define_id_type!(UserId, "Identifier of an externally owned user.");
define_id_type!(SiteId, "Identifier of an externally owned site.");

// =============================================================================
// History Types
// =============================================================================

/// The kind of mutation a history row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryType {
	#[serde(rename = "+")]
	Created,
	#[serde(rename = "~")]
	Changed,
	#[serde(rename = "-")]
	Deleted,
}

impl HistoryType {
	/// The single-character code stored in `history_type`.
	pub fn code(self) -> &'static str {
		match self {
			HistoryType::Created => "+",
			HistoryType::Changed => "~",
			HistoryType::Deleted => "-",
		}
	}

	pub fn from_code(code: &str) -> Option<Self> {
		match code {
			"+" => Some(HistoryType::Created),
			"~" => Some(HistoryType::Changed),
			"-" => Some(HistoryType::Deleted),
			_ => None,
		}
	}
}

impl fmt::Display for HistoryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HistoryType::Created => write!(f, "Created"),
			HistoryType::Changed => write!(f, "Changed"),
			HistoryType::Deleted => write!(f, "Deleted"),
		}
	}
}

// =============================================================================
// States
// =============================================================================

macro_rules! define_states {
	($( $variant:ident => $code:literal, $name:literal; )*) => {
		/// US states, territories and military regions accepted for institutions.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		pub enum UsState {
			$(
				#[serde(rename = $code)]
				$variant,
			)*
		}

		impl UsState {
			/// Returns every accepted state, in declaration order.
			pub fn all() -> &'static [UsState] {
				&[$(UsState::$variant),*]
			}

			/// The two-letter code stored in the `state` column.
			pub fn code(self) -> &'static str {
				match self {
					$(UsState::$variant => $code,)*
				}
			}

			/// Human readable name.
			pub fn name(self) -> &'static str {
				match self {
					$(UsState::$variant => $name,)*
				}
			}
		}

		impl FromStr for UsState {
			type Err = ValidationError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($code => Ok(UsState::$variant),)*
					other => Err(ValidationError::new(
						"state",
						format!("'{other}' is not a valid choice"),
					)),
				}
			}
		}
	};
}

define_states! {
	Alabama => "AL", "Alabama";
	Alaska => "AK", "Alaska";
	Arizona => "AZ", "Arizona";
	Arkansas => "AR", "Arkansas";
	ArmedForcesAmericas => "AA", "Armed Forces Americas";
	ArmedForcesEurope => "AE", "Armed Forces Europe";
	ArmedForcesPacific => "AP", "Armed Forces Pacific";
	California => "CA", "California";
	Colorado => "CO", "Colorado";
	Connecticut => "CT", "Connecticut";
	Delaware => "DE", "Delaware";
	DistrictOfColumbia => "DC", "District Of Columbia";
	Florida => "FL", "Florida";
	Georgia => "GA", "Georgia";
	Hawaii => "HI", "Hawaii";
	Idaho => "ID", "Idaho";
	Illinois => "IL", "Illinois";
	Indiana => "IN", "Indiana";
	Iowa => "IA", "Iowa";
	Kansas => "KS", "Kansas";
	Kentucky => "KY", "Kentucky";
	Louisiana => "LA", "Louisiana";
	Maine => "ME", "Maine";
	Maryland => "MD", "Maryland";
	Massachusetts => "MA", "Massachusetts";
	Michigan => "MI", "Michigan";
	Minnesota => "MN", "Minnesota";
	Mississippi => "MS", "Mississippi";
	Missouri => "MO", "Missouri";
	Montana => "MT", "Montana";
	Nebraska => "NE", "Nebraska";
	Nevada => "NV", "Nevada";
	NewHampshire => "NH", "New Hampshire";
	NewJersey => "NJ", "New Jersey";
	NewMexico => "NM", "New Mexico";
	NewYork => "NY", "New York";
	NorthCarolina => "NC", "North Carolina";
	NorthDakota => "ND", "North Dakota";
	Ohio => "OH", "Ohio";
	Oklahoma => "OK", "Oklahoma";
	Oregon => "OR", "Oregon";
	Pennsylvania => "PA", "Pennsylvania";
	RhodeIsland => "RI", "Rhode Island";
	SouthCarolina => "SC", "South Carolina";
	SouthDakota => "SD", "South Dakota";
	Tennessee => "TN", "Tennessee";
	Texas => "TX", "Texas";
	Utah => "UT", "Utah";
	Vermont => "VT", "Vermont";
	Virginia => "VA", "Virginia";
	Washington => "WA", "Washington";
	WestVirginia => "WV", "West Virginia";
	Wisconsin => "WI", "Wisconsin";
	Wyoming => "WY", "Wyoming";
}

impl fmt::Display for UsState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	#[test]
	fn state_codes_are_unique_two_letter() {
		let codes: HashSet<_> = UsState::all().iter().map(|s| s.code()).collect();
		assert_eq!(codes.len(), UsState::all().len());
		assert_eq!(UsState::all().len(), 54);
		assert!(codes.iter().all(|c| c.len() == 2));
	}

	#[test]
	fn state_parse() {
		assert_eq!("CA".parse::<UsState>().unwrap(), UsState::California);
		assert_eq!("AP".parse::<UsState>().unwrap().name(), "Armed Forces Pacific");
		let err = "ZZ".parse::<UsState>().unwrap_err();
		assert_eq!(err.field, "state");
		assert!("ca".parse::<UsState>().is_err());
	}

	#[test]
	fn state_code_round_trips_through_from_str() {
		for state in UsState::all() {
			assert_eq!(state.code().parse::<UsState>().unwrap(), *state);
		}
	}

	#[test]
	fn state_serializes_as_code() {
		let json = serde_json::to_string(&UsState::NewYork).unwrap();
		assert_eq!(json, "\"NY\"");
	}

	#[test]
	fn history_type_codes() {
		for ty in [HistoryType::Created, HistoryType::Changed, HistoryType::Deleted] {
			assert_eq!(HistoryType::from_code(ty.code()), Some(ty));
		}
		assert_eq!(HistoryType::from_code("?"), None);
		assert_eq!(serde_json::to_string(&HistoryType::Changed).unwrap(), "\"~\"");
	}

	#[test]
	fn id_serializes_transparently() {
		let id = OrganizationId::new(42);
		assert_eq!(serde_json::to_string(&id).unwrap(), "42");
		assert_eq!(id.to_string(), "42");
		assert_eq!(i64::from(id), 42);
	}
}
