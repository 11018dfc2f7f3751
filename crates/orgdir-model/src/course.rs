// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Links between organizations and externally identified courses.
//!
//! Courses are not first-class entities here: a link records an opaque course
//! identifier string against an organization. There are two link kinds with
//! identical structure, [`OrganizationCourse`] and
//! [`OrganizationInstitutionCourse`]. The institution variant does not
//! reference an institution; both point at an organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CourseLinkId, InstitutionCourseLinkId, OrganizationId};
use crate::validation::{validate_required, ValidationError, MAX_CHAR_LEN};

/// Column values shared by every course link kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLinkParts {
	pub id: i64,
	pub course_id: String,
	pub organization_id: OrganizationId,
	pub active: bool,
	pub created: DateTime<Utc>,
	pub modified: DateTime<Utc>,
}

/// Common view over the two course link kinds.
pub trait CourseLink: Clone + fmt::Debug + Send + Sync + Unpin + 'static {
	type Id: Copy + fmt::Display + From<i64> + Into<i64> + Send + Sync;

	/// Human readable kind, used in log fields and error messages.
	const KIND: &'static str;

	fn from_parts(parts: CourseLinkParts) -> Self;
	fn id(&self) -> Self::Id;
	fn course_id(&self) -> &str;
	fn organization_id(&self) -> OrganizationId;
	fn active(&self) -> bool;
}

macro_rules! define_course_link {
	($name:ident, $id:ident, $kind:literal, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
		pub struct $name {
			pub id: $id,
			pub course_id: String,
			pub organization_id: OrganizationId,
			pub active: bool,
			pub created: DateTime<Utc>,
			pub modified: DateTime<Utc>,
		}

		impl CourseLink for $name {
			type Id = $id;

			const KIND: &'static str = $kind;

			fn from_parts(parts: CourseLinkParts) -> Self {
				Self {
					id: $id::new(parts.id),
					course_id: parts.course_id,
					organization_id: parts.organization_id,
					active: parts.active,
					created: parts.created,
					modified: parts.modified,
				}
			}

			fn id(&self) -> $id {
				self.id
			}

			fn course_id(&self) -> &str {
				&self.course_id
			}

			fn organization_id(&self) -> OrganizationId {
				self.organization_id
			}

			fn active(&self) -> bool {
				self.active
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{} -> organization {}", self.course_id, self.organization_id)
			}
		}
	};
}

define_course_link!(
	OrganizationCourse,
	CourseLinkId,
	"organization course",
	"Link between an organization and a course key."
);
define_course_link!(
	OrganizationInstitutionCourse,
	InstitutionCourseLinkId,
	"organization institution course",
	"Institution-side link between an organization and a course key."
);

fn default_active() -> bool {
	true
}

/// Fields for creating a course link of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourseLink {
	pub organization_id: OrganizationId,
	pub course_id: String,
	#[serde(default = "default_active")]
	pub active: bool,
}

impl NewCourseLink {
	pub fn new(organization_id: OrganizationId, course_id: impl Into<String>) -> Self {
		Self {
			organization_id,
			course_id: course_id.into(),
			active: true,
		}
	}

	/// # Errors
	/// Returns a `course_id` error when the key is empty or too long.
	pub fn validate(&self) -> Result<(), ValidationError> {
		validate_required("course_id", &self.course_id, MAX_CHAR_LEN)
	}
}

/// Partial update of a course link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLinkUpdate {
	#[serde(default)]
	pub course_id: Option<String>,
	#[serde(default)]
	pub active: Option<bool>,
}

impl CourseLinkUpdate {
	pub fn is_empty(&self) -> bool {
		self.course_id.is_none() && self.active.is_none()
	}

	/// # Errors
	/// Returns a `course_id` error when the new key is empty or too long.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if let Some(course_id) = &self.course_id {
			validate_required("course_id", course_id, MAX_CHAR_LEN)?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLinkFilter {
	pub organization_id: Option<OrganizationId>,
	pub course_id: Option<String>,
	pub active: Option<bool>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parts() -> CourseLinkParts {
		let now = Utc::now();
		CourseLinkParts {
			id: 7,
			course_id: "course-v1:edX+DemoX+Demo_Course".to_string(),
			organization_id: OrganizationId::new(3),
			active: true,
			created: now,
			modified: now,
		}
	}

	#[test]
	fn both_kinds_build_from_the_same_parts() {
		let course = OrganizationCourse::from_parts(parts());
		let inst_course = OrganizationInstitutionCourse::from_parts(parts());

		assert_eq!(course.id, CourseLinkId::new(7));
		assert_eq!(inst_course.id, InstitutionCourseLinkId::new(7));
		assert_eq!(course.course_id(), inst_course.course_id());
		assert_eq!(course.organization_id(), inst_course.organization_id());
		assert_ne!(OrganizationCourse::KIND, OrganizationInstitutionCourse::KIND);
	}

	#[test]
	fn course_id_required() {
		let link = NewCourseLink::new(OrganizationId::new(1), "");
		assert_eq!(link.validate().unwrap_err().field, "course_id");

		let link = NewCourseLink::new(OrganizationId::new(1), "x".repeat(256));
		assert!(link.validate().is_err());

		let update = CourseLinkUpdate {
			course_id: Some(String::new()),
			active: None,
		};
		assert!(update.validate().is_err());
	}
}
