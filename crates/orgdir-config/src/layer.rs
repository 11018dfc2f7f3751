// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, LoggingConfigLayer};

/// One partially specified configuration, as loaded from a single source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl DirectoryConfigLayer {
	/// Overlay `other` on top of `self`; set values in `other` win.
	pub fn merge(&mut self, other: DirectoryConfigLayer) {
		if let Some(database) = other.database {
			self.database.get_or_insert_with(Default::default).merge(database);
		}
		if let Some(logging) = other.logging {
			self.logging.get_or_insert_with(Default::default).merge(logging);
		}
	}
}
