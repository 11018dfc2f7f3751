// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Version information for orgdir-migrate.

/// Format version info for display.
pub fn format_version_info() -> String {
	let migrations = orgdir_db::embedded_migrations();
	let latest = migrations.last().map(|(v, _)| *v).unwrap_or_default();

	format!(
		"orgdir-migrate version: {}\n\
		 Schema version:         {}\n\
		 Embedded migrations:    {}",
		env!("CARGO_PKG_VERSION"),
		latest,
		migrations.len(),
	)
}
