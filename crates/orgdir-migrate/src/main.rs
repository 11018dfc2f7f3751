// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organizational directory migration runner.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

mod version;

/// orgdir-migrate - apply the directory schema to the configured database.
#[derive(Parser, Debug)]
#[command(
	name = "orgdir-migrate",
	about = "Apply organizational directory migrations",
	version
)]
struct Args {
	/// TOML configuration file. Defaults to /etc/orgdir/orgdir.toml.
	#[arg(long, env = "ORGDIR_CONFIG")]
	config: Option<PathBuf>,

	/// Create id-only auth_user and django_site tables when the host has not
	#[arg(long)]
	create_host_tables: bool,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
	/// List the embedded migrations without touching the database
	List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	match args.command {
		Some(Command::Version) => {
			println!("{}", version::format_version_info());
			return Ok(());
		}
		Some(Command::List) => {
			for (version, description) in orgdir_db::embedded_migrations() {
				println!("{version:04} {description}");
			}
			return Ok(());
		}
		None => {}
	}

	// RUST_LOG wins; otherwise the configured level replaces the startup
	// filter once the config is loaded.
	let env_filter = EnvFilter::try_from_default_env().ok();
	let from_env = env_filter.is_some();
	let (filter, filter_handle) =
		reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = match &args.config {
		Some(path) => orgdir_config::load_config_with_file(path.clone())?,
		None => orgdir_config::load_config()?,
	};
	if !from_env {
		filter_handle.reload(EnvFilter::new(&config.logging.level))?;
	}

	tracing::info!(
		database = %config.database.url,
		max_connections = config.database.max_connections,
		"applying directory migrations"
	);

	let pool = orgdir_db::create_pool(&config.database).await?;
	if args.create_host_tables {
		orgdir_db::create_host_placeholders(&pool).await?;
	}
	orgdir_db::run_migrations(&pool).await?;
	pool.close().await;

	tracing::info!("migrations complete");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn host_tables_flag_defaults_off() {
		let args = Args::try_parse_from(["orgdir-migrate"]).unwrap();
		assert!(!args.create_host_tables);
		assert!(args.command.is_none());

		let args = Args::try_parse_from(["orgdir-migrate", "--create-host-tables"]).unwrap();
		assert!(args.create_host_tables);
	}
}
