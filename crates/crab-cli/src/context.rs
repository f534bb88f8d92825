// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use anyhow::Context as _;
use crab_server_config::CrabServerConfig;
use crab_server_store::{
	create_pool, run_migrations, CrabEngine, FileOutputStore, SqliteJobStore, StoreOptions,
};
use serde::Serialize;

/// Shared state for command handlers.
pub struct Context {
	pub engine: CrabEngine,
	pub config: CrabServerConfig,
	pub json: bool,
}

impl Context {
	pub async fn open(config: CrabServerConfig, json: bool) -> anyhow::Result<Self> {
		let lock_timeout = config.database.lock_timeout();
		let pool = create_pool(&config.database.url, lock_timeout)
			.await
			.with_context(|| format!("opening database {}", config.database.url))?;
		run_migrations(&pool).await?;

		let store = SqliteJobStore::with_options(pool, StoreOptions { lock_timeout });
		let mut engine = CrabEngine::new(Arc::new(store));
		if let Some(dir) = &config.output.dir {
			tracing::debug!(dir = %dir.display(), "storing job output in files");
			engine = engine.with_output_store(Arc::new(FileOutputStore::new(dir)));
		}

		Ok(Self {
			engine,
			config,
			json,
		})
	}

	pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
		println!("{}", serde_json::to_string_pretty(value)?);
		Ok(())
	}
}
