// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for tests against an in-memory database.

use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::engine::CrabEngine;
use crate::schema::run_migrations;
use crate::sqlite::SqliteJobStore;

/// A single-connection in-memory pool with the schema applied.
///
/// The connection is never recycled, since that would discard the database.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect(":memory:")
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

pub async fn create_test_store() -> SqliteJobStore {
	SqliteJobStore::new(create_test_pool().await)
}

pub async fn create_test_engine() -> CrabEngine {
	CrabEngine::new(Arc::new(create_test_store().await))
}
