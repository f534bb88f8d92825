// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for store and engine operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in store and engine operations.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("not found: {0}")]
	NotFound(String),

	/// The store accepted a write but the job could not be identified
	/// afterwards. Points at a bug or a damaged database.
	#[error("store error: {0}")]
	StoreConsistency(String),

	#[error("output store unavailable: {0}")]
	SinkUnavailable(String),

	#[error("invalid output path component: {0}")]
	InvalidPath(String),

	#[error("timed out after {0:?} waiting for the store lock")]
	LockTimeout(Duration),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("internal error: {0}")]
	Internal(String),
}
