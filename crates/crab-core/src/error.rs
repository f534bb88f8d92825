// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for Crab core operations.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CrabError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CrabError {
	#[error("invalid status: {0}")]
	InvalidStatus(String),

	#[error("invalid timezone: {0}")]
	InvalidTimezone(String),

	#[error("invalid schedule: {0}")]
	InvalidSchedule(String),
}
