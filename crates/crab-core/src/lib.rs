// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Crab, the cron job history tracker.
//!
//! This crate has no I/O. It provides the job and event model shared by the
//! store and its clients, the crontab codec, and status classification.

pub mod crontab;
pub mod error;
pub mod event;
pub mod job;
pub mod output;
pub mod schedule;
pub mod status;

pub use crontab::{parse_crontab, write_crontab, Observation};
pub use error::{CrabError, Result};
pub use event::{FailEvent, FinishEvent, FinishId, StartEvent};
pub use job::{Job, JobConfig, JobFilter, JobId, JobUpdate, NewJob};
pub use output::{combined_output, JobOutput, OutputKey};
pub use schedule::{is_valid_time, next_run, validate_timezone};
pub use status::{classify_status, CrabStatus};
