// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod database;
mod engine;
mod logging;
mod output;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use engine::{EngineConfig, EngineConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use output::{OutputConfig, OutputConfigLayer};
