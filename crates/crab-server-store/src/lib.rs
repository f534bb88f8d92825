// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job store and reconciliation engine for Crab.
//!
//! [`CrabEngine`] is the entry point. It imports crontabs, records job
//! starts and finishes, and answers queries, persisting through a
//! [`JobStore`] ([`SqliteJobStore`] in practice) and optionally writing
//! job output to a separate [`OutputStore`].

pub mod engine;
pub mod error;
pub mod output_store;
pub mod pool;
pub mod port;
pub mod recorder;
pub mod resolver;
pub mod schema;
pub mod sqlite;
pub mod sync;
pub mod testing;

pub use engine::CrabEngine;
pub use error::{Result, StoreError};
pub use output_store::{FileOutputStore, OutputStore, RawCrontabStore};
pub use pool::create_pool;
pub use port::{JobStore, StoreTransaction};
pub use recorder::{FinishReceipt, OutputOutcome, Report, StartReceipt};
pub use resolver::{resolve_job, Resolution, Resolved, Sighting};
pub use schema::run_migrations;
pub use sqlite::{SqliteJobStore, StoreOptions, DEFAULT_LOCK_TIMEOUT};
pub use sync::{stale_ids, SyncWarning};
