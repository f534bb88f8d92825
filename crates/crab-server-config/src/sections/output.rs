// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Output storage configuration.
//!
//! With no directory configured, job output and raw crontabs are kept in
//! the database.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
	pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfigLayer {
	#[serde(default)]
	pub dir: Option<PathBuf>,
}

impl OutputConfigLayer {
	pub fn merge(&mut self, other: OutputConfigLayer) {
		if other.dir.is_some() {
			self.dir = other.dir;
		}
	}

	pub fn finalize(self) -> OutputConfig {
		OutputConfig { dir: self.dir }
	}
}
