// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the core domain model.

use thiserror::Error;

/// Errors produced by core type parsing and validation.
#[derive(Debug, Error)]
pub enum CoreError {
	/// A string did not name a known visit state.
	#[error("invalid visit state: {0}")]
	InvalidVisitState(String),

	/// A string did not name a known registration state.
	#[error("invalid registration state: {0}")]
	InvalidRegistrationState(String),

	/// Event keys must be non-empty.
	#[error("event key must not be empty")]
	EmptyEventKey,

	/// Snapshot was written by a newer, unknown schema version.
	#[error("unsupported snapshot version {found} (current is {current})")]
	UnsupportedSnapshotVersion { found: u32, current: u32 },

	/// Snapshot JSON could not be encoded or decoded.
	#[error("snapshot serialization failed: {0}")]
	SnapshotSerialization(#[from] serde_json::Error),
}
