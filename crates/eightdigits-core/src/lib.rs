// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for 8digits visit tracking.
//!
//! This crate holds the pure domain model shared by the SDK and any tooling
//! that inspects persisted visits: backend-assigned identifiers, hit and
//! event records with their registration lifecycle, the visit state machine
//! states, and the versioned snapshot schema used for persistence.
//!
//! There is no I/O here; the SDK crate (`eightdigits`) owns the network and
//! concurrency concerns.

mod error;
mod ids;
mod record;
mod snapshot;
mod state;

pub use error::CoreError;
pub use ids::{AuthToken, EventId, HitId, SessionCode, VisitorCode};
pub use record::{Event, Hit, RegistrationState};
pub use snapshot::{VisitSnapshot, SNAPSHOT_VERSION};
pub use state::VisitState;
