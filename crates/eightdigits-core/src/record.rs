// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hit and event records and their registration lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, EventId, HitId};

/// Registration state of a hit or event.
///
/// Records start `Pending`, become `Registered` once the backend accepts
/// them, or `Failed` when a submission is rejected or the network is
/// unreachable. `Registered` is terminal; `Failed` records are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
	/// Not yet submitted, or waiting on visit authorization.
	Pending,
	/// Durably accepted by the backend.
	Registered,
	/// Last submission attempt failed; eligible for retry.
	Failed,
}

impl RegistrationState {
	/// Whether this record still needs a registration attempt.
	#[must_use]
	pub fn needs_registration(&self) -> bool {
		matches!(self, RegistrationState::Pending | RegistrationState::Failed)
	}

	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			RegistrationState::Pending => "pending",
			RegistrationState::Registered => "registered",
			RegistrationState::Failed => "failed",
		}
	}
}

impl std::fmt::Display for RegistrationState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl std::str::FromStr for RegistrationState {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(RegistrationState::Pending),
			"registered" => Ok(RegistrationState::Registered),
			"failed" => Ok(RegistrationState::Failed),
			_ => Err(CoreError::InvalidRegistrationState(s.to_string())),
		}
	}
}

/// One tracked screen/page view within a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
	pub id: HitId,
	/// Screen or controller context, when the host app supplies one.
	pub screen: Option<String>,
	pub state: RegistrationState,
	pub created_at: DateTime<Utc>,
	pub registered_at: Option<DateTime<Utc>>,
}

impl Hit {
	#[must_use]
	pub fn new(screen: Option<String>) -> Self {
		Self {
			id: HitId::new(),
			screen,
			state: RegistrationState::Pending,
			created_at: Utc::now(),
			registered_at: None,
		}
	}

	/// Marks the hit as durably registered. Terminal.
	pub fn mark_registered(&mut self) {
		self.state = RegistrationState::Registered;
		self.registered_at = Some(Utc::now());
	}

	/// Marks a submission failure. No-op once registered.
	pub fn mark_failed(&mut self) {
		if self.state != RegistrationState::Registered {
			self.state = RegistrationState::Failed;
		}
	}

	/// Resets a non-registered hit to pending, used when the session must
	/// re-authorize before retrying.
	pub fn demote_to_pending(&mut self) {
		if self.state != RegistrationState::Registered {
			self.state = RegistrationState::Pending;
		}
	}
}

/// One tracked key/value interaction, optionally tied to a hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	pub id: EventId,
	pub key: String,
	pub value: String,
	/// Hit this event is scoped to; `None` scopes it to the visit directly.
	pub hit: Option<HitId>,
	pub state: RegistrationState,
	pub created_at: DateTime<Utc>,
	pub registered_at: Option<DateTime<Utc>>,
}

impl Event {
	/// Creates a pending event. The key must be non-empty; the value may be
	/// empty.
	pub fn new(
		key: impl Into<String>,
		value: impl Into<String>,
		hit: Option<HitId>,
	) -> Result<Self, CoreError> {
		let key = key.into();
		if key.is_empty() {
			return Err(CoreError::EmptyEventKey);
		}
		Ok(Self {
			id: EventId::new(),
			key,
			value: value.into(),
			hit,
			state: RegistrationState::Pending,
			created_at: Utc::now(),
			registered_at: None,
		})
	}

	/// Marks the event as durably registered. Terminal.
	pub fn mark_registered(&mut self) {
		self.state = RegistrationState::Registered;
		self.registered_at = Some(Utc::now());
	}

	/// Marks a submission failure. No-op once registered.
	pub fn mark_failed(&mut self) {
		if self.state != RegistrationState::Registered {
			self.state = RegistrationState::Failed;
		}
	}

	/// Resets a non-registered event to pending for post-reauthorization
	/// retry.
	pub fn demote_to_pending(&mut self) {
		if self.state != RegistrationState::Registered {
			self.state = RegistrationState::Pending;
		}
	}
}
