// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visit lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a visit.
///
/// Transitions: `Unstarted → Authorizing → Authorised`, with
/// `AuthorizationFailed` reachable from `Authorizing` (and from `Authorised`
/// when the backend rejects a bypass token). `Ended` is reachable from
/// `Authorised` and `AuthorizationFailed` and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitState {
	/// Created but `start` has not been called.
	Unstarted,
	/// Authorization exchange in flight.
	Authorizing,
	/// Backend granted an auth token; registrations may proceed.
	Authorised,
	/// Backend rejected credentials or was unreachable; retryable.
	AuthorizationFailed,
	/// Visit ended; no further hits or events accepted.
	Ended,
}

impl VisitState {
	/// Whether new hits and events may be created in this state.
	///
	/// Records created before authorization stay pending until the visit
	/// becomes authorised; only `Ended` refuses creation.
	#[must_use]
	pub fn accepts_records(&self) -> bool {
		!matches!(self, VisitState::Ended)
	}

	/// Whether queued registrations may be submitted in this state.
	#[must_use]
	pub fn allows_registration(&self) -> bool {
		matches!(self, VisitState::Authorised)
	}

	#[must_use]
	pub fn is_ended(&self) -> bool {
		matches!(self, VisitState::Ended)
	}

	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			VisitState::Unstarted => "unstarted",
			VisitState::Authorizing => "authorizing",
			VisitState::Authorised => "authorised",
			VisitState::AuthorizationFailed => "authorization_failed",
			VisitState::Ended => "ended",
		}
	}
}

impl std::fmt::Display for VisitState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl std::str::FromStr for VisitState {
	type Err = crate::CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"unstarted" => Ok(VisitState::Unstarted),
			"authorizing" => Ok(VisitState::Authorizing),
			"authorised" => Ok(VisitState::Authorised),
			"authorization_failed" => Ok(VisitState::AuthorizationFailed),
			"ended" => Ok(VisitState::Ended),
			_ => Err(crate::CoreError::InvalidVisitState(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn ended_refuses_records() {
		assert!(!VisitState::Ended.accepts_records());
		assert!(VisitState::Unstarted.accepts_records());
		assert!(VisitState::Authorizing.accepts_records());
		assert!(VisitState::AuthorizationFailed.accepts_records());
	}

	#[test]
	fn only_authorised_allows_registration() {
		for state in [
			VisitState::Unstarted,
			VisitState::Authorizing,
			VisitState::AuthorizationFailed,
			VisitState::Ended,
		] {
			assert!(!state.allows_registration(), "{state} should not register");
		}
		assert!(VisitState::Authorised.allows_registration());
	}

	#[test]
	fn parse_rejects_unknown() {
		assert!("bogus".parse::<VisitState>().is_err());
	}

	proptest! {
		#[test]
		fn state_string_roundtrip(state in prop_oneof![
			Just(VisitState::Unstarted),
			Just(VisitState::Authorizing),
			Just(VisitState::Authorised),
			Just(VisitState::AuthorizationFailed),
			Just(VisitState::Ended),
		]) {
			let parsed: VisitState = state.to_string().parse().unwrap();
			prop_assert_eq!(state, parsed);
		}

		#[test]
		fn state_serde_roundtrip(state in prop_oneof![
			Just(VisitState::Unstarted),
			Just(VisitState::Authorizing),
			Just(VisitState::Authorised),
			Just(VisitState::AuthorizationFailed),
			Just(VisitState::Ended),
		]) {
			let json = serde_json::to_string(&state).unwrap();
			let parsed: VisitState = serde_json::from_str(&json).unwrap();
			prop_assert_eq!(state, parsed);
		}
	}
}
