// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned persistence schema for visits.
//!
//! A [`VisitSnapshot`] captures everything needed to restore a visit across
//! process restarts: identity codes, credentials, location, lifecycle state
//! and the ordered hit/event records with their registration states.
//!
//! Forward compatibility rule: decoding ignores unknown fields, added fields
//! must carry `#[serde(default)]`, and a snapshot whose `version` is newer
//! than [`SNAPSHOT_VERSION`] is rejected rather than silently misread.

use serde::{Deserialize, Serialize};

use crate::{AuthToken, CoreError, Event, Hit, SessionCode, VisitState, VisitorCode};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable capture of a visit's full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitSnapshot {
	pub version: u32,
	#[serde(default)]
	pub visitor_code: Option<VisitorCode>,
	#[serde(default)]
	pub session_code: Option<SessionCode>,
	#[serde(default)]
	pub auth_token: Option<AuthToken>,
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default)]
	pub tracking_code: Option<String>,
	#[serde(default)]
	pub url_prefix: Option<String>,
	#[serde(default)]
	pub longitude: Option<String>,
	#[serde(default)]
	pub latitude: Option<String>,
	pub state: VisitState,
	#[serde(default)]
	pub hits: Vec<Hit>,
	#[serde(default)]
	pub events: Vec<Event>,
}

impl VisitSnapshot {
	/// Encodes the snapshot as JSON.
	pub fn to_json(&self) -> Result<String, CoreError> {
		Ok(serde_json::to_string(self)?)
	}

	/// Decodes a snapshot from JSON, rejecting unknown future versions.
	pub fn from_json(json: &str) -> Result<Self, CoreError> {
		let snapshot: VisitSnapshot = serde_json::from_str(json)?;
		if snapshot.version > SNAPSHOT_VERSION {
			return Err(CoreError::UnsupportedSnapshotVersion {
				found: snapshot.version,
				current: SNAPSHOT_VERSION,
			});
		}
		Ok(snapshot)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::RegistrationState;

	fn sample_snapshot() -> VisitSnapshot {
		let mut hit = Hit::new(Some("home".to_string()));
		hit.mark_registered();
		let pending = Hit::new(Some("settings".to_string()));
		let event = Event::new("score", "42", Some(pending.id)).unwrap();
		VisitSnapshot {
			version: SNAPSHOT_VERSION,
			visitor_code: Some("v1".into()),
			session_code: Some("s1".into()),
			auth_token: Some(AuthToken::new("t1")),
			api_key: Some("abc123".to_string()),
			tracking_code: Some("tc".to_string()),
			url_prefix: Some("https://api.example.com".to_string()),
			longitude: Some("29.0".to_string()),
			latitude: Some("41.0".to_string()),
			state: VisitState::Authorised,
			hits: vec![hit, pending],
			events: vec![event],
		}
	}

	#[test]
	fn json_roundtrip_preserves_identity_and_states() {
		let snapshot = sample_snapshot();
		let json = snapshot.to_json().unwrap();
		let decoded = VisitSnapshot::from_json(&json).unwrap();

		assert_eq!(decoded.visitor_code, snapshot.visitor_code);
		assert_eq!(decoded.session_code, snapshot.session_code);
		assert_eq!(decoded.auth_token, snapshot.auth_token);
		assert_eq!(decoded.api_key, snapshot.api_key);
		assert_eq!(decoded.state, snapshot.state);
		assert_eq!(decoded.hits.len(), 2);
		assert_eq!(decoded.hits[0].state, RegistrationState::Registered);
		assert_eq!(decoded.hits[1].state, RegistrationState::Pending);
		assert_eq!(decoded.events[0].hit, Some(snapshot.hits[1].id));
	}

	#[test]
	fn future_version_is_rejected() {
		let mut snapshot = sample_snapshot();
		snapshot.version = SNAPSHOT_VERSION + 1;
		let json = snapshot.to_json().unwrap();
		assert!(matches!(
			VisitSnapshot::from_json(&json),
			Err(CoreError::UnsupportedSnapshotVersion { .. })
		));
	}

	#[test]
	fn unknown_fields_are_ignored() {
		let json = r#"{"version":1,"state":"unstarted","some_future_field":true}"#;
		let decoded = VisitSnapshot::from_json(json).unwrap();
		assert_eq!(decoded.state, VisitState::Unstarted);
		assert!(decoded.hits.is_empty());
	}

	#[test]
	fn token_never_appears_redacted_in_json() {
		// Serde must carry the raw token; only Display/Debug redact.
		let snapshot = sample_snapshot();
		let json = snapshot.to_json().unwrap();
		assert!(json.contains("\"t1\""));
	}
}
