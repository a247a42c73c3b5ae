// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier types for visits, hits and events.
//!
//! `VisitorCode` and `SessionCode` are assigned by the 8digits backend during
//! the authorization exchange. `HitId` and `EventId` are generated client-side
//! so records can be tracked before the backend has acknowledged them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable per-device identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitorCode(pub String);

impl VisitorCode {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for VisitorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for VisitorCode {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

impl From<String> for VisitorCode {
	fn from(s: String) -> Self {
		Self(s)
	}
}

/// Per-session identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionCode(pub String);

impl SessionCode {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SessionCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for SessionCode {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

impl From<String> for SessionCode {
	fn from(s: String) -> Self {
		Self(s)
	}
}

/// Opaque credential proving an authorised session.
///
/// `Display` and `Debug` redact the token so it cannot leak through logs;
/// use [`AuthToken::expose`] to read the raw value when building requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	/// Returns the raw token value.
	#[must_use]
	pub fn expose(&self) -> &str {
		&self.0
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl std::fmt::Display for AuthToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let visible = self.0.chars().take(4).collect::<String>();
		write!(f, "{visible}…(redacted)")
	}
}

impl std::fmt::Debug for AuthToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "AuthToken({self})")
	}
}

/// Unique identifier for a hit, generated client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitId(pub Uuid);

impl HitId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for HitId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for HitId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for HitId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Unique identifier for an event, generated client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for EventId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn auth_token_display_is_redacted() {
		let token = AuthToken::new("super-secret-token-value");
		let shown = token.to_string();
		assert!(!shown.contains("secret-token"));
		assert!(shown.contains("redacted"));
	}

	#[test]
	fn auth_token_debug_is_redacted() {
		let token = AuthToken::new("super-secret-token-value");
		let shown = format!("{token:?}");
		assert!(!shown.contains("secret-token"));
	}

	#[test]
	fn auth_token_expose_returns_raw_value() {
		let token = AuthToken::new("t1");
		assert_eq!(token.expose(), "t1");
	}

	#[test]
	fn visitor_and_session_codes_display() {
		assert_eq!(VisitorCode::from("v1").to_string(), "v1");
		assert_eq!(SessionCode::from("s1").to_string(), "s1");
	}

	proptest! {
		#[test]
		fn hit_id_is_unique(_seed: u64) {
			prop_assert_ne!(HitId::new(), HitId::new());
		}

		#[test]
		fn hit_id_roundtrip(bytes in any::<[u8; 16]>()) {
			let id = HitId(Uuid::from_bytes(bytes));
			let parsed: HitId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}

		#[test]
		fn event_id_roundtrip(bytes in any::<[u8; 16]>()) {
			let id = EventId(Uuid::from_bytes(bytes));
			let parsed: EventId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}
}
