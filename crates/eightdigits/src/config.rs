// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visit configuration and credential resolution.
//!
//! [`VisitConfig`] is the single `start` entry point: it carries every
//! optional credential field, and supplying `auth_token` selects the
//! bypass-authorization path. Unset `tracking_code`/`url_prefix` fall back to
//! a [`Defaults`] store, the Rust counterpart of the bundled plist the
//! original mobile SDK consulted.

use eightdigits_core::AuthToken;

use crate::error::{Result, VisitError};

/// Environment variable supplying the default URL prefix.
pub const URL_PREFIX_ENV: &str = "EIGHTDIGITS_URL_PREFIX";
/// Environment variable supplying the default tracking code.
pub const TRACKING_CODE_ENV: &str = "EIGHTDIGITS_TRACKING_CODE";

/// Default credential values consulted when a `start` config leaves the
/// corresponding field unset.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
	pub url_prefix: Option<String>,
	pub tracking_code: Option<String>,
}

impl Defaults {
	/// An empty store with no defaults.
	#[must_use]
	pub fn none() -> Self {
		Self::default()
	}

	/// Loads defaults from the `EIGHTDIGITS_URL_PREFIX` and
	/// `EIGHTDIGITS_TRACKING_CODE` environment variables. Unset or empty
	/// variables contribute nothing.
	#[must_use]
	pub fn from_env() -> Self {
		let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
		Self {
			url_prefix: non_empty(URL_PREFIX_ENV),
			tracking_code: non_empty(TRACKING_CODE_ENV),
		}
	}

	/// Explicit defaults supplied by application startup code.
	#[must_use]
	pub fn new(url_prefix: impl Into<String>, tracking_code: impl Into<String>) -> Self {
		Self {
			url_prefix: Some(url_prefix.into()),
			tracking_code: Some(tracking_code.into()),
		}
	}
}

/// Configuration for starting a visit.
///
/// All fields are optional at construction; validation happens when the
/// visit starts. Either `auth_token` must be present (bypass path) or
/// `api_key` plus a resolvable `tracking_code` and `url_prefix`.
#[derive(Debug, Clone, Default)]
pub struct VisitConfig {
	pub(crate) api_key: Option<String>,
	pub(crate) tracking_code: Option<String>,
	pub(crate) url_prefix: Option<String>,
	pub(crate) auth_token: Option<AuthToken>,
	pub(crate) longitude: Option<String>,
	pub(crate) latitude: Option<String>,
}

impl VisitConfig {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	pub fn tracking_code(mut self, code: impl Into<String>) -> Self {
		self.tracking_code = Some(code.into());
		self
	}

	pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.url_prefix = Some(prefix.into());
		self
	}

	/// Supplies an already-authorised token, bypassing the credential
	/// exchange. Use this to keep the api key out of the shipped binary.
	pub fn auth_token(mut self, token: impl Into<String>) -> Self {
		self.auth_token = Some(AuthToken::new(token));
		self
	}

	pub fn location(mut self, longitude: impl Into<String>, latitude: impl Into<String>) -> Self {
		self.longitude = Some(longitude.into());
		self.latitude = Some(latitude.into());
		self
	}

	/// Validates the config against the defaults store and picks the start
	/// path.
	pub(crate) fn resolve(self, defaults: &Defaults) -> Result<StartMode> {
		let url_prefix = self
			.url_prefix
			.or_else(|| defaults.url_prefix.clone())
			.filter(|v| !v.is_empty())
			.ok_or_else(|| {
				VisitError::Configuration(
					"urlPrefix is not set and no default is configured".to_string(),
				)
			})?;
		let url_prefix = url_prefix.trim_end_matches('/').to_string();

		let tracking_code = self
			.tracking_code
			.or_else(|| defaults.tracking_code.clone())
			.filter(|v| !v.is_empty());

		if let Some(token) = self.auth_token {
			if token.is_empty() {
				return Err(VisitError::Configuration(
					"authToken must not be empty".to_string(),
				));
			}
			return Ok(StartMode::Bypass {
				auth_token: token,
				url_prefix,
				tracking_code,
			});
		}

		let api_key = self
			.api_key
			.filter(|v| !v.is_empty())
			.ok_or_else(|| VisitError::Configuration("apiKey must be set".to_string()))?;
		let tracking_code = tracking_code.ok_or_else(|| {
			VisitError::Configuration(
				"trackingCode is not set and no default is configured".to_string(),
			)
		})?;

		Ok(StartMode::Exchange {
			api_key,
			tracking_code,
			url_prefix,
			longitude: self.longitude,
			latitude: self.latitude,
		})
	}
}

/// Resolved start path for a visit.
#[derive(Debug, Clone)]
pub(crate) enum StartMode {
	/// Full credential exchange against the backend.
	Exchange {
		api_key: String,
		tracking_code: String,
		url_prefix: String,
		longitude: Option<String>,
		latitude: Option<String>,
	},
	/// Token supplied directly; session treated as authorised immediately.
	Bypass {
		auth_token: AuthToken,
		url_prefix: String,
		tracking_code: Option<String>,
	},
}
