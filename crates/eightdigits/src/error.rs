// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the 8digits SDK.
//!
//! Configuration, state and argument errors are returned synchronously to the
//! caller. Network-derived errors (authorization, registration) are never
//! returned from the tracking calls that caused them; they surface through
//! the status channel and the activity logger instead, so tracking failures
//! cannot crash or block host application logic.

use eightdigits_core::{CoreError, VisitState};
use eightdigits_http::RetryableError;
use thiserror::Error;

/// 8digits SDK errors.
#[derive(Debug, Error)]
pub enum VisitError {
	/// A required credential or default is missing at `start` time.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// Operation attempted in a state that forbids it.
	#[error("{operation} is not valid while the visit is {state}")]
	InvalidState {
		operation: &'static str,
		state: VisitState,
	},

	/// Malformed argument, e.g. an empty event key or an unknown hit id.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// Backend rejected the session credentials or auth token.
	#[error("authorization rejected ({status}): {message}")]
	Authorization { status: u16, message: String },

	/// Backend rejected a hit or event registration.
	#[error("registration rejected ({status}): {message}")]
	Registration { status: u16, message: String },

	/// HTTP transport failure.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Rate limited by the backend.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// The visit has ended; no further hits or events are accepted.
	#[error("visit has ended")]
	VisitEnded,

	/// Core domain validation failed.
	#[error(transparent)]
	Core(#[from] CoreError),
}

impl RetryableError for VisitError {
	fn is_retryable(&self) -> bool {
		match self {
			VisitError::RequestFailed(e) => e.is_retryable(),
			VisitError::Authorization { status, .. } | VisitError::Registration { status, .. } => {
				matches!(*status, 429 | 408 | 500 | 502 | 503 | 504)
			}
			VisitError::RateLimited { .. } => true,
			_ => false,
		}
	}
}

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, VisitError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_rejections_retryable_statuses() {
		for status in [429, 408, 500, 502, 503, 504] {
			let err = VisitError::Registration {
				status,
				message: "test".to_string(),
			};
			assert!(err.is_retryable(), "status {status} should be retryable");
		}
	}

	#[test]
	fn auth_rejection_is_not_retryable() {
		let err = VisitError::Authorization {
			status: 401,
			message: "bad token".to_string(),
		};
		assert!(!err.is_retryable());
	}

	#[test]
	fn rate_limited_is_retryable() {
		let err = VisitError::RateLimited {
			retry_after_secs: Some(30),
		};
		assert!(err.is_retryable());
	}

	#[test]
	fn configuration_error_is_not_retryable() {
		let err = VisitError::Configuration("missing apiKey".to_string());
		assert!(!err.is_retryable());
	}

	#[test]
	fn invalid_state_is_not_retryable() {
		let err = VisitError::InvalidState {
			operation: "start",
			state: VisitState::Ended,
		};
		assert!(!err.is_retryable());
		assert!(err.to_string().contains("start"));
		assert!(err.to_string().contains("ended"));
	}
}
