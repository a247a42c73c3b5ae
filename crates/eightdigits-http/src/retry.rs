// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry with bounded exponential backoff and full jitter.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that can classify themselves as transient.
pub trait RetryableError {
	/// Returns `true` if the operation that produced this error may succeed
	/// on a later attempt.
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => {
				matches!(status.as_u16(), 429 | 408 | 500 | 502 | 503 | 504)
			}
			None => false,
		}
	}
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total number of attempts, including the first.
	pub max_attempts: u32,
	/// Delay before the first retry.
	pub initial_backoff: Duration,
	/// Upper bound on any single backoff delay.
	pub max_backoff: Duration,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_backoff: Duration::from_millis(500),
			max_backoff: Duration::from_secs(10),
		}
	}
}

impl RetryConfig {
	/// A config that never retries; useful for tests and final best-effort
	/// flushes.
	#[must_use]
	pub fn no_retries() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	/// Backoff for the given zero-based retry index, with full jitter.
	fn backoff(&self, retry_index: u32) -> Duration {
		let exp = self
			.initial_backoff
			.saturating_mul(2u32.saturating_pow(retry_index))
			.min(self.max_backoff);
		exp.mul_f64(fastrand::f64())
	}
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is exhausted. Returns the last error in the failure cases.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempt = 0u32;
	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				attempt += 1;
				if attempt >= config.max_attempts.max(1) || !err.is_retryable() {
					return Err(err);
				}
				let delay = config.backoff(attempt - 1);
				warn!(
					error = %err,
					attempt,
					delay_ms = delay.as_millis() as u64,
					"Transient failure, retrying"
				);
				tokio::time::sleep(delay).await;
				debug!(attempt = attempt + 1, "Retrying operation");
			}
		}
	}
}
