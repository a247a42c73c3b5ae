// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Activity logging for registration and authorization outcomes.
//!
//! Purely observational: toggling logging never affects the visit state
//! machine. Outcomes always go to `tracing`; while logging is enabled they
//! are additionally delivered to an optional [`ActivitySink`] so host apps
//! and tests can capture the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eightdigits_core::{EventId, HitId, VisitorCode};
use tracing::{info, warn};

/// One observed SDK activity.
#[derive(Debug, Clone)]
pub enum Activity {
	AuthorizationSucceeded { visitor_code: VisitorCode },
	AuthorizationFailed { reason: String },
	HitRegistered { id: HitId },
	HitFailed { id: HitId, reason: String },
	EventRegistered { id: EventId },
	EventFailed { id: EventId, reason: String },
	VisitEnded,
}

/// Receives activities while logging is enabled.
pub trait ActivitySink: Send + Sync {
	fn record(&self, activity: &Activity);
}

/// Observer of registration successes and failures.
///
/// Disabled by default; may be toggled at any time, including before the
/// visit starts.
pub(crate) struct ActivityLogger {
	enabled: AtomicBool,
	sink: Option<Arc<dyn ActivitySink>>,
}

impl ActivityLogger {
	pub(crate) fn new(sink: Option<Arc<dyn ActivitySink>>) -> Self {
		Self {
			enabled: AtomicBool::new(false),
			sink,
		}
	}

	pub(crate) fn start_logging(&self) {
		self.enabled.store(true, Ordering::SeqCst);
	}

	pub(crate) fn stop_logging(&self) {
		self.enabled.store(false, Ordering::SeqCst);
	}

	pub(crate) fn is_logging(&self) -> bool {
		self.enabled.load(Ordering::SeqCst)
	}

	pub(crate) fn record(&self, activity: Activity) {
		match &activity {
			Activity::AuthorizationSucceeded { visitor_code } => {
				info!(visitor_code = %visitor_code, "Visit authorised");
			}
			Activity::AuthorizationFailed { reason } => {
				warn!(reason = %reason, "Visit authorization failed");
			}
			Activity::HitRegistered { id } => {
				info!(hit = %id, "Hit registered");
			}
			Activity::HitFailed { id, reason } => {
				warn!(hit = %id, reason = %reason, "Hit registration failed");
			}
			Activity::EventRegistered { id } => {
				info!(event = %id, "Event registered");
			}
			Activity::EventFailed { id, reason } => {
				warn!(event = %id, reason = %reason, "Event registration failed");
			}
			Activity::VisitEnded => {
				info!("Visit ended");
			}
		}

		if self.is_logging() {
			if let Some(sink) = &self.sink {
				sink.record(&activity);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	struct CapturingSink {
		seen: Mutex<Vec<Activity>>,
	}

	impl ActivitySink for CapturingSink {
		fn record(&self, activity: &Activity) {
			self.seen.lock().unwrap().push(activity.clone());
		}
	}

	#[test]
	fn logging_is_off_by_default() {
		let logger = ActivityLogger::new(None);
		assert!(!logger.is_logging());
	}

	#[test]
	fn sink_only_receives_while_enabled() {
		let sink = Arc::new(CapturingSink {
			seen: Mutex::new(Vec::new()),
		});
		let logger = ActivityLogger::new(Some(sink.clone()));

		logger.record(Activity::VisitEnded);
		assert!(sink.seen.lock().unwrap().is_empty());

		logger.start_logging();
		logger.record(Activity::HitRegistered { id: HitId::new() });
		assert_eq!(sink.seen.lock().unwrap().len(), 1);

		logger.stop_logging();
		logger.record(Activity::VisitEnded);
		assert_eq!(sink.seen.lock().unwrap().len(), 1);
	}

	#[test]
	fn record_without_sink_does_not_panic() {
		let logger = ActivityLogger::new(None);
		logger.start_logging();
		logger.record(Activity::AuthorizationFailed {
			reason: "network".to_string(),
		});
	}
}
