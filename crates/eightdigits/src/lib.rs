// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! 8digits visit tracking SDK for Rust.
//!
//! This crate tracks a "visit" (one application usage session) with the
//! 8digits analytics service, records "hits" (screen views) and "events"
//! (key/value interactions) within that visit, and manages the session's
//! authorization token.
//!
//! # Features
//!
//! - **Single `start` entry point**: one [`VisitConfig`] carries every
//!   credential field; supplying an auth token selects the
//!   bypass-authorization path
//! - **Durable queueing**: hits and events created before authorization (or
//!   during outages) stay queued and register in creation order once the
//!   session is authorised
//! - **Status channel**: authorization transitions broadcast over a watch
//!   channel instead of an implicit global notification
//! - **Persistence**: a versioned snapshot restores a visit across process
//!   restarts, including per-record registration state
//!
//! Tracking is fire-and-forget: configuration and state errors are returned
//! synchronously, but network failures never propagate to the call that
//! caused them — a tracking outage must not break the host application.
//!
//! # Example
//!
//! ```ignore
//! use eightdigits::{CurrentVisit, Visit, VisitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let current = CurrentVisit::new();
//!     let visit = Visit::builder().current_slot(current.clone()).build()?;
//!
//!     visit
//!         .start(
//!             VisitConfig::new()
//!                 .api_key("your_api_key")
//!                 .tracking_code("your_tracking_code")
//!                 .url_prefix("https://api.8digits.com/api"),
//!         )
//!         .await?;
//!
//!     let hit = visit.create_hit_for_screen("home").await?;
//!     visit.trigger_event_for_hit("tap", "buy_button", hit).await?;
//!     visit.trigger_event("score", "42").await?;
//!
//!     visit.end().await?;
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod error;
mod logger;
mod registry;
mod visit;

pub use backend::{AuthGrant, AuthRequest, Backend, EventPayload, HitPayload, HttpBackend};
pub use config::{Defaults, VisitConfig, TRACKING_CODE_ENV, URL_PREFIX_ENV};
pub use error::{Result, VisitError};
pub use logger::{Activity, ActivitySink};
pub use visit::{AuthStatus, CurrentVisit, Visit, VisitBuilder};

// Re-export core types for convenience
pub use eightdigits_core::{
	AuthToken, Event, EventId, Hit, HitId, RegistrationState, SessionCode, VisitSnapshot,
	VisitState, VisitorCode,
};
pub use eightdigits_http::RetryConfig;
