// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The visit session: authorization state machine and registration pipeline.
//!
//! A [`Visit`] is a cheaply cloneable handle over shared state. `start`
//! resolves credentials, runs the authorization exchange (or the token
//! bypass) and then drains queued hits and events strictly in creation
//! order. Network failures never propagate back to the tracking call that
//! caused them; they surface through the status channel and the activity
//! logger.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use eightdigits_core::{
	AuthToken, Event, EventId, Hit, HitId, SessionCode, VisitSnapshot, VisitState, VisitorCode,
	SNAPSHOT_VERSION,
};
use eightdigits_http::RetryConfig;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::backend::{AuthRequest, Backend, EventPayload, HitPayload, HttpBackend};
use crate::config::{Defaults, StartMode, VisitConfig};
use crate::error::{Result, VisitError};
use crate::logger::{Activity, ActivityLogger, ActivitySink};
use crate::registry::{Record, Registry};

/// Authorization status broadcast on every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthStatus {
	pub state: VisitState,
	pub authorised: bool,
}

impl AuthStatus {
	fn from_state(state: VisitState) -> Self {
		Self {
			state,
			authorised: matches!(state, VisitState::Authorised),
		}
	}
}

/// Explicit, resettable reference to the most recently started visit.
///
/// There is no process-wide global: application startup code owns one of
/// these and passes it to [`VisitBuilder::current_slot`]. Starting a new
/// visit replaces the reference (last start wins) without ending the
/// previous visit.
#[derive(Clone, Default)]
pub struct CurrentVisit {
	slot: Arc<RwLock<Option<Visit>>>,
}

impl CurrentVisit {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, visit: &Visit) {
		*self.slot.write().expect("current visit lock poisoned") = Some(visit.clone());
	}

	#[must_use]
	pub fn get(&self) -> Option<Visit> {
		self.slot.read().expect("current visit lock poisoned").clone()
	}

	pub fn clear(&self) {
		*self.slot.write().expect("current visit lock poisoned") = None;
	}

	#[must_use]
	pub fn is_set(&self) -> bool {
		self.slot.read().expect("current visit lock poisoned").is_some()
	}
}

/// Mutable session fields, guarded by one lock. Never held across awaits.
struct Session {
	state: VisitState,
	mode: Option<StartMode>,
	api_key: Option<String>,
	tracking_code: Option<String>,
	url_prefix: Option<String>,
	longitude: Option<String>,
	latitude: Option<String>,
	visitor_code: Option<VisitorCode>,
	session_code: Option<SessionCode>,
	auth_token: Option<AuthToken>,
	backend: Option<Arc<dyn Backend>>,
}

impl Session {
	fn unstarted() -> Self {
		Self {
			state: VisitState::Unstarted,
			mode: None,
			api_key: None,
			tracking_code: None,
			url_prefix: None,
			longitude: None,
			latitude: None,
			visitor_code: None,
			session_code: None,
			auth_token: None,
			backend: None,
		}
	}
}

struct VisitInner {
	session: RwLock<Session>,
	registry: Registry,
	logger: ActivityLogger,
	status_tx: watch::Sender<AuthStatus>,
	/// Serializes registration flushes so records go out strictly FIFO.
	flush_lock: Mutex<()>,
	defaults: Defaults,
	backend_override: Option<Arc<dyn Backend>>,
	request_timeout: Duration,
	retry_config: RetryConfig,
	current_slot: Option<CurrentVisit>,
}

/// Builder for constructing a [`Visit`].
pub struct VisitBuilder {
	defaults: Defaults,
	backend: Option<Arc<dyn Backend>>,
	retry_config: RetryConfig,
	request_timeout: Duration,
	current_slot: Option<CurrentVisit>,
	activity_sink: Option<Arc<dyn ActivitySink>>,
	snapshot: Option<VisitSnapshot>,
}

impl VisitBuilder {
	/// Creates a new builder with default settings.
	#[must_use]
	pub fn new() -> Self {
		Self {
			defaults: Defaults::none(),
			backend: None,
			retry_config: RetryConfig::default(),
			request_timeout: Duration::from_secs(30),
			current_slot: None,
			activity_sink: None,
			snapshot: None,
		}
	}

	/// Sets the defaults store consulted for unset config fields.
	pub fn defaults(mut self, defaults: Defaults) -> Self {
		self.defaults = defaults;
		self
	}

	/// Substitutes the backend transport. Intended for tests and embedders
	/// with custom transports; production uses the HTTP backend built from
	/// the resolved URL prefix.
	pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
		self.backend = Some(backend);
		self
	}

	/// Sets the retry configuration for backend requests.
	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Registers this visit into a [`CurrentVisit`] slot when it starts.
	pub fn current_slot(mut self, slot: CurrentVisit) -> Self {
		self.current_slot = Some(slot);
		self
	}

	/// Attaches an activity sink receiving registration outcomes while
	/// logging is enabled.
	pub fn activity_sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
		self.activity_sink = Some(sink);
		self
	}

	/// Restores session identity, credentials and records from a snapshot.
	pub fn from_snapshot(mut self, snapshot: VisitSnapshot) -> Self {
		self.snapshot = Some(snapshot);
		self
	}

	/// Builds the visit.
	pub fn build(self) -> Result<Visit> {
		let (session, registry) = match self.snapshot {
			None => (Session::unstarted(), Registry::new()),
			Some(snapshot) => {
				// An interrupted exchange did not complete; restart it.
				let state = if snapshot.state == VisitState::Authorizing {
					VisitState::Unstarted
				} else {
					snapshot.state
				};
				if state == VisitState::Authorised && snapshot.auth_token.is_none() {
					return Err(VisitError::Configuration(
						"snapshot marked authorised without an auth token".to_string(),
					));
				}

				let backend = match (&self.backend, &snapshot.url_prefix) {
					(Some(backend), _) => Some(Arc::clone(backend)),
					(None, Some(url_prefix)) => Some(Arc::new(HttpBackend::new(
						url_prefix.clone(),
						self.request_timeout,
						self.retry_config.clone(),
					)?) as Arc<dyn Backend>),
					(None, None) => None,
				};

				let mode = match (&snapshot.auth_token, &snapshot.api_key) {
					(Some(token), _) if snapshot.api_key.is_none() => {
						snapshot.url_prefix.as_ref().map(|url| StartMode::Bypass {
							auth_token: token.clone(),
							url_prefix: url.clone(),
							tracking_code: snapshot.tracking_code.clone(),
						})
					}
					(_, Some(api_key)) => match (&snapshot.tracking_code, &snapshot.url_prefix) {
						(Some(tc), Some(url)) => Some(StartMode::Exchange {
							api_key: api_key.clone(),
							tracking_code: tc.clone(),
							url_prefix: url.clone(),
							longitude: snapshot.longitude.clone(),
							latitude: snapshot.latitude.clone(),
						}),
						_ => None,
					},
					_ => None,
				};

				let session = Session {
					state,
					mode,
					api_key: snapshot.api_key,
					tracking_code: snapshot.tracking_code,
					url_prefix: snapshot.url_prefix,
					longitude: snapshot.longitude,
					latitude: snapshot.latitude,
					visitor_code: snapshot.visitor_code,
					session_code: snapshot.session_code,
					auth_token: snapshot.auth_token,
					backend,
				};
				(session, Registry::from_records(snapshot.hits, snapshot.events))
			}
		};

		let (status_tx, _) = watch::channel(AuthStatus::from_state(session.state));
		Ok(Visit {
			inner: Arc::new(VisitInner {
				session: RwLock::new(session),
				registry,
				logger: ActivityLogger::new(self.activity_sink),
				status_tx,
				flush_lock: Mutex::new(()),
				defaults: self.defaults,
				backend_override: self.backend,
				request_timeout: self.request_timeout,
				retry_config: self.retry_config,
				current_slot: self.current_slot,
			}),
		})
	}
}

impl Default for VisitBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// One tracked application usage session.
#[derive(Clone)]
pub struct Visit {
	inner: Arc<VisitInner>,
}

impl Visit {
	/// Creates a new builder for constructing a visit.
	#[must_use]
	pub fn builder() -> VisitBuilder {
		VisitBuilder::new()
	}

	/// Starts the visit.
	///
	/// Valid only while `Unstarted`. Configuration and state errors are
	/// returned synchronously and leave the visit `Unstarted`; authorization
	/// failures after that point are not returned here — they move the visit
	/// to `AuthorizationFailed` and surface through [`Visit::subscribe`] and
	/// the activity logger. Callers that must not block on the exchange can
	/// spawn this future.
	pub async fn start(&self, config: VisitConfig) -> Result<()> {
		let mode = {
			let mut session = self.inner.session.write().expect("session lock poisoned");
			if session.state != VisitState::Unstarted {
				return Err(VisitError::InvalidState {
					operation: "start",
					state: session.state,
				});
			}

			// Location set before start feeds the exchange unless the config
			// carries its own.
			let mut config = config;
			if config.longitude.is_none() {
				config.longitude = session.longitude.clone();
			}
			if config.latitude.is_none() {
				config.latitude = session.latitude.clone();
			}

			let mode = config.resolve(&self.inner.defaults)?;
			self.apply_mode(&mut session, &mode)?;
			mode
		};

		// Last start wins; replacing does not end the previous visit.
		if let Some(slot) = &self.inner.current_slot {
			slot.set(self);
		}
		self.broadcast();

		match mode {
			StartMode::Bypass { .. } => {
				info!("Visit started with supplied auth token");
				self.flush_records(false).await;
			}
			StartMode::Exchange { .. } => {
				self.run_exchange().await;
			}
		}
		Ok(())
	}

	/// Stores resolved credentials and moves to the mode's initial state.
	fn apply_mode(&self, session: &mut Session, mode: &StartMode) -> Result<()> {
		let backend = |url_prefix: &str| -> Result<Arc<dyn Backend>> {
			match &self.inner.backend_override {
				Some(backend) => Ok(Arc::clone(backend)),
				None => Ok(Arc::new(HttpBackend::new(
					url_prefix,
					self.inner.request_timeout,
					self.inner.retry_config.clone(),
				)?) as Arc<dyn Backend>),
			}
		};

		match mode {
			StartMode::Exchange {
				api_key,
				tracking_code,
				url_prefix,
				longitude,
				latitude,
			} => {
				session.backend = Some(backend(url_prefix)?);
				session.api_key = Some(api_key.clone());
				session.tracking_code = Some(tracking_code.clone());
				session.url_prefix = Some(url_prefix.clone());
				session.longitude = longitude.clone();
				session.latitude = latitude.clone();
				session.state = VisitState::Authorizing;
			}
			StartMode::Bypass {
				auth_token,
				url_prefix,
				tracking_code,
			} => {
				session.backend = Some(backend(url_prefix)?);
				session.auth_token = Some(auth_token.clone());
				session.tracking_code = tracking_code.clone();
				session.url_prefix = Some(url_prefix.clone());
				// Optimistic: the token is trusted until the backend rejects
				// a registration made with it.
				session.state = VisitState::Authorised;
			}
		}
		session.mode = Some(mode.clone());
		Ok(())
	}

	/// Runs the credential exchange and applies the outcome.
	async fn run_exchange(&self) {
		let (backend, request) = {
			let session = self.inner.session.read().expect("session lock poisoned");
			let Some(StartMode::Exchange {
				api_key,
				tracking_code,
				longitude,
				latitude,
				..
			}) = session.mode.clone()
			else {
				return;
			};
			let Some(backend) = session.backend.clone() else {
				return;
			};
			(
				backend,
				AuthRequest {
					api_key,
					tracking_code,
					longitude,
					latitude,
				},
			)
		};

		debug!("Starting authorization exchange");
		match backend.authorize(&request).await {
			Ok(grant) => {
				{
					let mut session = self.inner.session.write().expect("session lock poisoned");
					// A completed exchange must not resurrect an ended visit.
					if session.state == VisitState::Ended {
						return;
					}
					session.visitor_code = Some(grant.visitor_code.clone());
					session.session_code = Some(grant.session_code);
					session.auth_token = Some(grant.auth_token);
					session.state = VisitState::Authorised;
				}
				self.inner.logger.record(Activity::AuthorizationSucceeded {
					visitor_code: grant.visitor_code,
				});
				self.broadcast();
				self.flush_records(false).await;
			}
			Err(err) => {
				{
					let mut session = self.inner.session.write().expect("session lock poisoned");
					if session.state == VisitState::Ended {
						return;
					}
					session.state = VisitState::AuthorizationFailed;
				}
				self.inner.logger.record(Activity::AuthorizationFailed {
					reason: err.to_string(),
				});
				self.broadcast();
			}
		}
	}

	/// Retries authorization after a failure, then drains the queue.
	///
	/// Valid only from `AuthorizationFailed`.
	pub async fn reauthorize(&self) -> Result<()> {
		let mode = {
			let mut session = self.inner.session.write().expect("session lock poisoned");
			if session.state != VisitState::AuthorizationFailed {
				return Err(VisitError::InvalidState {
					operation: "reauthorize",
					state: session.state,
				});
			}
			let Some(mode) = session.mode.clone() else {
				return Err(VisitError::Configuration(
					"no stored credentials to reauthorize with".to_string(),
				));
			};
			match &mode {
				StartMode::Exchange { .. } => session.state = VisitState::Authorizing,
				StartMode::Bypass { auth_token, .. } => {
					session.auth_token = Some(auth_token.clone());
					session.state = VisitState::Authorised;
				}
			}
			mode
		};
		self.broadcast();

		match mode {
			StartMode::Exchange { .. } => self.run_exchange().await,
			StartMode::Bypass { .. } => self.flush_records(false).await,
		}
		Ok(())
	}

	/// Sets the visitor location consumed by the next `start`.
	///
	/// Valid only before the visit starts.
	pub fn set_location(
		&self,
		longitude: impl Into<String>,
		latitude: impl Into<String>,
	) -> Result<()> {
		let mut session = self.inner.session.write().expect("session lock poisoned");
		if session.state != VisitState::Unstarted {
			return Err(VisitError::InvalidState {
				operation: "set_location",
				state: session.state,
			});
		}
		session.longitude = Some(longitude.into());
		session.latitude = Some(latitude.into());
		Ok(())
	}

	/// Ends the visit.
	///
	/// Performs a best-effort final registration attempt for queued records,
	/// notifies the backend, then moves to `Ended`. Ending an already ended
	/// visit is a no-op; ending before authorization was ever attempted is
	/// an error.
	pub async fn end(&self) -> Result<()> {
		{
			let session = self.inner.session.read().expect("session lock poisoned");
			match session.state {
				VisitState::Ended => return Ok(()),
				VisitState::Authorised | VisitState::AuthorizationFailed => {}
				state => {
					return Err(VisitError::InvalidState {
						operation: "end",
						state,
					})
				}
			}
		}

		// Best-effort final flush before the gate closes.
		self.flush_records(true).await;

		let (backend, token) = {
			let session = self.inner.session.read().expect("session lock poisoned");
			(session.backend.clone(), session.auth_token.clone())
		};
		if let (Some(backend), Some(token)) = (backend, token) {
			if let Err(err) = backend.end_visit(&token).await {
				warn!(error = %err, "Failed to notify backend of visit end");
			}
		}

		{
			let mut session = self.inner.session.write().expect("session lock poisoned");
			if session.state == VisitState::Ended {
				return Ok(());
			}
			session.state = VisitState::Ended;
		}
		self.inner.logger.record(Activity::VisitEnded);
		self.broadcast();
		Ok(())
	}

	/// Creates a hit with no screen context.
	pub async fn create_hit(&self) -> Result<HitId> {
		self.create_hit_inner(None).await
	}

	/// Creates a hit associated with a screen or controller context.
	pub async fn create_hit_for_screen(&self, screen: impl Into<String>) -> Result<HitId> {
		self.create_hit_inner(Some(screen.into())).await
	}

	async fn create_hit_inner(&self, screen: Option<String>) -> Result<HitId> {
		self.check_accepts_records("create_hit")?;
		let hit = self.inner.registry.append_hit(screen);
		debug!(hit = %hit.id, "Hit created");
		self.flush_if_authorised().await;
		Ok(hit.id)
	}

	/// Creates and submits an event with the given key/value pair, scoped to
	/// the visit (no hit association).
	///
	/// The key must be non-empty; the value may be empty.
	pub async fn trigger_event(
		&self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Result<EventId> {
		self.trigger_event_inner(key.into(), value.into(), None).await
	}

	/// Creates and submits an event scoped to a specific hit.
	pub async fn trigger_event_for_hit(
		&self,
		key: impl Into<String>,
		value: impl Into<String>,
		hit: HitId,
	) -> Result<EventId> {
		if !self.inner.registry.contains_hit(hit) {
			return Err(VisitError::InvalidArgument(format!(
				"hit {hit} does not belong to this visit"
			)));
		}
		self.trigger_event_inner(key.into(), value.into(), Some(hit)).await
	}

	async fn trigger_event_inner(
		&self,
		key: String,
		value: String,
		hit: Option<HitId>,
	) -> Result<EventId> {
		self.check_accepts_records("trigger_event")?;
		let event = Event::new(key, value, hit)
			.map_err(|_| VisitError::InvalidArgument("event key must not be empty".to_string()))?;
		let id = event.id;
		self.inner.registry.append_event(event);
		debug!(event = %id, "Event created");
		self.flush_if_authorised().await;
		Ok(id)
	}

	fn check_accepts_records(&self, operation: &'static str) -> Result<()> {
		let session = self.inner.session.read().expect("session lock poisoned");
		if !session.state.accepts_records() {
			return Err(VisitError::InvalidState {
				operation,
				state: session.state,
			});
		}
		Ok(())
	}

	/// Retries registration of all pending and failed records, in creation
	/// order. A no-op unless the visit is authorised.
	pub async fn flush_pending(&self) {
		self.flush_if_authorised().await;
	}

	async fn flush_if_authorised(&self) {
		let authorised = {
			let session = self.inner.session.read().expect("session lock poisoned");
			session.state.allows_registration()
		};
		if authorised {
			self.flush_records(false).await;
		}
	}

	/// Drains the registration queue FIFO. With `final_attempt`, also runs
	/// from `AuthorizationFailed` if a token is still held (best effort
	/// before `end`).
	async fn flush_records(&self, final_attempt: bool) {
		let _guard = self.inner.flush_lock.lock().await;
		let mut index = 0;

		loop {
			let (backend, token, tracking_code) = {
				let session = self.inner.session.read().expect("session lock poisoned");
				let eligible = session.state.allows_registration()
					|| (final_attempt && session.state == VisitState::AuthorizationFailed);
				if !eligible {
					return;
				}
				let (Some(backend), Some(token)) =
					(session.backend.clone(), session.auth_token.clone())
				else {
					return;
				};
				(backend, token, session.tracking_code.clone())
			};

			let Some((i, record)) = self.inner.registry.next_needing_registration(index) else {
				return;
			};

			let result = match &record {
				Record::Hit(hit) => {
					let payload = HitPayload {
						id: hit.id,
						screen: hit.screen.clone(),
						tracking_code,
						created_at: hit.created_at,
					};
					backend.register_hit(&token, &payload).await
				}
				Record::Event(event) => {
					let payload = EventPayload {
						id: event.id,
						key: event.key.clone(),
						value: event.value.clone(),
						hit: event.hit,
						created_at: event.created_at,
					};
					backend.register_event(&token, &payload).await
				}
			};

			match result {
				Ok(()) => {
					self.inner.registry.mark_registered(i);
					self.inner.logger.record(match &record {
						Record::Hit(hit) => Activity::HitRegistered { id: hit.id },
						Record::Event(event) => Activity::EventRegistered { id: event.id },
					});
				}
				Err(VisitError::Authorization { status, message }) => {
					// The token was rejected: demote the session and reset
					// the queue for retry after reauthorization.
					self.inner.registry.mark_failed(i);
					self.inner.registry.demote_non_registered();
					{
						let mut session =
							self.inner.session.write().expect("session lock poisoned");
						if session.state != VisitState::Ended {
							session.state = VisitState::AuthorizationFailed;
							session.auth_token = None;
						}
					}
					self.inner.logger.record(Activity::AuthorizationFailed {
						reason: format!("registration rejected ({status}): {message}"),
					});
					self.broadcast();
					return;
				}
				Err(err) => {
					self.inner.registry.mark_failed(i);
					self.inner.logger.record(match &record {
						Record::Hit(hit) => Activity::HitFailed {
							id: hit.id,
							reason: err.to_string(),
						},
						Record::Event(event) => Activity::EventFailed {
							id: event.id,
							reason: err.to_string(),
						},
					});
				}
			}
			index = i + 1;
		}
	}

	fn broadcast(&self) {
		let state = {
			let session = self.inner.session.read().expect("session lock poisoned");
			session.state
		};
		self.inner.status_tx.send_replace(AuthStatus::from_state(state));
	}

	/// Subscribes to authorization status changes.
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
		self.inner.status_tx.subscribe()
	}

	/// Resolves the first time the visit becomes authorised; errors if the
	/// visit ends first.
	pub async fn wait_authorised(&self) -> Result<()> {
		let mut rx = self.subscribe();
		loop {
			let status = *rx.borrow_and_update();
			if status.authorised {
				return Ok(());
			}
			if status.state.is_ended() {
				return Err(VisitError::VisitEnded);
			}
			rx.changed().await.map_err(|_| VisitError::VisitEnded)?;
		}
	}

	pub fn state(&self) -> VisitState {
		self.inner.session.read().expect("session lock poisoned").state
	}

	pub fn is_authorised(&self) -> bool {
		self.state() == VisitState::Authorised
	}

	pub fn visitor_code(&self) -> Option<VisitorCode> {
		self
			.inner
			.session
			.read()
			.expect("session lock poisoned")
			.visitor_code
			.clone()
	}

	pub fn session_code(&self) -> Option<SessionCode> {
		self
			.inner
			.session
			.read()
			.expect("session lock poisoned")
			.session_code
			.clone()
	}

	pub fn auth_token(&self) -> Option<AuthToken> {
		self
			.inner
			.session
			.read()
			.expect("session lock poisoned")
			.auth_token
			.clone()
	}

	/// All hits belonging to this visit, in creation order.
	pub fn hits(&self) -> Vec<Hit> {
		self.inner.registry.hits()
	}

	/// Hits that have failed to register or haven't finished yet, in
	/// creation order.
	pub fn non_registered_hits(&self) -> Vec<Hit> {
		self.inner.registry.non_registered_hits()
	}

	/// All events belonging to this visit, in creation order.
	pub fn events(&self) -> Vec<Event> {
		self.inner.registry.events()
	}

	/// Events still pending or failed, in creation order.
	pub fn non_registered_events(&self) -> Vec<Event> {
		self.inner.registry.non_registered_events()
	}

	/// Starts logging registration activity to the attached sink.
	pub fn start_logging(&self) {
		self.inner.logger.start_logging();
	}

	/// Stops logging registration activity.
	pub fn stop_logging(&self) {
		self.inner.logger.stop_logging();
	}

	pub fn is_logging(&self) -> bool {
		self.inner.logger.is_logging()
	}

	/// Captures the full visit state for persistence.
	pub fn snapshot(&self) -> VisitSnapshot {
		let session = self.inner.session.read().expect("session lock poisoned");
		VisitSnapshot {
			version: SNAPSHOT_VERSION,
			visitor_code: session.visitor_code.clone(),
			session_code: session.session_code.clone(),
			auth_token: session.auth_token.clone(),
			api_key: session.api_key.clone(),
			tracking_code: session.tracking_code.clone(),
			url_prefix: session.url_prefix.clone(),
			longitude: session.longitude.clone(),
			latitude: session.latitude.clone(),
			state: session.state,
			hits: self.inner.registry.hits(),
			events: self.inner.registry.events(),
		}
	}
}
