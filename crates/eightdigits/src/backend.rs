// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend transport for the 8digits HTTP API.
//!
//! The [`Backend`] trait is the seam between the visit state machine and the
//! network; tests substitute it with in-memory fakes, production uses
//! [`HttpBackend`]. All requests go through the shared retry policy, so a
//! single call here already covers transient transport failures.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eightdigits_core::{AuthToken, EventId, HitId, SessionCode, VisitorCode};
use eightdigits_http::{retry, RetryConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VisitError};

/// Credential exchange request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
	pub api_key: String,
	pub tracking_code: String,
	pub longitude: Option<String>,
	pub latitude: Option<String>,
}

/// Successful credential exchange result.
#[derive(Debug, Clone)]
pub struct AuthGrant {
	pub visitor_code: VisitorCode,
	pub session_code: SessionCode,
	pub auth_token: AuthToken,
}

/// Hit submission payload.
#[derive(Debug, Clone)]
pub struct HitPayload {
	pub id: HitId,
	pub screen: Option<String>,
	pub tracking_code: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Event submission payload.
#[derive(Debug, Clone)]
pub struct EventPayload {
	pub id: EventId,
	pub key: String,
	pub value: String,
	pub hit: Option<HitId>,
	pub created_at: DateTime<Utc>,
}

/// Transport between a visit and the 8digits service.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
	/// Exchanges credentials for visitor/session codes and an auth token.
	async fn authorize(&self, request: &AuthRequest) -> Result<AuthGrant>;

	/// Registers a hit under an authorised session.
	async fn register_hit(&self, token: &AuthToken, hit: &HitPayload) -> Result<()>;

	/// Registers an event under an authorised session.
	async fn register_event(&self, token: &AuthToken, event: &EventPayload) -> Result<()>;

	/// Tells the backend the visit has ended. Best effort.
	async fn end_visit(&self, token: &AuthToken) -> Result<()>;
}

/// HTTP implementation of [`Backend`] against the 8digits API.
pub struct HttpBackend {
	base_url: String,
	http_client: Client,
	retry_config: RetryConfig,
}

impl HttpBackend {
	/// Creates a backend for the given URL prefix.
	pub fn new(
		base_url: impl Into<String>,
		request_timeout: Duration,
		retry_config: RetryConfig,
	) -> Result<Self> {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		let http_client = eightdigits_http::builder()
			.timeout(request_timeout)
			.build()
			.map_err(VisitError::RequestFailed)?;
		Ok(Self {
			base_url,
			http_client,
			retry_config,
		})
	}

	async fn post_json<B: Serialize>(
		&self,
		path: &str,
		token: Option<&AuthToken>,
		body: &B,
		auth_endpoint: bool,
	) -> Result<reqwest::Response> {
		let url = format!("{}{}", self.base_url, path);
		debug!(url = %url, "Sending 8digits request");

		let response = retry(&self.retry_config, || async {
			let mut request = self.http_client.post(&url).json(body);
			if let Some(token) = token {
				request = request.header("Authorization", format!("Bearer {}", token.expose()));
			}
			match request.send().await {
				Ok(response) => Self::check_status(response, auth_endpoint).await,
				Err(e) => Err(VisitError::RequestFailed(e)),
			}
		})
		.await?;

		Ok(response)
	}

	/// Maps non-success statuses onto the SDK error taxonomy.
	async fn check_status(
		response: reqwest::Response,
		auth_endpoint: bool,
	) -> Result<reqwest::Response> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get("Retry-After")
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(VisitError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		let status = status.as_u16();
		let message = response.text().await.unwrap_or_default();
		if auth_endpoint || matches!(status, 401 | 403) {
			Err(VisitError::Authorization { status, message })
		} else {
			Err(VisitError::Registration { status, message })
		}
	}
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
	async fn authorize(&self, request: &AuthRequest) -> Result<AuthGrant> {
		let body = AuthorizeRequest {
			api_key: &request.api_key,
			tracking_code: &request.tracking_code,
			longitude: request.longitude.as_deref(),
			latitude: request.latitude.as_deref(),
		};
		let response = self.post_json("/visit/start", None, &body, true).await?;
		let granted: AuthorizeResponse = response.json().await?;
		Ok(AuthGrant {
			visitor_code: granted.visitor_code.into(),
			session_code: granted.session_code.into(),
			auth_token: AuthToken::new(granted.auth_token),
		})
	}

	async fn register_hit(&self, token: &AuthToken, hit: &HitPayload) -> Result<()> {
		let body = HitRequest {
			hit_code: hit.id.to_string(),
			screen: hit.screen.as_deref(),
			tracking_code: hit.tracking_code.as_deref(),
			created_at: hit.created_at.to_rfc3339(),
		};
		self.post_json("/hit", Some(token), &body, false).await?;
		Ok(())
	}

	async fn register_event(&self, token: &AuthToken, event: &EventPayload) -> Result<()> {
		let body = EventRequest {
			event_code: event.id.to_string(),
			key: &event.key,
			value: &event.value,
			hit_code: event.hit.map(|id| id.to_string()),
			created_at: event.created_at.to_rfc3339(),
		};
		self.post_json("/event", Some(token), &body, false).await?;
		Ok(())
	}

	async fn end_visit(&self, token: &AuthToken) -> Result<()> {
		self
			.post_json("/visit/end", Some(token), &serde_json::json!({}), false)
			.await?;
		Ok(())
	}
}

/// Wire format for the credential exchange.
#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
	api_key: &'a str,
	tracking_code: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	longitude: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	latitude: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
	visitor_code: String,
	session_code: String,
	auth_token: String,
}

#[derive(Debug, Serialize)]
struct HitRequest<'a> {
	hit_code: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	screen: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	tracking_code: Option<&'a str>,
	created_at: String,
}

#[derive(Debug, Serialize)]
struct EventRequest<'a> {
	event_code: String,
	key: &'a str,
	value: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	hit_code: Option<String>,
	created_at: String,
}
