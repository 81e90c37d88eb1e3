//! Classification of failed exchanges into a closed, transport-agnostic taxonomy.
//!
//! Every failure the pipeline observes funnels through this module exactly once. The
//! resulting [`NormalizedError`] drives the recovery decision: `Auth` may trigger a credential
//! refresh, `Network` and `Server` may earn one retry, and `Application` is always surfaced.

// crates.io
use http::StatusCode;
use serde_json::Value;
// self
use crate::_prelude::*;

/// Status that marks an exchange as an authentication failure.
pub const UNAUTHORIZED: u16 = 401;

/// Normalized classification of a failed exchange.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum NormalizedError {
	/// No response arrived (connection refused, DNS, reset, or timeout).
	#[error("Network error: {message}.")]
	Network {
		/// Transport-supplied description of the failure.
		message: String,
		/// Whether the transport reported a timeout.
		timeout: bool,
	},
	/// Server answered with a 5xx status.
	#[error("Server error ({status}): {message}.")]
	Server {
		/// HTTP status code (always `>= 500`).
		status: u16,
		/// Best available message extracted from the response.
		message: String,
	},
	/// Server rejected the credential.
	#[error("Authentication failed ({status}).")]
	Auth {
		/// HTTP status code (always `401`).
		status: u16,
	},
	/// Any other failure; never retried.
	#[error("{message}")]
	Application {
		/// HTTP status code, when a response was received.
		status: Option<u16>,
		/// Best available human-readable message.
		message: String,
	},
}
impl NormalizedError {
	/// Builds a [`NormalizedError::Network`] value.
	pub fn network(message: impl Into<String>, timeout: bool) -> Self {
		Self::Network { message: message.into(), timeout }
	}

	/// Builds an [`NormalizedError::Application`] value without a status.
	pub fn application(message: impl Into<String>) -> Self {
		Self::Application { status: None, message: message.into() }
	}

	/// Returns the HTTP status attached to the failure, if a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Network { .. } => None,
			Self::Server { status, .. } | Self::Auth { status } => Some(*status),
			Self::Application { status, .. } => *status,
		}
	}

	/// True for failures that may earn a single retry (`Network` or `Server`).
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Network { .. } | Self::Server { .. })
	}

	/// True when the server answered `401`.
	pub fn is_auth(&self) -> bool {
		matches!(self, Self::Auth { status: UNAUTHORIZED })
	}
}

/// Classifies a non-success response.
///
/// `401` becomes [`NormalizedError::Auth`], `>= 500` becomes [`NormalizedError::Server`], and
/// everything else becomes [`NormalizedError::Application`] carrying the most specific message
/// the body or status line offers.
pub fn normalize_response(status: u16, body: &[u8]) -> NormalizedError {
	if status == UNAUTHORIZED {
		return NormalizedError::Auth { status };
	}

	let message = response_message(status, body);

	if status >= 500 {
		NormalizedError::Server { status, message }
	} else {
		NormalizedError::Application { status: Some(status), message }
	}
}

/// Picks the best message for a failed response: structured body field, then status text,
/// then a generic `HTTP <status>` label.
pub fn response_message(status: u16, body: &[u8]) -> String {
	if let Some(message) = structured_message(body) {
		return message;
	}

	StatusCode::from_u16(status)
		.ok()
		.and_then(|code| code.canonical_reason())
		.map(str::to_owned)
		.unwrap_or_else(|| format!("HTTP {status}"))
}

fn structured_message(body: &[u8]) -> Option<String> {
	if body.is_empty() {
		return None;
	}

	let value = serde_json::from_slice::<Value>(body).ok()?;
	let candidates = [
		value.get("message"),
		value.get("error").and_then(|error| error.get("message")),
		value.get("error"),
		value.get("detail"),
	];

	candidates
		.into_iter()
		.flatten()
		.filter_map(Value::as_str)
		.map(str::trim)
		.find(|message| !message.is_empty())
		.map(str::to_owned)
}
