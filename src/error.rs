//! Client-level error types shared across the pipeline, refresh coordinator, and stores.

// self
use crate::{_prelude::*, normalize::NormalizedError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// The type is `Clone` so a single refresh outcome can be handed to every queued waiter.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Final outcome of a failed exchange after all internal recovery.
	#[error(transparent)]
	Exchange(#[from] NormalizedError),
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The task driving a credential refresh was dropped before the refresh settled.
	#[error("Credential refresh was abandoned before it completed.")]
	RefreshAbandoned,
}
impl Error {
	/// Returns the normalized exchange failure, if this error carries one.
	pub fn normalized(&self) -> Option<&NormalizedError> {
		match self {
			Self::Exchange(inner) => Some(inner),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// Configuration document could not be decoded.
	#[error("Configuration is malformed at `{path}`: {message}.")]
	Malformed {
		/// Path of the offending field.
		path: String,
		/// Decoder message.
		message: String,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than HTTP(S).
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry relative paths (e.g. `mailto:`).
	#[error("Base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Base URL that failed validation.
		url: String,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Refresh endpoint path is empty.
	#[error("Refresh path must not be empty.")]
	EmptyRefreshPath,
	/// Cookie sessions need the client's cookie jar.
	#[error("Cookie credential mode requires `withCredentials` to be enabled.")]
	CookieModeWithoutCredentials,

	/// Request path could not be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidRequestPath {
		/// Offending request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header name or value is invalid.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Header name as supplied by the caller.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized: {message}.")]
	BodySerialization {
		/// Serializer message.
		message: String,
	},
	/// HTTP request assembly failed.
	#[error("HTTP request could not be assembled.")]
	HttpRequest {
		/// Underlying `http` crate failure.
		#[source]
		source: SharedError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<http::Error> for ConfigError {
	fn from(e: http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
