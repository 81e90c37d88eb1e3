//! Per-call request descriptors and the header rules applied on every dispatch.

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method,
	header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
};
// self
use crate::{
	_prelude::*, config::ClientConfig, credential::Credential, error::ConfigError,
	transport::HttpRequest,
};

/// Method, target, headers, and body for one logical call.
///
/// The descriptor lives for a single exchange. The pipeline only mutates it to refresh headers
/// and to set the `retried` flag, which flips at most once.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL, or an absolute URL.
	pub path: String,
	/// Caller-supplied headers; credential and cache headers are applied on dispatch.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	retried: bool,
}
impl RequestDescriptor {
	/// Creates a descriptor for `method` + `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` descriptor.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` descriptor.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` descriptor.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` descriptor.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` descriptor.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
		let invalid = || ConfigError::InvalidHeader { name: name.to_owned() };
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		self.headers.insert(header_name, header_value);

		Ok(self)
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as JSON and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload)
			.map_err(|e| ConfigError::BodySerialization { message: e.to_string() })?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(body);

		Ok(self)
	}

	/// Whether this descriptor has already been resubmitted once.
	pub fn retried(&self) -> bool {
		self.retried
	}

	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}

	/// Applies the fixed cache headers and the credential (if any).
	///
	/// A stale `Authorization` header from an earlier attempt is dropped when no credential is
	/// present so the resubmission never carries a token the store no longer trusts.
	pub(crate) fn apply_credential(&mut self, credential: Option<&Credential>) -> Result<()> {
		apply_fixed_headers(&mut self.headers);

		match credential {
			Some(credential) => {
				self.headers.insert(AUTHORIZATION, bearer_header(credential)?);
			},
			None => {
				self.headers.remove(AUTHORIZATION);
			},
		}

		Ok(())
	}

	/// Builds the wire request for this descriptor.
	pub(crate) fn to_http(&self, config: &ClientConfig) -> Result<HttpRequest> {
		let url = config.resolve(&self.path)?;
		let mut request = http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.body(self.body.clone().unwrap_or_default())
			.map_err(ConfigError::from)?;

		*request.headers_mut() = self.headers.clone();

		Ok(request)
	}
}

/// Inserts `Cache-Control: no-cache` and `Pragma: no-cache`.
pub(crate) fn apply_fixed_headers(headers: &mut HeaderMap) {
	headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
}

/// Renders a credential as a sensitive `Authorization` header value.
pub(crate) fn bearer_header(credential: &Credential) -> Result<HeaderValue> {
	let mut value = HeaderValue::from_str(&credential.bearer_value())
		.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.as_str().to_owned() })?;

	value.set_sensitive(true);

	Ok(value)
}
