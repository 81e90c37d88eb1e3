//! Transport primitives the pipeline dispatches through.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack and
//! [`TransportErrorMapper`] is the only place transport-specific failures are interpreted. A
//! transport reports non-2xx statuses as ordinary responses; its error type is reserved for
//! exchanges that produced no response at all.

// self
use crate::{_prelude::*, normalize::NormalizedError};
#[cfg(feature = "reqwest")]
use crate::{config::ClientConfig, error::ConfigError};

/// Wire request handed to a transport.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Wire response returned by a transport.
pub type HttpResponse = http::Response<Vec<u8>>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one exchange.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back many concurrent
/// requests, and must enforce `timeout` for the whole exchange.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type Error: 'static + Send + Sync + StdError;

	/// Executes `request`, resolving to the response (any status) or a transport failure.
	fn execute(&self, request: HttpRequest, timeout: Duration) -> TransportFuture<'_, Self::Error>;
}

/// Maps transport failures into [`NormalizedError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Classifies a failure that produced no response.
	fn map_transport_error(&self, error: &E) -> NormalizedError;
}

/// Thin wrapper around [`ReqwestHttp`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestHttp);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestHttp) -> Self {
		Self(client)
	}

	/// Builds a reqwest client honoring the configuration's cookie and timeout settings.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestHttp::builder()
			.cookie_store(config.with_credentials)
			.timeout(config.timeout())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestHttp> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestHttp {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	type Error = ReqwestError;

	fn execute(&self, request: HttpRequest, timeout: Duration) -> TransportFuture<'_, Self::Error> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut request = reqwest::Request::try_from(request)?;

			*request.timeout_mut() = Some(timeout);

			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, error: &ReqwestError) -> NormalizedError {
		if error.is_timeout() {
			NormalizedError::network(error.to_string(), true)
		} else if error.is_connect() || error.is_request() || error.is_body() {
			NormalizedError::network(error.to_string(), false)
		} else {
			NormalizedError::application(error.to_string())
		}
	}
}
