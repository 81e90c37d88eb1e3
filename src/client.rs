//! The request pipeline callers talk to.
//!
//! [`Client::send`] attaches the credential and cache headers, dispatches through the
//! transport, and routes failures through normalization, then refresh coordination, then the
//! retry policy. A descriptor is resubmitted at most once, so every call settles after no more
//! than two dispatches regardless of which recovery path fired.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	normalize::{self, NormalizedError},
	obs::{ExchangeKind, Observation},
	refresh::{RefreshCoordinator, RefreshMetrics},
	request::RequestDescriptor,
	retry::RetryPolicy,
	store::CredentialStore,
	transport::{HttpRequest, HttpResponse, HttpTransport, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	transport::{ReqwestTransport, ReqwestTransportErrorMapper},
};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestClient = Client<ReqwestTransport, ReqwestTransportErrorMapper>;

/// What the pipeline does after a failed dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Recovery {
	Refresh,
	Retry(Duration),
	Surface,
}

/// Authenticated HTTP client for a single backend.
///
/// The client owns its transport, credential store, configuration, and one
/// [`RefreshCoordinator`]. Clones share all of them, so every clone participates in the same
/// single-flight refresh episode; separate `Client` values never share refresh state.
pub struct Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::Error>,
{
	/// Transport used for every outbound exchange, including refreshes.
	pub transport: Arc<C>,
	/// Mapper applied to transport-layer errors before normalization.
	pub transport_mapper: Arc<M>,
	/// Credential store read per request and written by the refresh flow.
	pub store: Arc<dyn CredentialStore>,
	config: Arc<ClientConfig>,
	retry_policy: RetryPolicy,
	coordinator: Arc<RefreshCoordinator>,
}
impl<C, M> Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::Error>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			transport: transport.into(),
			transport_mapper: mapper.into(),
			store,
			retry_policy: RetryPolicy::from_config(&config),
			config: Arc::new(config),
			coordinator: Default::default(),
		}
	}

	/// Configuration the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential store shared with the refresh flow.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Retry gate derived from the configuration.
	pub fn retry_policy(&self) -> RetryPolicy {
		self.retry_policy
	}

	/// Counters describing refresh coordination.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}

	/// Whether a credential refresh is currently in flight.
	pub fn is_refreshing(&self) -> bool {
		self.coordinator.is_refreshing()
	}

	/// Number of requests currently waiting on the in-flight refresh.
	pub fn pending_refresh_waiters(&self) -> usize {
		self.coordinator.pending_waiters()
	}

	/// Sends `descriptor` and returns the successful response or the final normalized failure.
	///
	/// A `401` on a request sent with a credential triggers (or joins) a single-flight refresh
	/// and one resubmission. A `Network` or `Server` failure earns one delayed resubmission
	/// when retries are enabled. Every other failure, and any failure of a resubmission, is
	/// returned as-is.
	pub async fn send(&self, descriptor: RequestDescriptor) -> Result<HttpResponse> {
		Observation::begin(ExchangeKind::Request, "send").observe(self.run_pipeline(descriptor)).await
	}

	/// Sends `descriptor` and decodes the JSON response body into `T`.
	pub async fn send_json<T>(&self, descriptor: RequestDescriptor) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.send(descriptor).await?;
		let de = &mut serde_json::Deserializer::from_slice(response.body());

		serde_path_to_error::deserialize(de).map_err(|e| {
			NormalizedError::Application {
				status: Some(response.status().as_u16()),
				message: format!("Response body is malformed at `{}`: {}", e.path(), e.inner()),
			}
			.into()
		})
	}

	async fn run_pipeline(&self, mut descriptor: RequestDescriptor) -> Result<HttpResponse> {
		let mut resubmission = None::<Observation>;

		loop {
			let generation = self.coordinator.generation();
			let credential = self.store.get().await?;

			descriptor.apply_credential(credential.as_ref())?;

			let request = descriptor.to_http(&self.config)?;
			let outcome = match resubmission.take() {
				Some(retry) => retry.observe(self.exchange(request)).await,
				None => self.exchange(request).await,
			};
			let error = match outcome {
				Ok(response) => return Ok(response),
				Err(error) => error,
			};

			match self.recovery_for(&error, &descriptor).await? {
				Recovery::Refresh => {
					descriptor.mark_retried();
					self.coordinator.recover(generation, || self.refresh_credential()).await?;
				},
				Recovery::Retry(delay) => {
					descriptor.mark_retried();
					resubmission = Some(Observation::begin(ExchangeKind::Retry, "resubmit"));
					tokio::time::sleep(delay).await;
				},
				Recovery::Surface => return Err(error.into()),
			}
		}
	}

	async fn recovery_for(
		&self,
		error: &NormalizedError,
		descriptor: &RequestDescriptor,
	) -> Result<Recovery> {
		if error.is_auth() && !descriptor.retried() && self.config.auto_refresh_token {
			// Only callers that still hold a credential were authenticated; anyone else is
			// surfaced without a refresh.
			if self.store.get().await?.is_some() {
				return Ok(Recovery::Refresh);
			}
		}

		Ok(match self.retry_policy.should_retry(error, descriptor) {
			Some(delay) => Recovery::Retry(delay),
			None => Recovery::Surface,
		})
	}

	/// Executes one wire exchange and normalizes any failure.
	pub(crate) async fn exchange(
		&self,
		request: HttpRequest,
	) -> Result<HttpResponse, NormalizedError> {
		match self.transport.execute(request, self.config.timeout()).await {
			Ok(response) if response.status().is_success() => Ok(response),
			Ok(response) =>
				Err(normalize::normalize_response(response.status().as_u16(), response.body())),
			Err(e) => Err(self.transport_mapper.map_transport_error(&e)),
		}
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport, ReqwestTransportErrorMapper> {
	/// Creates a new client for the provided configuration and credential store.
	///
	/// The client provisions its own reqwest-backed transport (with a cookie jar when
	/// `with_credentials` is set) so callers do not need to pass HTTP handles explicitly.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
		let transport = ReqwestTransport::from_config(&config)?;

		Ok(Self::with_transport(config, store, transport, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::Error>,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			retry_policy: self.retry_policy,
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<C, M> Debug for Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::Error>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("base_url", &self.config.base_url.as_str())
			.field("credential_mode", &self.config.credential_mode)
			.field("retry_policy", &self.retry_policy)
			.field("refreshing", &self.coordinator.is_refreshing())
			.finish()
	}
}
