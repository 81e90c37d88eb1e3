//! The refresh exchange itself: one unauthenticated-by-body `POST` to the refresh endpoint.
//!
//! The coordinator guarantees this runs once per refreshing episode. Success writes the new
//! credential (cookie sessions may omit it); failure clears the store, because the credential
//! that produced the `401` can no longer be trusted.

// crates.io
use http::{HeaderMap, Method, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	client::Client,
	config::CredentialMode,
	credential::Credential,
	error::ConfigError,
	normalize::NormalizedError,
	obs::{self, ExchangeKind, Observation},
	request,
	transport::{HttpTransport, TransportErrorMapper},
};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
	#[serde(default)]
	token: Option<String>,
}

impl<C, M> Client<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::Error>,
{
	/// Performs the refresh exchange and applies its outcome to the credential store.
	pub(crate) async fn refresh_credential(&self) -> Result<()> {
		Observation::begin(ExchangeKind::Refresh, "refresh_credential")
			.observe(async move {
				match self.request_new_credential().await {
					Ok(Some(credential)) => {
						self.store.set(credential).await?;

						Ok(())
					},
					Ok(None) => Ok(()),
					Err(err) => {
						obs::warn("refresh_credential", &err);

						if let Err(clear_err) = self.store.clear().await {
							obs::warn("clear_credential", &clear_err);
						}

						Err(err)
					},
				}
			})
			.await
	}

	async fn request_new_credential(&self) -> Result<Option<Credential>> {
		let mode = self.config().credential_mode;
		let url = self.config().refresh_url()?;
		let mut headers = HeaderMap::new();

		request::apply_fixed_headers(&mut headers);

		if mode == CredentialMode::Bearer
			&& let Some(current) = self.store.get().await?
		{
			headers.insert(AUTHORIZATION, request::bearer_header(&current)?);
		}

		let mut refresh = http::Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.body(Vec::new())
			.map_err(ConfigError::from)?;

		*refresh.headers_mut() = headers;

		let response = self.exchange(refresh).await?;

		decode_refresh_response(mode, response.body())
	}
}

/// Extracts the new credential from a successful refresh response body.
///
/// Bearer sessions require a non-blank `token`; anything else fails the refresh. Cookie sessions
/// treat the token as optional and tolerate bodies that are not JSON at all.
fn decode_refresh_response(mode: CredentialMode, body: &[u8]) -> Result<Option<Credential>> {
	let token = if body.iter().all(u8::is_ascii_whitespace) {
		None
	} else {
		let de = &mut serde_json::Deserializer::from_slice(body);

		match serde_path_to_error::deserialize::<_, RefreshResponse>(de) {
			Ok(parsed) => parsed.token.and_then(Credential::parse),
			Err(_) if mode == CredentialMode::Cookie => None,
			Err(e) =>
				return Err(NormalizedError::application(format!(
					"Refresh response is malformed at `{}`: {}",
					e.path(),
					e.inner()
				))
				.into()),
		}
	};

	match (mode, token) {
		(CredentialMode::Bearer, None) =>
			Err(NormalizedError::application("Refresh response carried no token.").into()),
		(_, token) => Ok(token),
	}
}
