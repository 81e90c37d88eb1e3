//! Client configuration built once at construction and passed to every component.
//!
//! The wire shape mirrors the recognized option names (`baseURL`, `timeout`, `withCredentials`,
//! `autoRefreshToken`, `retry`, `retryDelay`, `maxRetries`) with millisecond integers, so
//! deployments can keep their existing JSON documents.

// self
use crate::{_prelude::*, error::ConfigError};

/// Default per-request transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default delay before the single retry of a transient failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);
/// Default value of the accepted-but-unenforced `maxRetries` option.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default refresh endpoint path, resolved against the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// How the refresh exchange proves the caller's session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
	/// Sends `Authorization: Bearer <current>` and expects `{ "token": ... }` back.
	#[default]
	Bearer,
	/// Relies on the transport's cookie jar; the response token is optional.
	Cookie,
}
impl CredentialMode {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialMode::Bearer => "bearer",
			CredentialMode::Cookie => "cookie",
		}
	}
}
impl Display for CredentialMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	/// Base URL every request path and the refresh path are resolved against.
	#[serde(rename = "baseURL")]
	pub base_url: Url,
	/// Per-request transport timeout in milliseconds.
	#[serde(default = "default_timeout_ms")]
	pub timeout: u64,
	/// Whether the transport keeps a cookie jar and sends cookies.
	#[serde(default)]
	pub with_credentials: bool,
	/// Whether a `401` on an authenticated request triggers a credential refresh.
	#[serde(default = "default_true")]
	pub auto_refresh_token: bool,
	/// Whether transient failures earn a single retry.
	#[serde(default)]
	pub retry: bool,
	/// Delay before the single retry, in milliseconds.
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay: u64,
	/// Accepted for compatibility; at most one retry is ever performed.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// Refresh endpoint path.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Refresh strategy selected for this deployment.
	#[serde(default)]
	pub credential_mode: CredentialMode,
}
impl ClientConfig {
	/// Creates a builder seeded with defaults for `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Decodes and validates a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(de).map_err(|e| {
			ConfigError::Malformed { path: e.path().to_string(), message: e.inner().to_string() }
		})?;

		config.validate()?;

		Ok(config)
	}

	/// Per-request transport timeout.
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout)
	}

	/// Delay before the single retry.
	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay)
	}

	/// Resolves a request path (or absolute URL) against the base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidRequestPath { path: path.to_owned(), source })
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}

	/// Validates invariants for the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match self.base_url.scheme() {
			"http" | "https" => (),
			_ => return Err(ConfigError::UnsupportedScheme { url: self.base_url.to_string() }),
		}

		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { url: self.base_url.to_string() });
		}
		if self.timeout == 0 {
			return Err(ConfigError::ZeroTimeout);
		}
		if self.refresh_path.trim().is_empty() {
			return Err(ConfigError::EmptyRefreshPath);
		}
		if self.credential_mode == CredentialMode::Cookie && !self.with_credentials {
			return Err(ConfigError::CookieModeWithoutCredentials);
		}

		self.refresh_url()?;

		Ok(())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with defaults for `base_url`.
	pub fn new(base_url: Url) -> Self {
		Self {
			config: ClientConfig {
				base_url,
				timeout: default_timeout_ms(),
				with_credentials: false,
				auto_refresh_token: true,
				retry: false,
				retry_delay: default_retry_delay_ms(),
				max_retries: DEFAULT_MAX_RETRIES,
				refresh_path: DEFAULT_REFRESH_PATH.into(),
				credential_mode: CredentialMode::default(),
			},
		}
	}

	/// Parses `base_url` and seeds a builder with it.
	pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(Self::new(url))
	}

	/// Overrides the per-request timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.config.timeout = duration_to_ms(timeout);

		self
	}

	/// Enables or disables the transport cookie jar.
	pub fn with_credentials(mut self, enabled: bool) -> Self {
		self.config.with_credentials = enabled;

		self
	}

	/// Enables or disables automatic credential refresh on `401`.
	pub fn auto_refresh_token(mut self, enabled: bool) -> Self {
		self.config.auto_refresh_token = enabled;

		self
	}

	/// Enables or disables the single retry for transient failures.
	pub fn retry(mut self, enabled: bool) -> Self {
		self.config.retry = enabled;

		self
	}

	/// Overrides the delay before the single retry.
	pub fn retry_delay(mut self, delay: Duration) -> Self {
		self.config.retry_delay = duration_to_ms(delay);

		self
	}

	/// Records the `maxRetries` option; it does not raise the retry bound above one.
	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.config.max_retries = max_retries;

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.config.refresh_path = path.into();

		self
	}

	/// Selects the refresh strategy.
	pub fn credential_mode(mut self, mode: CredentialMode) -> Self {
		self.config.credential_mode = mode;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn duration_to_ms(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_timeout_ms() -> u64 {
	duration_to_ms(DEFAULT_TIMEOUT)
}

fn default_retry_delay_ms() -> u64 {
	duration_to_ms(DEFAULT_RETRY_DELAY)
}

fn default_max_retries() -> u32 {
	DEFAULT_MAX_RETRIES
}

fn default_refresh_path() -> String {
	DEFAULT_REFRESH_PATH.into()
}

fn default_true() -> bool {
	true
}
