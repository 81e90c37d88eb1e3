//! Authenticated HTTP client core: bearer injection and single-flight credential refresh with a
//! bounded retry, all behind one `send` call.
//!
//! Callers hand a [`request::RequestDescriptor`] to [`client::Client::send`] and receive either
//! the response or a single [`error::Error`]. Credential refresh and transient-failure retries
//! happen inside the client and are never observable beyond their final outcome.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod normalize;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod retry;
pub mod store;
pub mod transport;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::ReqwestClient,
		config::{ClientConfig, CredentialMode},
		credential::Credential,
		store::{CredentialStore, MemoryStore},
		transport::{ReqwestTransport, ReqwestTransportErrorMapper},
	};

	/// Builds a configuration pointed at a mock server base URL with retries enabled and a
	/// short retry delay.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(
			Url::parse(base_url).expect("Mock server base URL should parse successfully."),
		)
		.retry(true)
		.retry_delay(Duration::from_millis(10))
		.credential_mode(CredentialMode::Bearer)
		.build()
		.expect("Test configuration should validate.")
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests, keeping a cookie jar when `config` asks for one.
	pub fn test_reqwest_transport(config: &ClientConfig) -> ReqwestTransport {
		let client = ReqwestHttp::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.cookie_store(config.with_credentials)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a reqwest-backed [`ReqwestClient`] backed by an in-memory store seeded with
	/// `token` (when provided).
	pub fn build_reqwest_test_client(
		config: ClientConfig,
		token: Option<&str>,
	) -> (ReqwestClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(match token {
			Some(value) => MemoryStore::with_credential(Credential::new(value)),
			None => MemoryStore::default(),
		});
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let transport = test_reqwest_transport(&config);
		let client =
			ReqwestClient::with_transport(config, store, transport, ReqwestTransportErrorMapper);

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestHttp, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
