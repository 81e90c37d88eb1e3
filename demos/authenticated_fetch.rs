//! Demonstrates the default reqwest-backed client recovering from an expired bearer token.
//!
//! The mock backend rejects the stale token, the client refreshes it once against
//! `/auth/refresh`, and the original request is replayed with the new credential.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use bearer_client::{
	client::ReqwestClient,
	config::ClientConfig,
	credential::Credential,
	request::RequestDescriptor,
	reqwest::Client,
	store::{CredentialStore, MemoryStore},
	transport::{ReqwestTransport, ReqwestTransportErrorMapper},
};

#[derive(Debug, Deserialize)]
struct Profile {
	id: u64,
	name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer expired-token");
			then.status(401).body("{\"message\":\"token expired\"}");
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer renewed-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":42,\"name\":\"ferris\"}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"renewed-token\"}");
		})
		.await;
	let memory = Arc::new(MemoryStore::with_credential(Credential::new("expired-token")));
	let store: Arc<dyn CredentialStore> = memory.clone();
	let config = ClientConfig::builder(server.base_url().parse()?).retry(true).build()?;
	// httpmock serves a self-signed certificate.
	let transport = ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let client =
		ReqwestClient::with_transport(config, store, transport, ReqwestTransportErrorMapper);
	let profile: Profile = client.send_json(RequestDescriptor::get("/me")).await?;

	println!("Fetched profile {} ({}).", profile.id, profile.name);
	println!(
		"Stored credential after refresh: {}.",
		memory.snapshot().map(|credential| credential.expose().to_owned()).unwrap_or_default()
	);

	stale.assert_async().await;
	fresh.assert_async().await;
	refresh.assert_async().await;

	Ok(())
}
