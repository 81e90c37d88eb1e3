#![cfg(feature = "reqwest")]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use http::header::AUTHORIZATION;
use tokio::sync::Notify;
// self
use bearer_client::{
	_preludet::*,
	client::Client,
	config::ClientConfig,
	credential::Credential,
	normalize::NormalizedError,
	request::RequestDescriptor,
	store::{CredentialStore, MemoryStore},
	transport::{HttpRequest, HttpResponse, HttpTransport, TransportErrorMapper, TransportFuture},
};

#[derive(Debug, ThisError)]
enum FakeTransportError {
	#[error("Connection reset by peer.")]
	Reset,
	#[error("Exchange timed out.")]
	TimedOut,
}

struct FakeMapper;
impl TransportErrorMapper<FakeTransportError> for FakeMapper {
	fn map_transport_error(&self, error: &FakeTransportError) -> NormalizedError {
		NormalizedError::network(error.to_string(), matches!(error, FakeTransportError::TimedOut))
	}
}

/// Accepts only `Bearer T2`; the refresh endpoint blocks until the gate is opened.
#[derive(Default)]
struct GatedBackend {
	gate: Notify,
	refresh_calls: AtomicUsize,
	api_calls: AtomicUsize,
}
impl HttpTransport for GatedBackend {
	type Error = FakeTransportError;

	fn execute(&self, request: HttpRequest, _: Duration) -> TransportFuture<'_, Self::Error> {
		Box::pin(async move {
			if request.uri().path() == "/auth/refresh" {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.gate.notified().await;

				return Ok(respond(200, "{\"token\":\"T2\"}"));
			}

			self.api_calls.fetch_add(1, Ordering::SeqCst);

			match request.headers().get(AUTHORIZATION).map(|value| value.as_bytes()) {
				Some(b"Bearer T2") => Ok(respond(200, "{}")),
				_ => Ok(respond(401, "")),
			}
		})
	}
}

/// Fails every exchange at the transport layer.
struct FlakyBackend {
	error: fn() -> FakeTransportError,
	calls: AtomicUsize,
}
impl HttpTransport for FlakyBackend {
	type Error = FakeTransportError;

	fn execute(&self, _: HttpRequest, _: Duration) -> TransportFuture<'_, Self::Error> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Err((self.error)())
		})
	}
}

/// Serves API statuses from a script; the refresh endpoint fails at the transport layer once the
/// gate opens.
#[derive(Default)]
struct ScriptedBackend {
	statuses: Mutex<VecDeque<u16>>,
	gate: Notify,
	refresh_calls: AtomicUsize,
	api_calls: AtomicUsize,
}
impl ScriptedBackend {
	fn with_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
		Self { statuses: Mutex::new(statuses.into_iter().collect()), ..Default::default() }
	}
}
impl HttpTransport for ScriptedBackend {
	type Error = FakeTransportError;

	fn execute(&self, request: HttpRequest, _: Duration) -> TransportFuture<'_, Self::Error> {
		Box::pin(async move {
			if request.uri().path() == "/auth/refresh" {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.gate.notified().await;

				return Err(FakeTransportError::Reset);
			}

			self.api_calls.fetch_add(1, Ordering::SeqCst);

			let status = self.statuses.lock().pop_front().unwrap_or(401);

			Ok(respond(status, ""))
		})
	}
}

fn respond(status: u16, body: &str) -> HttpResponse {
	let mut response = HttpResponse::new(body.as_bytes().to_vec());

	*response.status_mut() =
		http::StatusCode::from_u16(status).expect("Fixture status codes should be valid.");

	response
}

fn seeded_store(token: &str) -> Arc<MemoryStore> {
	Arc::new(MemoryStore::with_credential(Credential::new(token)))
}

fn fake_config(configure: impl FnOnce(&mut ClientConfig)) -> ClientConfig {
	let mut config = test_config("https://api.example.com");

	configure(&mut config);

	config
}

#[tokio::test]
async fn queued_waiters_resume_after_a_single_refresh() {
	let backend = Arc::new(GatedBackend::default());
	let store = seeded_store("T1");
	let client: Client<GatedBackend, FakeMapper> = Client::with_transport(
		fake_config(|_| {}),
		store.clone() as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let release = async {
		while client.pending_refresh_waiters() < 3 {
			tokio::task::yield_now().await;
		}

		assert!(client.is_refreshing());

		backend.gate.notify_one();
	};
	let (a, b, c, d, ()) = tokio::join!(
		client.send(RequestDescriptor::get("/a")),
		client.send(RequestDescriptor::get("/b")),
		client.send(RequestDescriptor::get("/c")),
		client.send(RequestDescriptor::get("/d")),
		release,
	);

	for response in [a, b, c, d] {
		assert_eq!(response.expect("Every waiter should succeed after refresh.").status(), 200);
	}

	assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
	assert_eq!(backend.api_calls.load(Ordering::SeqCst), 8);
	assert_eq!(store.snapshot().map(|c| c.expose().to_owned()).as_deref(), Some("T2"));
	assert_eq!(client.refresh_metrics().queued(), 3);
	assert_eq!(client.pending_refresh_waiters(), 0);
}

#[tokio::test]
async fn clients_never_share_refresh_state() {
	let backend = Arc::new(GatedBackend::default());
	let first: Client<GatedBackend, FakeMapper> = Client::with_transport(
		fake_config(|_| {}),
		seeded_store("T1") as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let second: Client<GatedBackend, FakeMapper> = Client::with_transport(
		fake_config(|_| {}),
		seeded_store("T1") as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let release = async {
		while backend.refresh_calls.load(Ordering::SeqCst) < 2 {
			tokio::task::yield_now().await;
		}

		assert!(first.is_refreshing() && second.is_refreshing());

		backend.gate.notify_waiters();
	};
	let (a, b, ()) = tokio::join!(
		first.send(RequestDescriptor::get("/a")),
		second.send(RequestDescriptor::get("/b")),
		release,
	);

	assert!(a.is_ok() && b.is_ok());
	assert_eq!(first.refresh_metrics().attempts(), 1);
	assert_eq!(second.refresh_metrics().attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn network_failures_retry_once_after_the_configured_delay() {
	let backend =
		Arc::new(FlakyBackend { error: || FakeTransportError::TimedOut, calls: AtomicUsize::new(0) });
	let client: Client<FlakyBackend, FakeMapper> = Client::with_transport(
		fake_config(|config| {
			config.retry_delay = 1_000;
			config.max_retries = 5;
		}),
		seeded_store("T1") as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let started = tokio::time::Instant::now();
	let err = client
		.send(RequestDescriptor::get("/feed"))
		.await
		.expect_err("A persistent network failure should be surfaced.");

	assert_eq!(
		err.normalized(),
		Some(&NormalizedError::Network { message: "Exchange timed out.".into(), timeout: true })
	);
	assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
	assert!(started.elapsed() >= Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn network_failures_surface_immediately_without_retry() {
	let backend =
		Arc::new(FlakyBackend { error: || FakeTransportError::Reset, calls: AtomicUsize::new(0) });
	let client: Client<FlakyBackend, FakeMapper> = Client::with_transport(
		fake_config(|config| config.retry = false),
		seeded_store("T1") as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let started = tokio::time::Instant::now();
	let err = client
		.send(RequestDescriptor::get("/feed"))
		.await
		.expect_err("Network failures should be surfaced when retries are off.");

	assert!(matches!(err.normalized(), Some(NormalizedError::Network { timeout: false, .. })));
	assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
	assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_after_a_retry_is_surfaced_without_refresh() {
	let backend = Arc::new(ScriptedBackend::with_statuses([503, 401]));
	let store = seeded_store("T1");
	let client: Client<ScriptedBackend, FakeMapper> = Client::with_transport(
		fake_config(|_| {}),
		store.clone() as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let err = client
		.send(RequestDescriptor::get("/feed"))
		.await
		.expect_err("A 401 on the retried request should be surfaced.");

	assert_eq!(err.normalized(), Some(&NormalizedError::Auth { status: 401 }));
	assert_eq!(backend.api_calls.load(Ordering::SeqCst), 2);
	assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
	assert_eq!(client.refresh_metrics().attempts(), 0);
	assert!(store.snapshot().is_some());
}

#[tokio::test]
async fn refresh_transport_failures_reach_every_waiter() {
	let backend = Arc::new(ScriptedBackend::default());
	let store = seeded_store("T1");
	let client: Client<ScriptedBackend, FakeMapper> = Client::with_transport(
		fake_config(|_| {}),
		store.clone() as Arc<dyn CredentialStore>,
		backend.clone(),
		FakeMapper,
	);
	let release = async {
		while client.pending_refresh_waiters() < 2 {
			tokio::task::yield_now().await;
		}

		backend.gate.notify_one();
	};
	let (a, b, c, ()) = tokio::join!(
		client.send(RequestDescriptor::get("/a")),
		client.send(RequestDescriptor::get("/b")),
		client.send(RequestDescriptor::get("/c")),
		release,
	);
	let expected = NormalizedError::network("Connection reset by peer.", false);

	for outcome in [a, b, c] {
		let err = outcome.expect_err("A failed refresh should reject every caller.");

		assert_eq!(err.normalized(), Some(&expected));
	}

	assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
	assert_eq!(backend.api_calls.load(Ordering::SeqCst), 3);
	assert!(store.snapshot().is_none());
	assert_eq!(client.refresh_metrics().failures(), 1);
}

#[cfg(feature = "metrics")]
mod exchange_counters {
	// crates.io
	use metrics::{
		Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
	};
	// self
	use super::*;

	type Counts = Arc<Mutex<HashMap<String, u64>>>;

	/// Records `bearer_client_exchange_total` increments keyed by `kind/outcome`.
	#[derive(Default)]
	struct Tally(Counts);
	impl Tally {
		fn get(&self, label: &str) -> u64 {
			self.0.lock().get(label).copied().unwrap_or_default()
		}
	}
	impl Recorder for Tally {
		fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

		fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

		fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

		fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
			let label = key.labels().map(|label| label.value()).collect::<Vec<_>>().join("/");

			Counter::from_arc(Arc::new(Slot { label, counts: self.0.clone() }))
		}

		fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
			Gauge::noop()
		}

		fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
			Histogram::noop()
		}
	}

	struct Slot {
		label: String,
		counts: Counts,
	}
	impl CounterFn for Slot {
		fn increment(&self, value: u64) {
			*self.counts.lock().entry(self.label.clone()).or_default() += value;
		}

		fn absolute(&self, value: u64) {
			self.counts.lock().insert(self.label.clone(), value);
		}
	}

	async fn send_with_tally(statuses: [u16; 2]) -> (Tally, Result<HttpResponse>) {
		let tally = Tally::default();
		let guard = metrics::set_default_local_recorder(&tally);
		let client: Client<ScriptedBackend, FakeMapper> = Client::with_transport(
			fake_config(|_| {}),
			seeded_store("T1") as Arc<dyn CredentialStore>,
			Arc::new(ScriptedBackend::with_statuses(statuses)),
			FakeMapper,
		);
		let outcome = client.send(RequestDescriptor::get("/feed")).await;

		drop(guard);

		(tally, outcome)
	}

	#[tokio::test(start_paused = true)]
	async fn successful_resubmissions_count_as_retry_successes() {
		let (tally, outcome) = send_with_tally([503, 200]).await;

		outcome.expect("The resubmitted request should succeed.");

		assert_eq!(tally.get("retry/attempt"), 1);
		assert_eq!(tally.get("retry/success"), 1);
		assert_eq!(tally.get("retry/failure"), 0);
		assert_eq!(tally.get("request/success"), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_resubmissions_count_as_retry_failures() {
		let (tally, outcome) = send_with_tally([503, 502]).await;

		outcome.expect_err("A second server failure should be surfaced.");

		assert_eq!(tally.get("retry/attempt"), 1);
		assert_eq!(tally.get("retry/success"), 0);
		assert_eq!(tally.get("retry/failure"), 1);
		assert_eq!(tally.get("request/failure"), 1);
	}
}
