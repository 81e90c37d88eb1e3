//! Single-flight credential refresh coordination.
//!
//! Each [`Client`](crate::client::Client) owns one [`RefreshCoordinator`]. The first `401` seen
//! while the coordinator is idle makes its request the leader: it flips the state to
//! refreshing and runs the refresh exchange. Every later `401` arriving during that episode
//! queues a waiter instead of starting another exchange. When the leader settles, the state
//! returns to idle and the queue is drained in FIFO order, handing every waiter a clone of the
//! same outcome.
//!
//! The idle/refreshing check-and-set happens under a synchronous lock that is never held across
//! an `.await`, so two requests can never both observe idle and both start a refresh.

mod exchange;
mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::_prelude::*;

type Waiter = oneshot::Sender<Result<()>>;

/// Coordinator state; the waiter queue only exists while a refresh is in flight.
#[derive(Debug, Default)]
enum RefreshState {
	#[default]
	Idle,
	Refreshing {
		waiters: VecDeque<Waiter>,
	},
}

#[derive(Debug, Default)]
struct Inner {
	state: RefreshState,
	// Bumped on every successful refresh.
	generation: u64,
}

enum Role {
	Leader,
	Waiter(oneshot::Receiver<Result<()>>),
	Stale,
}

/// Guarantees at most one in-flight refresh and a uniform outcome for everyone who waited on it.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	inner: Mutex<Inner>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the current credential generation.
	///
	/// Requests capture this before reading the credential so a later `401` can tell whether a
	/// refresh has completed since they were dispatched.
	pub fn generation(&self) -> u64 {
		self.inner.lock().generation
	}

	/// Whether a refresh exchange is currently in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(self.inner.lock().state, RefreshState::Refreshing { .. })
	}

	/// Number of requests currently waiting on the in-flight refresh.
	pub fn pending_waiters(&self) -> usize {
		match &self.inner.lock().state {
			RefreshState::Idle => 0,
			RefreshState::Refreshing { waiters } => waiters.len(),
		}
	}

	/// Counters describing coordinator activity.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Resolves once the credential observed at `observed_generation` has been replaced.
	///
	/// - Idle and no refresh since `observed_generation`: becomes the leader and runs `exchange`.
	/// - Idle but a refresh completed since then: returns `Ok(())` without refreshing.
	/// - Refreshing: waits for the in-flight exchange and returns its outcome.
	///
	/// If the leader is dropped before `exchange` settles, every waiter receives
	/// [`Error::RefreshAbandoned`] and the coordinator returns to idle.
	pub async fn recover<F, Fut>(&self, observed_generation: u64, exchange: F) -> Result<()>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<()>>,
	{
		match self.enter(observed_generation) {
			Role::Stale => Ok(()),
			Role::Waiter(receiver) => receiver.await.unwrap_or(Err(Error::RefreshAbandoned)),
			Role::Leader => {
				let mut flight = Flight { coordinator: self, settled: false };
				let outcome = exchange().await;

				flight.settle(&outcome);

				outcome
			},
		}
	}

	fn enter(&self, observed_generation: u64) -> Role {
		let mut guard = self.inner.lock();
		let inner = &mut *guard;

		if let RefreshState::Refreshing { waiters } = &mut inner.state {
			let (sender, receiver) = oneshot::channel();

			waiters.push_back(sender);
			self.metrics.record_queued();

			return Role::Waiter(receiver);
		}
		if inner.generation != observed_generation {
			self.metrics.record_short_circuit();

			return Role::Stale;
		}

		inner.state = RefreshState::Refreshing { waiters: VecDeque::new() };
		self.metrics.record_attempt();

		Role::Leader
	}

	fn settle(&self, outcome: &Result<()>) {
		let mut inner = self.inner.lock();

		if outcome.is_ok() {
			inner.generation = inner.generation.wrapping_add(1);
			self.metrics.record_success();
		} else {
			self.metrics.record_failure();
		}

		if let RefreshState::Refreshing { waiters } =
			mem::replace(&mut inner.state, RefreshState::Idle)
		{
			for waiter in waiters {
				// A waiter whose caller went away has nothing left to resume.
				let _ = waiter.send(outcome.clone());
			}
		}
	}
}

/// Settles the episode exactly once, even when the leader future is dropped mid-exchange.
struct Flight<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl Flight<'_> {
	fn settle(&mut self, outcome: &Result<()>) {
		self.settled = true;
		self.coordinator.settle(outcome);
	}
}
impl Drop for Flight<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.settle(&Err(Error::RefreshAbandoned));
		}
	}
}
