//! Credential storage contract and built-in store implementations.
//!
//! The pipeline reads the credential once per dispatch; the refresh flow is the only writer.
//! Reads do not coordinate with in-flight refreshes: a request that reads a stale credential
//! and fails with `401` simply re-enters the refresh coordinator.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, credential::Credential};

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the access credential.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current credential, if any.
	fn get(&self) -> StoreFuture<'_, Option<Credential>>;

	/// Persists or replaces the credential.
	fn set(&self, credential: Credential) -> StoreFuture<'_, ()>;

	/// Forgets the credential.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_can_be_serialized() {
		let payload = serde_json::to_string(&StoreError::Backend { message: "locked".into() })
			.expect("StoreError should serialize to JSON.");

		assert_eq!(payload, r#"{"Backend":{"message":"locked"}}"#);
	}

	#[tokio::test]
	async fn trait_objects_dispatch_to_memory_store() {
		let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());

		assert!(store.get().await.expect("Memory store reads are infallible.").is_none());

		store.set(Credential::new("T1")).await.expect("Memory store writes are infallible.");

		let current = store.get().await.expect("Memory store reads are infallible.");

		assert_eq!(current.as_ref().map(Credential::expose), Some("T1"));
	}
}
