//! File-backed [`CredentialStore`] for CLIs and long-lived desktop sessions.
//!
//! The credential lives in memory and is mirrored to a small JSON document on every write. Writes
//! go through a sibling `.tmp` file and a rename so a crash never leaves a half-written token.

// std
use std::{
	fs::{self, File},
	io::{self, ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	credential::Credential,
	store::{CredentialStore, StoreError, StoreFuture},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Document {
	token: Credential,
	#[serde(with = "time::serde::rfc3339")]
	stored_at: OffsetDateTime,
}

/// Keeps the credential in memory and mirrors it to a JSON file.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Option<Document>>>,
}
impl FileStore {
	/// Opens the store at `path`, loading a previously persisted credential when present.
	///
	/// A missing or empty file yields an empty store; missing parent directories are created.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		create_parent(&path)?;

		let document = read_document(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(document)) })
	}

	/// Returns the file path backing this store.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns when the current credential was written, if one is stored.
	pub fn stored_at(&self) -> Option<OffsetDateTime> {
		self.inner.read().as_ref().map(|document| document.stored_at)
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async move { Ok(self.inner.read().as_ref().map(|document| document.token.clone())) })
	}

	fn set(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let document = Document { token: credential, stored_at: OffsetDateTime::now_utc() };
			let bytes = serde_json::to_vec_pretty(&document).map_err(|e| {
				StoreError::Serialization { message: format!("Credential cannot be encoded: {e}") }
			})?;
			let mut slot = self.inner.write();

			write_atomically(&self.path, &bytes)?;
			*slot = Some(document);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut slot = self.inner.write();

			match fs::remove_file(&self.path) {
				Err(e) if e.kind() != ErrorKind::NotFound =>
					return Err(backend("remove", &self.path)(e)),
				_ => (),
			}

			*slot = None;

			Ok(())
		})
	}
}

fn backend<'a>(
	action: &'static str,
	path: &'a Path,
) -> impl FnOnce(io::Error) -> StoreError + 'a {
	move |e| StoreError::Backend { message: format!("Cannot {action} {}: {e}", path.display()) }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
	match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() =>
			fs::create_dir_all(parent).map_err(backend("create directory", parent)),
		_ => Ok(()),
	}
}

fn read_document(path: &Path) -> Result<Option<Document>, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(backend("read", path)(e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(None);
	}

	serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
		message: format!("Credential file {} is corrupted: {e}", path.display()),
	})
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	let staging = path.with_extension("tmp");
	let mut file = File::create(&staging).map_err(backend("create", &staging))?;

	file.write_all(bytes).map_err(backend("write", &staging))?;
	file.sync_all().map_err(backend("sync", &staging))?;
	drop(file);

	fs::rename(&staging, path).map_err(backend("replace", path))
}
