//! File-based storage backend.
//!
//! Every key is stored as its own file under `storage_path`. Files carry a
//! small versioned header followed by the raw value. Writes go to a temp file
//! that is renamed into place, so readers never see a partial record.
//!
//! Mutations and scans hold an in-process mutex and an exclusive `fs2` lock
//! on `<storage_path>/.lock`, which keeps compare-and-swap atomic even when
//! several processes share one directory.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use courier_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use fs2::FileExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};

const DEFAULT_STORAGE_PATH: &str = "./data/storage";
const LOCK_FILE_NAME: &str = ".lock";
const RECORD_EXTENSION: &str = "bin";

/// Fixed-size record header.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "CRSF"
/// - [4-5]: Version (u16, little-endian)
/// - [6-15]: Reserved, zero
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"CRSF";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn current() -> Self {
		Self {
			version: Self::VERSION,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		Ok(Self { version })
	}
}

/// Splits a record file into header and value.
fn decode_record(data: &[u8]) -> Result<Vec<u8>, StorageError> {
	FileHeader::deserialize(data)?;
	Ok(data[FileHeader::SIZE..].to_vec())
}

fn encode_record(value: &[u8]) -> Vec<u8> {
	let mut data = Vec::with_capacity(FileHeader::SIZE + value.len());
	data.extend_from_slice(&FileHeader::current().serialize());
	data.extend_from_slice(value);
	data
}

/// Escapes the characters that cannot appear in a file name.
///
/// The mapping is reversible so scans can recover the original key.
fn escape_key(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	for c in key.chars() {
		match c {
			'%' => out.push_str("%25"),
			':' => out.push_str("%3A"),
			'/' => out.push_str("%2F"),
			'\\' => out.push_str("%5C"),
			'.' => out.push_str("%2E"),
			other => out.push(other),
		}
	}
	out
}

fn unescape_key(name: &str) -> Option<String> {
	let mut out = String::with_capacity(name.len());
	let mut rest = name;
	while let Some(pos) = rest.find('%') {
		out.push_str(&rest[..pos]);
		let code = rest.get(pos + 1..pos + 3)?;
		out.push(match code {
			"25" => '%',
			"3A" => ':',
			"2F" => '/',
			"5C" => '\\',
			"2E" => '.',
			_ => return None,
		});
		rest = &rest[pos + 3..];
	}
	out.push_str(rest);
	Some(out)
}

fn backend_error(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Held for the duration of a mutation or scan.
struct DirectoryLock {
	_local: OwnedMutexGuard<()>,
	file: std::fs::File,
}

impl Drop for DirectoryLock {
	fn drop(&mut self) {
		if let Err(e) = FileExt::unlock(&self.file) {
			tracing::warn!(error = %e, "Failed to release storage lock");
		}
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			write_lock: Arc::new(Mutex::new(())),
		}
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", escape_key(key), RECORD_EXTENSION))
	}

	async fn lock(&self) -> Result<DirectoryLock, StorageError> {
		let local = Arc::clone(&self.write_lock).lock_owned().await;

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(backend_error)?;

		let lock_path = self.base_path.join(LOCK_FILE_NAME);
		let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
			let file = std::fs::OpenOptions::new()
				.create(true)
				.read(true)
				.write(true)
				.truncate(false)
				.open(&lock_path)?;
			FileExt::lock_exclusive(&file)?;
			Ok(file)
		})
		.await
		.map_err(|e| StorageError::Backend(format!("Lock task failed: {}", e)))?
		.map_err(backend_error)?;

		Ok(DirectoryLock {
			_local: local,
			file,
		})
	}

	async fn read_record(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(self.get_file_path(key)).await {
			Ok(data) => decode_record(&data).map(Some),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(backend_error(e)),
		}
	}

	/// Writes a record via temp file and rename. Caller holds the lock.
	async fn write_record(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		let temp_path = path.with_extension("tmp");

		fs::write(&temp_path, encode_record(value))
			.await
			.map_err(backend_error)?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(backend_error)?;

		Ok(())
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_record(key).await?.ok_or(StorageError::NotFound)
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		let _lock = self.lock().await?;

		let current = self.read_record(key).await?;
		if current.as_deref() != expected {
			tracing::debug!(key, "Conditional write rejected, record changed");
			return Ok(false);
		}

		self.write_record(key, &value).await?;
		Ok(true)
	}

	async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let _lock = self.lock().await?;

		let mut entries = fs::read_dir(&self.base_path)
			.await
			.map_err(backend_error)?;
		let mut found = Vec::new();

		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new(RECORD_EXTENSION)) {
				continue;
			}
			let Some(key) = path
				.file_stem()
				.and_then(|stem| stem.to_str())
				.and_then(unescape_key)
			else {
				tracing::debug!("Skipping file {:?}: name is not a storage key", path);
				continue;
			};
			if !key.starts_with(prefix) {
				continue;
			}

			let data = fs::read(&path).await.map_err(backend_error)?;
			found.push((key, decode_record(&data)?));
		}

		found.sort_by(|a, b| a.0.cmp(&b.0));
		Ok(found)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path cannot be empty".to_string())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for record files (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
