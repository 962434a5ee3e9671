//! Durable, JSON-document-backed store of [`FileRecord`]s for one app
//! namespace.
//!
//! Grounded on `upload_artifact_chunks::ports::ChunkedUploadSessionRepository`
//! (create/get/update/delete/list-by-scope session port), adapted from a
//! database-backed repository port to a single local JSON file — a concrete
//! on-disk document is all that's needed here, so this is a concrete struct
//! rather than a trait.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CacheError;
use crate::record::FileRecord;

/// Durable set of [`FileRecord`]s for one app namespace, backed by a JSON
/// array at `<root>/<app_name>/.cache.json`.
pub struct CacheRepository {
    app_name: String,
    root: PathBuf,
    records: Vec<FileRecord>,
}

impl CacheRepository {
    pub fn new(app_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            app_name: app_name.into(),
            root: root.into(),
            records: Vec::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn cache_file_path(&self) -> PathBuf {
        self.root.join(&self.app_name).join(".cache.json")
    }

    fn session_dir(&self, uuid: &uuid::Uuid) -> PathBuf {
        self.root
            .join(&self.app_name)
            .join("files")
            .join(uuid.to_string())
    }

    /// Loads records from disk, clearing the in-memory set first. A missing
    /// file is equivalent to an empty array. Records missing a required key
    /// or whose `filePath` no longer exists are skipped (fail-open) rather
    /// than aborting the whole load.
    pub async fn open(&mut self) -> Result<(), CacheError> {
        self.records.clear();

        let path = self.cache_file_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(CacheError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(());
        }

        let raw: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(_) => {
                warn!(path = %path.display(), "cache document is malformed JSON, treating as empty");
                return Ok(());
            }
        };

        let Some(items) = raw.as_array() else {
            warn!(path = %path.display(), "cache document is not a JSON array, treating as empty");
            return Ok(());
        };

        for item in items {
            match serde_json::from_value::<FileRecord>(item.clone()) {
                Ok(record) => {
                    if tokio::fs::try_exists(&record.file_path).await.unwrap_or(false) {
                        self.records.push(record);
                    } else {
                        debug!(file_path = %record.file_path, "skipping cache record whose source file no longer exists");
                    }
                }
                Err(_) => {
                    warn!("skipping cache record missing a required key");
                }
            }
        }

        Ok(())
    }

    /// Atomically rewrites the cache document. Never panics or propagates
    /// an error to the caller — returns `false` on I/O failure, logging at
    /// error level.
    pub async fn save(&self) -> bool {
        let path = self.cache_file_path();
        let Some(parent) = path.parent() else {
            return false;
        };
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::error!(error = %e, "failed to create cache directory");
            return false;
        }

        let body = match serde_json::to_vec_pretty(&self.records) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize cache document");
                return false;
            }
        };

        let tmp_path = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp_path, &body).await {
            tracing::error!(error = %e, "failed to write cache document");
            return false;
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            tracing::error!(error = %e, "failed to atomically rename cache document into place");
            return false;
        }
        true
    }

    pub fn add(&mut self, record: FileRecord) {
        self.records.retain(|r| r.hash != record.hash);
        self.records.push(record);
    }

    /// Removes the record with the given identification hash, if present,
    /// and deletes its staged chunk directory. Does not persist the removal
    /// to disk; call [`CacheRepository::save`] afterward.
    pub async fn remove(&mut self, hash: &str) -> Result<(), CacheError> {
        if let Some(pos) = self.records.iter().position(|r| r.hash == hash) {
            let record = self.records.remove(pos);
            let dir = self.session_dir(&record.uuid);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CacheError::Write {
                        path: dir.display().to_string(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.hash == hash)
    }

    pub fn find_all(&self) -> &[FileRecord] {
        &self.records
    }

    /// Empties the in-memory set, persists the empty document, then
    /// reloads.
    pub async fn clear_cache(&mut self) -> Result<(), CacheError> {
        self.records.clear();
        self.save().await;
        self.open().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(app: &str, path: &str) -> FileRecord {
        FileRecord::new(path, "http://h/", app)
    }

    #[tokio::test]
    async fn round_trips_through_save_and_open() {
        let root = tempfile::tempdir().unwrap();
        let source = tempfile::NamedTempFile::new().unwrap();
        let source_path = source.path().to_str().unwrap().to_string();

        let mut cache = CacheRepository::new("myapp", root.path());
        let record = record("myapp", &source_path);
        cache.add(record.clone());
        assert!(cache.save().await);

        let mut reopened = CacheRepository::new("myapp", root.path());
        reopened.open().await.unwrap();
        assert_eq!(reopened.find_by_hash(&record.hash), Some(&record));
    }

    #[tokio::test]
    async fn missing_cache_file_is_treated_as_empty() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = CacheRepository::new("myapp", root.path());
        cache.open().await.unwrap();
        assert!(cache.find_all().is_empty());
    }

    #[tokio::test]
    async fn skips_records_whose_source_file_is_gone() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = CacheRepository::new("myapp", root.path());
        cache.add(record("myapp", "/no/such/file.bin"));
        cache.save().await;

        let mut reopened = CacheRepository::new("myapp", root.path());
        reopened.open().await.unwrap();
        assert!(reopened.find_all().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_staged_chunk_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = tempfile::NamedTempFile::new().unwrap();
        let source_path = source.path().to_str().unwrap().to_string();

        let mut cache = CacheRepository::new("myapp", root.path());
        let record = record("myapp", &source_path);
        let staged_dir = root
            .path()
            .join("myapp")
            .join("files")
            .join(record.uuid.to_string());
        tokio::fs::create_dir_all(&staged_dir).await.unwrap();

        cache.add(record.clone());
        cache.remove(&record.hash).await.unwrap();

        assert!(cache.find_by_hash(&record.hash).is_none());
        assert!(!staged_dir.exists());
    }

    #[tokio::test]
    async fn clear_cache_empties_and_persists() {
        let root = tempfile::tempdir().unwrap();
        let source = tempfile::NamedTempFile::new().unwrap();
        let source_path = source.path().to_str().unwrap().to_string();

        let mut cache = CacheRepository::new("myapp", root.path());
        cache.add(record("myapp", &source_path));
        cache.save().await;

        cache.clear_cache().await.unwrap();
        assert!(cache.find_all().is_empty());

        let mut reopened = CacheRepository::new("myapp", root.path());
        reopened.open().await.unwrap();
        assert!(reopened.find_all().is_empty());
    }
}
