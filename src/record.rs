//! [`FileRecord`]: the persistent description of one upload session that
//! must survive a process restart.
//!
//! Grounded on `upload_artifact_chunks::dto::UploadSession` (session id,
//! sizes, counts, status, timestamps as a plain serializable struct) —
//! reshaped here to the client-side fields this engine needs and the exact
//! on-disk JSON key names the cache document uses.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Deterministic identification hash of `(source_path, destination_url,
/// app_name)`. Two records collide iff the triple matches.
pub fn identification_hash(source_path: &str, destination_url: &str, app_name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(source_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(destination_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(app_name.as_bytes());
    hex::encode(hasher.finalize())
}

/// One upload session's persisted state. The on-disk field names (`camelCase`)
/// match the on-disk cache document exactly so it round-trips faithfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub uuid: Uuid,

    #[serde(rename = "lastEdit")]
    pub last_edit_ms: i64,

    pub hash: String,

    #[serde(rename = "filePath")]
    pub file_path: String,

    #[serde(rename = "appName")]
    pub app_name: String,

    #[serde(rename = "uploadUrl")]
    pub upload_url: String,

    #[serde(rename = "uploadOffset")]
    pub upload_offset: u64,

    #[serde(rename = "resumeFrom")]
    pub resume_from: u64,

    #[serde(rename = "tusId")]
    pub tus_id: String,

    #[serde(rename = "chunkNumber")]
    pub chunk_number: u32,

    /// Total file size in bytes. An extra field beyond the original record
    /// layout, needed to compute progress after a resume; kept optional so
    /// old documents without it still deserialize.
    #[serde(rename = "totalSize", default)]
    pub total_size: u64,
}

impl FileRecord {
    pub fn new(source_path: impl Into<String>, upload_url: impl Into<String>, app_name: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let upload_url = upload_url.into();
        let app_name = app_name.into();
        let hash = identification_hash(&source_path, &upload_url, &app_name);
        Self {
            uuid: Uuid::new_v4(),
            last_edit_ms: now_ms(),
            hash,
            file_path: source_path,
            app_name,
            upload_url,
            upload_offset: 0,
            resume_from: 0,
            tus_id: String::new(),
            chunk_number: 0,
            total_size: 0,
        }
    }

    /// Copies resumable state from a previously persisted record into this
    /// one — the sole resume path across process restarts.
    pub fn adopt_persisted(&mut self, persisted: &FileRecord) {
        self.upload_offset = persisted.upload_offset;
        self.last_edit_ms = persisted.last_edit_ms;
        self.tus_id = persisted.tus_id.clone();
        self.resume_from = persisted.resume_from;
        self.chunk_number = persisted.chunk_number;
        self.total_size = persisted.total_size;
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.upload_offset = offset;
        self.touch();
    }

    pub fn set_tus_id(&mut self, tus_id: impl Into<String>) {
        self.tus_id = tus_id.into();
        self.touch();
    }

    pub fn set_total_size(&mut self, total_size: u64) {
        self.total_size = total_size;
        self.touch();
    }

    pub fn set_chunk_number(&mut self, chunk_number: u32) {
        self.chunk_number = chunk_number;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_edit_ms = now_ms();
    }
}

fn now_ms() -> i64 {
    let now = OffsetDateTime::now_utc();
    now.unix_timestamp() * 1000 + i64::from(now.millisecond())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_triples_produce_identical_hashes() {
        let a = identification_hash("/tmp/a.bin", "http://h/", "app");
        let b = identification_hash("/tmp/a.bin", "http://h/", "app");
        assert_eq!(a, b);
    }

    #[test]
    fn different_triples_produce_different_hashes() {
        let a = identification_hash("/tmp/a.bin", "http://h/", "app");
        let b = identification_hash("/tmp/b.bin", "http://h/", "app");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_json_with_the_documented_key_names() {
        let record = FileRecord::new("/tmp/a.bin", "http://h/", "app");
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "uuid",
            "lastEdit",
            "hash",
            "filePath",
            "appName",
            "uploadUrl",
            "uploadOffset",
            "resumeFrom",
            "tusId",
            "chunkNumber",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        let back: FileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
