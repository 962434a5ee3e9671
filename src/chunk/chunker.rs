use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::ChunkError;
use crate::verify::FileVerifier;

use super::utility::{chunk_count, default_chunk_size};

/// A single byte range of the source file, identified by its 0-based index
/// within the chunker's ordered sequence.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: u32,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Owns the chunk sequence for one upload session: computes the chunk size,
/// stages chunks to local storage, and loads them back into memory on
/// demand.
pub struct Chunker {
    app_name: String,
    session_id: Uuid,
    source_path: PathBuf,
    staging_root: PathBuf,
    chunk_size: u64,
    chunk_count: u32,
    loaded: Vec<Chunk>,
    verifier: Arc<dyn FileVerifier>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("app_name", &self.app_name)
            .field("session_id", &self.session_id)
            .field("source_path", &self.source_path)
            .field("staging_root", &self.staging_root)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_count", &self.chunk_count)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl Chunker {
    /// Builds a chunker for `source_path`, computing the chunk size per the
    /// policy below unless `chunk_size_override` is given. Does not
    /// touch the filesystem beyond reading the source file's metadata.
    pub async fn new(
        app_name: impl Into<String>,
        session_id: Uuid,
        source_path: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
        chunk_size_override: Option<u64>,
        verifier: Arc<dyn FileVerifier>,
    ) -> Result<Self, ChunkError> {
        let source_path = source_path.into();
        let metadata = tokio::fs::metadata(&source_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ChunkError::SourceNotFound(source_path.display().to_string())
            } else {
                ChunkError::Read(e)
            }
        })?;
        let file_size = metadata.len();

        let chunk_size = match chunk_size_override {
            Some(size) => size,
            None => default_chunk_size(file_size),
        };
        if chunk_size == 0 || (file_size > 0 && chunk_size > file_size) {
            return Err(ChunkError::InvalidChunkSize {
                chunk_size,
                file_size,
            });
        }

        Ok(Self {
            app_name: app_name.into(),
            session_id,
            source_path,
            staging_root: staging_root.into(),
            chunk_size,
            chunk_count: chunk_count(file_size, chunk_size),
            loaded: Vec::new(),
            verifier,
        })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Per-session staging directory: `<staging_root>/<app>/files/<uuid>/`.
    pub fn session_dir(&self) -> PathBuf {
        self.staging_root
            .join(&self.app_name)
            .join("files")
            .join(self.session_id.to_string())
    }

    fn staged_path(&self, index: u32) -> PathBuf {
        self.session_dir()
            .join(format!("{}_chunk_{}.bin", self.session_id, index))
    }

    /// Partitions the source file into `chunk_count()` staged files under
    /// [`Chunker::session_dir`]. Returns the chunk count on success.
    pub async fn partition(&mut self) -> Result<u32, ChunkError> {
        let dir = self.session_dir();
        tokio::fs::create_dir_all(&dir).await.map_err(ChunkError::Read)?;

        let mut source = tokio::fs::File::open(&self.source_path)
            .await
            .map_err(ChunkError::Read)?;

        let mut buf = vec![0u8; self.chunk_size as usize];
        for index in 0..self.chunk_count {
            let mut written = 0usize;
            while written < buf.len() {
                let n = source
                    .read(&mut buf[written..])
                    .await
                    .map_err(ChunkError::Read)?;
                if n == 0 {
                    break;
                }
                written += n;
            }
            if written == 0 {
                if index == 0 {
                    // A zero-byte source still has one (empty) chunk per
                    // `chunk_count`; stage it so `load_all` finds a file for
                    // every index it expects.
                    tokio::fs::File::create(self.staged_path(index))
                        .await
                        .map_err(ChunkError::Read)?;
                }
                break;
            }

            let mut staged = tokio::fs::File::create(self.staged_path(index))
                .await
                .map_err(ChunkError::Read)?;
            staged
                .write_all(&buf[..written])
                .await
                .map_err(ChunkError::Read)?;
            staged.flush().await.map_err(ChunkError::Read)?;
        }

        Ok(self.chunk_count)
    }

    /// Reads every staged file into memory as an ordered [`Chunk`] list.
    /// Idempotent: re-running replaces the in-memory set.
    pub async fn load_all(&mut self) -> Result<(), ChunkError> {
        let mut loaded = Vec::with_capacity(self.chunk_count as usize);
        for index in 0..self.chunk_count {
            let data = tokio::fs::read(self.staged_path(index))
                .await
                .map_err(ChunkError::Read)?;
            loaded.push(Chunk {
                index,
                data: Bytes::from(data),
            });
        }
        self.loaded = loaded;
        Ok(())
    }

    /// Returns the chunk at `index` if it has been loaded via
    /// [`Chunker::load_all`].
    pub fn chunk(&self, index: u32) -> Option<&Chunk> {
        self.loaded.get(index as usize)
    }

    /// Deletes every staged file within [`Chunker::session_dir`].
    pub async fn remove(&self) -> Result<(), ChunkError> {
        match tokio::fs::remove_dir_all(self.session_dir()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChunkError::Read(e)),
        }
    }

    pub fn hash(&self, bytes: &[u8]) -> String {
        self.verifier.hash(bytes)
    }

    pub fn verify(&self, bytes: &[u8], expected: &str) -> Result<(), crate::error::VerifyError> {
        self.verifier.verify(bytes, expected)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::Md5Verifier;
    use std::io::Write;

    async fn write_temp_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[tokio::test]
    async fn partitions_small_file_into_one_chunk() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let path = write_temp_file(&source_dir, "hello.txt", b"Hello World").await;

        let mut chunker = Chunker::new(
            "testapp",
            Uuid::new_v4(),
            path,
            staging_dir.path(),
            None,
            Arc::new(Md5Verifier),
        )
        .await
        .unwrap();

        assert_eq!(chunker.chunk_count(), 1);
        let count = chunker.partition().await.unwrap();
        assert_eq!(count, 1);

        chunker.load_all().await.unwrap();
        let chunk = chunker.chunk(0).unwrap();
        assert_eq!(chunk.data.as_ref(), b"Hello World");

        chunker.remove().await.unwrap();
        assert!(!chunker.session_dir().exists());
    }

    #[tokio::test]
    async fn partitions_into_several_chunks_covering_whole_file() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let content = vec![7u8; 25];
        let path = write_temp_file(&source_dir, "blob.bin", &content).await;

        let mut chunker = Chunker::new(
            "testapp",
            Uuid::new_v4(),
            path,
            staging_dir.path(),
            Some(10),
            Arc::new(Md5Verifier),
        )
        .await
        .unwrap();

        assert_eq!(chunker.chunk_count(), 3);
        chunker.partition().await.unwrap();
        chunker.load_all().await.unwrap();

        let total: usize = (0..3).map(|i| chunker.chunk(i).unwrap().len()).sum();
        assert_eq!(total, 25);
        assert_eq!(chunker.chunk(2).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn partitions_empty_file_into_one_empty_chunk() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let path = write_temp_file(&source_dir, "empty.bin", b"").await;

        let mut chunker = Chunker::new(
            "testapp",
            Uuid::new_v4(),
            path,
            staging_dir.path(),
            None,
            Arc::new(Md5Verifier),
        )
        .await
        .unwrap();

        assert_eq!(chunker.chunk_count(), 1);
        chunker.partition().await.unwrap();
        chunker.load_all().await.unwrap();

        let chunk = chunker.chunk(0).unwrap();
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn rejects_missing_source() {
        let staging_dir = tempfile::tempdir().unwrap();
        let err = Chunker::new(
            "testapp",
            Uuid::new_v4(),
            "/no/such/file/at/all.bin",
            staging_dir.path(),
            None,
            Arc::new(Md5Verifier),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChunkError::SourceNotFound(_)));
    }
}
