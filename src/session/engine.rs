use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument, info, warn};

use crate::cache::CacheRepository;
use crate::chunk::Chunker;
use crate::config::AppConfig;
use crate::error::{ChunkError, TransportError, TusError, TusResult};
use crate::http::{HttpClient, Method, Request, Transport};
use crate::record::FileRecord;
use crate::verify::{FileVerifier, Md5Verifier};

use super::server_info::ServerInformation;
use super::status::{AtomicStatus, Status};

/// The maximum number of consecutive `409 Conflict` responses tolerated for
/// a single chunk before the session gives up.
const CONFLICT_RETRY_CAP: u32 = 3;

fn normalize_base_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn progress_pct(offset: u64, total: u64) -> u32 {
    if total == 0 {
        0
    } else {
        ((offset as f64 / total as f64) * 100.0).min(100.0) as u32
    }
}

/// Builds an [`UploadSession`].
///
/// Construction is async: it stats the source file, opens the cache
/// document for the app namespace, and adopts any persisted record that
/// matches this `(source_path, destination_url, app_name)` triple, which is
/// the sole resume path across process restarts.
pub struct UploadSessionBuilder {
    app_name: String,
    destination_url: String,
    source_path: PathBuf,
    chunk_size: Option<u64>,
    config: Option<AppConfig>,
    verifier: Option<Arc<dyn FileVerifier>>,
    transport: Option<Arc<dyn Transport>>,
}

impl UploadSessionBuilder {
    pub fn new(
        app_name: impl Into<String>,
        destination_url: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            destination_url: destination_url.into(),
            source_path: source_path.into(),
            chunk_size: None,
            config: None,
            verifier: None,
            transport: None,
        }
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn FileVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Overrides the HTTP transport, bypassing real sockets. Primarily for
    /// tests; see [`crate::http::Transport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn build(self) -> TusResult<Arc<UploadSession>> {
        let config = self.config.unwrap_or_else(AppConfig::from_env);
        let verifier: Arc<dyn FileVerifier> = self.verifier.unwrap_or_else(|| Arc::new(Md5Verifier));
        let staging_root = config.resolved_cache_root();
        url::Url::parse(&self.destination_url)
            .map_err(|_| TransportError::InvalidUrl(self.destination_url.clone()))?;
        let base_url = normalize_base_url(&self.destination_url);

        let metadata = tokio::fs::metadata(&self.source_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ChunkError::SourceNotFound(self.source_path.display().to_string())
            } else {
                ChunkError::Read(e)
            }
        })?;
        let file_size = metadata.len();

        let source_path_str = self.source_path.to_string_lossy().into_owned();
        let mut record = FileRecord::new(&source_path_str, &base_url, &self.app_name);
        record.set_total_size(file_size);

        let mut cache = CacheRepository::new(&self.app_name, &staging_root);
        cache.open().await?;
        if let Some(persisted) = cache.find_by_hash(&record.hash).cloned() {
            record.adopt_persisted(&persisted);
        }

        let chunker = Chunker::new(
            &self.app_name,
            record.uuid,
            &self.source_path,
            &staging_root,
            self.chunk_size,
            verifier,
        )
        .await?;

        let mut http_builder = HttpClient::builder().connect_timeout(config.connect_timeout);
        if let Some(transport) = self.transport {
            http_builder = http_builder.transport(transport);
        }
        let http = Arc::new(http_builder.build()?);

        let span = tracing::info_span!(
            "upload_session",
            session_uuid = %record.uuid,
            app_name = %self.app_name,
        );

        let initial_offset = record.upload_offset;
        let initial_tus_id = record.tus_id.clone();

        // `upload()` always POSTs a fresh resource and reconciles `offset`
        // against it (0 for a brand-new location), so the next-chunk-index
        // must start at 0 alongside it regardless of what a previous
        // process had persisted — seeding it from `record.chunk_number`
        // would send chunk N labeled `Upload-Offset: 0` and skip 0..N.
        let session = UploadSession {
            app_name: self.app_name,
            base_url,
            source_path: self.source_path,
            status: AtomicStatus::new(Status::Ready),
            offset: AtomicU64::new(initial_offset),
            total_length: AtomicU64::new(file_size),
            source_size: AtomicU64::new(file_size),
            chunk_number: AtomicU32::new(0),
            progress: AtomicU32::new(progress_pct(initial_offset, file_size)),
            conflict_count: AtomicU32::new(0),
            chunks_loaded: AtomicBool::new(false),
            bearer_set: AtomicBool::new(false),
            request_timeout_ms: AtomicU64::new(config.request_timeout.as_millis() as u64),
            tus_id: RwLock::new(initial_tus_id),
            record: Mutex::new(record),
            chunker: Mutex::new(chunker),
            cache: Mutex::new(cache),
            http,
            span,
        };

        Ok(Arc::new(session))
    }
}

/// In-memory aggregate driving one file's tus upload lifecycle. Constructed
/// behind an `Arc` so a handle can be cloned across
/// tasks: one task runs `upload()`/`resume()` while others poll `status()`/
/// `progress()` or call `pause()`/`cancel()`.
pub struct UploadSession {
    app_name: String,
    base_url: String,
    source_path: PathBuf,

    status: AtomicStatus,
    offset: AtomicU64,
    total_length: AtomicU64,
    source_size: AtomicU64,
    chunk_number: AtomicU32,
    progress: AtomicU32,
    conflict_count: AtomicU32,
    chunks_loaded: AtomicBool,
    bearer_set: AtomicBool,
    request_timeout_ms: AtomicU64,

    tus_id: RwLock<String>,
    record: Mutex<FileRecord>,
    chunker: Mutex<Chunker>,
    cache: Mutex<CacheRepository>,
    http: Arc<HttpClient>,
    span: tracing::Span,
}

impl UploadSession {
    pub fn builder(
        app_name: impl Into<String>,
        destination_url: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> UploadSessionBuilder {
        UploadSessionBuilder::new(app_name, destination_url, source_path)
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst) as u8
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn set_request_timeout(&self, timeout: Duration) {
        self.request_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.load(Ordering::SeqCst))
    }

    pub async fn set_bearer_token(&self, token: impl Into<String>) {
        self.http.set_authorization(token).await;
        self.bearer_set.store(true, Ordering::SeqCst);
    }

    pub fn is_token_set(&self) -> bool {
        self.bearer_set.load(Ordering::SeqCst)
    }

    /// OPTIONS-based capability discovery. Read-only; does not touch session
    /// state.
    pub async fn get_tus_server_information(&self) -> TusResult<ServerInformation> {
        let request = Request::new(Method::Options, self.base_url.clone())
            .with_header("accept", "*/*");
        let response = self.http.send(request).await?;
        Ok(ServerInformation::from_response(&response))
    }

    /// Runs the full creation-to-chunk-loop flow. Only effective from
    /// `Status::Ready`; otherwise a no-op returning `false`.
    pub async fn upload(&self) -> bool {
        if !self.status.is(Status::Ready) {
            return false;
        }
        async {
            match self.do_upload().await {
                Ok(finished) => finished,
                Err(e) => {
                    tracing::error!(error = %e, "upload failed");
                    self.status.set(Status::Failed);
                    false
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Continues an upload from `Status::Paused`, re-querying the server
    /// offset before resuming the chunk loop. A no-op returning `false`
    /// from any other status.
    pub async fn resume(&self) -> bool {
        if !self.status.is(Status::Paused) {
            return false;
        }
        async {
            match self.do_resume().await {
                Ok(finished) => finished,
                Err(e) => {
                    tracing::error!(error = %e, "resume failed");
                    self.status.set(Status::Failed);
                    false
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Transitions `Uploading` to `Paused` and aborts in-flight requests.
    /// Re-entrant: a no-op from any other status.
    pub async fn pause(&self) -> bool {
        if !self.status.is(Status::Uploading) {
            return false;
        }
        self.status.set(Status::Paused);
        self.http.abort_all().await;
        info!(parent: &self.span, "upload paused");
        true
    }

    /// Aborts in-flight requests and, if a server location has been
    /// assigned, issues a DELETE and evicts the cache record. A no-op
    /// (`Ok(false)`) if no location is known yet.
    pub async fn cancel(&self) -> TusResult<bool> {
        self.do_cancel().instrument(self.span.clone()).await
    }

    async fn do_cancel(&self) -> TusResult<bool> {
        let token = self.tus_id().await;
        if token.is_empty() {
            return Ok(false);
        }

        self.status.set(Status::Canceled);
        self.http.abort_all().await;

        let url = format!("{}{}", self.base_url, token);
        let request = Request::new(Method::Delete, url)
            .with_header("Tus-Resumable", "1.0.0")
            .with_header("accept", "*/*");
        let response = self.http.send(request).await?;
        if response.is_success() {
            self.evict().await?;
            info!(parent: &self.span, "upload canceled");
        } else {
            warn!(parent: &self.span, status = response.status, "cancel delete rejected by server");
        }
        Ok(response.is_success())
    }

    /// Resets all progress and re-enters `upload()` from `Status::Failed`
    /// or `Status::Canceled`. A no-op from any other status.
    pub async fn retry(&self) -> bool {
        if !matches!(self.status.get(), Status::Failed | Status::Canceled) {
            return false;
        }

        self.conflict_count.store(0, Ordering::SeqCst);
        self.chunk_number.store(0, Ordering::SeqCst);
        self.offset.store(0, Ordering::SeqCst);
        self.progress.store(0, Ordering::SeqCst);
        self.chunks_loaded.store(false, Ordering::SeqCst);
        *self.tus_id.write().await = String::new();

        {
            let chunker = self.chunker.lock().await;
            let _ = chunker.remove().await;
        }
        {
            let mut record = self.record.lock().await;
            record.set_offset(0);
            record.set_chunk_number(0);
            record.set_tus_id(String::new());
        }

        self.status.set(Status::Ready);
        self.upload().await
    }

    async fn do_upload(&self) -> TusResult<bool> {
        {
            let mut chunker = self.chunker.lock().await;
            chunker.partition().await?;
        }

        let file_size = self.source_size.load(Ordering::SeqCst);
        let basename = self
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let request = Request::new(Method::Post, self.base_url.clone())
            .with_header("Tus-Resumable", "1.0.0")
            .with_header("Content-Type", "application/octet-stream")
            .with_header(
                "Content-Disposition",
                format!("attachment; filename=\"{basename}\""),
            )
            .with_header("Content-Length", "0")
            .with_header("Upload-Length", file_size.to_string())
            .with_header("Upload-Metadata", format!("filename {basename}"));

        let response = self.http.send(request).await?;
        if !response.is_success() {
            self.status.set(Status::Failed);
            return Err(TusError::ProtocolError {
                status: response.status,
                body: response.body_as_string(),
            });
        }

        let location = response.header("Location");
        if location.is_empty() {
            self.status.set(Status::Failed);
            return Err(TransportError::MissingLocation.into());
        }
        let token = location.rsplit('/').next().unwrap_or(&location).to_string();
        self.set_tus_id(token).await;
        self.total_length.store(file_size, Ordering::SeqCst);

        self.reconcile_offset().await?;
        self.persist_snapshot().await;

        self.status.set(Status::Uploading);
        info!(parent: &self.span, file_size, "upload created, entering chunk loop");
        self.run_chunk_loop().await
    }

    async fn do_resume(&self) -> TusResult<bool> {
        self.reconcile_offset().await?;
        self.status.set(Status::Uploading);
        info!(parent: &self.span, "upload resumed");
        self.run_chunk_loop().await
    }

    async fn run_chunk_loop(&self) -> TusResult<bool> {
        if !self.chunks_loaded.swap(true, Ordering::SeqCst) {
            let mut chunker = self.chunker.lock().await;
            chunker.load_all().await?;
        }

        loop {
            if !self.status.is(Status::Uploading) {
                break;
            }
            let offset = self.offset.load(Ordering::SeqCst);
            let total = self.total_length.load(Ordering::SeqCst);
            if offset >= total {
                break;
            }

            let index = self.chunk_number.load(Ordering::SeqCst);
            let chunk = {
                let chunker = self.chunker.lock().await;
                chunker.chunk(index).cloned()
            };
            let Some(chunk) = chunk else { break };
            let chunk_len = chunk.len() as u64;

            let token = self.tus_id().await;
            let url = format!("{}{}", self.base_url, token);
            let request = Request::new(Method::Patch, url)
                .with_header("Tus-Resumable", "1.0.0")
                .with_header("Content-Type", "application/offset+octet-stream")
                .with_header("Content-Length", chunk_len.to_string())
                .with_header("Upload-Offset", offset.to_string())
                .with_body(chunk.data);

            match self.http.send(request).await {
                Ok(response) if response.is_no_content() => {
                    let new_offset = response
                        .header("Upload-Offset")
                        .parse::<u64>()
                        .unwrap_or(offset + chunk_len);
                    self.offset.store(new_offset, Ordering::SeqCst);
                    self.chunk_number.fetch_add(1, Ordering::SeqCst);
                    self.progress
                        .store(progress_pct(new_offset, total), Ordering::SeqCst);
                    self.persist_snapshot().await;
                    info!(parent: &self.span, chunk = index, offset = new_offset, "chunk acknowledged");
                }
                Ok(response) if response.is_conflict() => {
                    let attempts = self.conflict_count.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempts > CONFLICT_RETRY_CAP {
                        self.status.set(Status::Failed);
                        return Err(TusError::ConflictRetriesExhausted { attempts });
                    }
                    warn!(
                        parent: &self.span,
                        chunk = index,
                        attempts,
                        "chunk conflicted with server state, reconciling and retrying"
                    );
                    self.reconcile_offset().await?;
                    tokio::time::sleep(self.get_request_timeout()).await;
                }
                Ok(response) => {
                    self.status.set(Status::Failed);
                    return Err(TusError::ProtocolError {
                        status: response.status,
                        body: response.body_as_string(),
                    });
                }
                Err(e) => {
                    if matches!(self.status.get(), Status::Canceled | Status::Paused) {
                        break;
                    }
                    self.status.set(Status::Failed);
                    return Err(e.into());
                }
            }
        }

        self.finalize().await
    }

    async fn finalize(&self) -> TusResult<bool> {
        let offset = self.offset.load(Ordering::SeqCst);
        let total = self.total_length.load(Ordering::SeqCst);
        if self.status.is(Status::Uploading) && offset >= total {
            self.progress.store(100, Ordering::SeqCst);
            self.status.set(Status::Finished);
            self.evict().await?;
            info!(parent: &self.span, "upload finished");
            return Ok(true);
        }
        Ok(false)
    }

    async fn reconcile_offset(&self) -> TusResult<()> {
        let token = self.tus_id().await;
        let url = format!("{}{}", self.base_url, token);
        let request = Request::new(Method::Head, url).with_header("Tus-Resumable", "1.0.0");
        let response = self.http.send(request).await?;

        let offset = response
            .header("Upload-Offset")
            .parse::<u64>()
            .unwrap_or_else(|_| self.offset.load(Ordering::SeqCst));
        let length = response
            .header("Upload-Length")
            .parse::<u64>()
            .unwrap_or_else(|_| self.total_length.load(Ordering::SeqCst));

        self.offset.store(offset, Ordering::SeqCst);
        self.total_length.store(length, Ordering::SeqCst);
        self.progress
            .store(progress_pct(offset, length), Ordering::SeqCst);
        Ok(())
    }

    async fn tus_id(&self) -> String {
        self.tus_id.read().await.clone()
    }

    async fn set_tus_id(&self, token: String) {
        *self.tus_id.write().await = token.clone();
        self.record.lock().await.set_tus_id(token);
    }

    /// Writes the in-memory record's current offset/chunk-number into the
    /// cache document and persists it, so an interrupted process can resume
    /// from the last acknowledged chunk.
    async fn persist_snapshot(&self) {
        let offset = self.offset.load(Ordering::SeqCst);
        let chunk_number = self.chunk_number.load(Ordering::SeqCst);
        let snapshot = {
            let mut record = self.record.lock().await;
            record.set_offset(offset);
            record.set_chunk_number(chunk_number);
            record.clone()
        };
        let mut cache = self.cache.lock().await;
        cache.add(snapshot);
        cache.save().await;
    }

    async fn evict(&self) -> TusResult<()> {
        let hash = self.record.lock().await.hash.clone();
        let mut cache = self.cache.lock().await;
        cache.remove(&hash).await?;
        cache.save().await;
        Ok(())
    }
}
