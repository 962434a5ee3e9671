use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::error::TransportError;

use super::request::{Method, Request};
use super::response::Response;

/// Performs the actual network I/O for one request. Pulled out of
/// [`HttpClient`] so tests can substitute an in-memory double instead of
/// binding a real socket.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

struct ReqwestTransport {
    inner: reqwest::Client,
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = self
            .inner
            .request(request.method.into(), &request.url)
            .body(request.body.clone());
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(TransportError::Io)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(TransportError::Io)?;
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Builds an [`HttpClient`] with the connect timeout and TLS verification
/// policy.
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    insecure_skip_verify: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            insecure_skip_verify: false,
            transport: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Opt-in escape hatch matching the source's behavior of disabling peer
    /// verification. Defaults to `false` — verification stays on unless a
    /// caller explicitly asks otherwise.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Overrides the transport, bypassing reqwest entirely. Used by tests
    /// to exercise the queue/abort/bearer-auth machinery without a socket.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<HttpClient, TransportError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let inner = reqwest::Client::builder()
                    .connect_timeout(self.connect_timeout)
                    .danger_accept_invalid_certs(self.insecure_skip_verify)
                    .build()
                    .map_err(TransportError::Io)?;
                Arc::new(ReqwestTransport { inner })
            }
        };

        Ok(HttpClient {
            transport,
            queue: Mutex::new(VecDeque::new()),
            abort_signal: Notify::new(),
            aborted: AtomicBool::new(false),
            bearer: RwLock::new(None),
        })
    }
}

/// Enqueues and executes HTTP requests serially, allowing external
/// cancellation of all outstanding work.
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    queue: Mutex<VecDeque<Request>>,
    abort_signal: Notify,
    aborted: AtomicBool,
    bearer: RwLock<Option<String>>,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn new() -> Result<Self, TransportError> {
        HttpClientBuilder::default().build()
    }

    /// Stores a bearer credential attached as `Authorization: Bearer
    /// <token>` to subsequent outbound requests.
    pub async fn set_authorization(&self, token: impl Into<String>) {
        *self.bearer.write().await = Some(token.into());
    }

    pub async fn is_authenticated(&self) -> bool {
        self.bearer
            .read()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_empty())
    }

    async fn enqueue(&self, expected: Method, request: Request) -> Result<(), TransportError> {
        if request.method != expected {
            return Err(TransportError::MethodMismatch {
                method: request.method.as_str().to_string(),
                expected: expected.as_str().to_string(),
            });
        }
        if !Request::is_url_well_formed(&request.url) {
            return Err(TransportError::InvalidUrl(request.url));
        }
        self.aborted.store(false, Ordering::SeqCst);
        self.queue.lock().await.push_back(request);
        Ok(())
    }

    pub async fn get(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Get, request).await
    }
    pub async fn post(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Post, request).await
    }
    pub async fn put(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Put, request).await
    }
    pub async fn patch(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Patch, request).await
    }
    pub async fn delete(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Delete, request).await
    }
    pub async fn head(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Head, request).await
    }
    pub async fn options(&self, request: Request) -> Result<(), TransportError> {
        self.enqueue(Method::Options, request).await
    }

    /// Drains the queue, performing each request's I/O in turn and
    /// returning the results in FIFO order. Stops early, discarding
    /// whatever remains queued, if [`HttpClient::abort_all`] is observed
    /// between requests or while one is in flight.
    pub async fn execute(&self) -> Vec<Result<Response, TransportError>> {
        let mut results = Vec::new();
        loop {
            if self.aborted.load(Ordering::SeqCst) {
                self.queue.lock().await.clear();
                break;
            }
            let next = self.queue.lock().await.pop_front();
            let Some(request) = next else { break };
            let request_url = request.url.clone();

            let outcome = tokio::select! {
                biased;
                _ = self.abort_signal.notified() => {
                    debug!(url = %request_url, "request aborted before completion");
                    self.queue.lock().await.clear();
                    break;
                }
                result = self.send_one(request) => result,
            };
            results.push(outcome);
        }
        results
    }

    /// Issues one request outside the batch queue and waits for its
    /// outcome, racing it against [`HttpClient::abort_all`]. Safe to call
    /// concurrently from multiple tasks (e.g. the chunk loop and a
    /// `cancel()`/`pause()` caller): each call owns its own wait on the
    /// abort signal, so one caller's in-flight request does not steal
    /// another caller's response the way sharing the batch queue would.
    /// This is the path the session engine uses for every request.
    pub async fn send(&self, request: Request) -> Result<Response, TransportError> {
        if !Request::is_url_well_formed(&request.url) {
            return Err(TransportError::InvalidUrl(request.url));
        }
        let request_url = request.url.clone();
        tokio::select! {
            biased;
            _ = self.abort_signal.notified() => {
                debug!(url = %request_url, "request aborted before completion");
                Err(TransportError::Aborted)
            }
            result = self.send_one(request) => result,
        }
    }

    async fn send_one(&self, mut request: Request) -> Result<Response, TransportError> {
        if let Some(token) = self.bearer.read().await.as_ref() {
            request = request.with_header("Authorization", format!("Bearer {token}"));
        }
        self.transport.send(&request).await
    }

    /// Clears the queue and signals the in-flight request to terminate.
    /// Idempotent.
    pub async fn abort_all(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.queue.lock().await.clear();
        self.abort_signal.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Hand-written in-memory transport double: plays back one canned
    /// response per call, in order, recording the requests it observed.
    struct MockTransport {
        responses: StdMutex<VecDeque<Result<Response, TransportError>>>,
        observed: StdMutex<Vec<Request>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<Response, TransportError>>) -> Self {
            Self {
                responses: StdMutex::new(responses.into_iter().collect()),
                observed: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.observed.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Aborted))
        }
    }

    fn ok_response(status: u16) -> Result<Response, TransportError> {
        Ok(Response {
            status,
            headers: http::HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    #[tokio::test]
    async fn enqueue_rejects_method_mismatch() {
        let client = HttpClient::new().unwrap();
        let request = Request::new(Method::Post, "http://h/");
        let err = client.get(request).await.unwrap_err();
        assert!(matches!(err, TransportError::MethodMismatch { .. }));
    }

    #[tokio::test]
    async fn enqueue_rejects_hostile_urls() {
        let client = HttpClient::new().unwrap();
        let request = Request::new(Method::Get, "http://h/bad#");
        let err = client.get(request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn send_round_trips_against_a_real_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/"))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", "abc123"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = format!("{}/files/", server.uri());
        let request = Request::new(Method::Post, url).with_body(Bytes::new());
        let response = client.send(request).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.header("Location"), "abc123");
    }

    #[tokio::test]
    async fn bearer_token_is_attached_once_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure"))
            .respond_with(move |req: &wiremock::Request| {
                let header = req.headers.get("authorization");
                if header.map(|h| h.to_str().unwrap()) == Some("Bearer s3cr3t") {
                    ResponseTemplate::new(200)
                } else {
                    ResponseTemplate::new(401)
                }
            })
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        assert!(!client.is_authenticated().await);
        client.set_authorization("s3cr3t").await;
        assert!(client.is_authenticated().await);

        let url = format!("{}/secure", server.uri());
        let response = client.send(Request::new(Method::Get, url)).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn abort_all_clears_the_queue() {
        let client = Arc::new(HttpClient::new().unwrap());
        client
            .get(Request::new(Method::Get, "http://127.0.0.1:9/never"))
            .await
            .unwrap();
        client.abort_all().await;
        let results = client.execute().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn mock_transport_receives_enqueued_requests_in_order() {
        let transport = Arc::new(MockTransport::new(vec![ok_response(204), ok_response(204)]));
        let client = HttpClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();

        client
            .patch(Request::new(Method::Patch, "http://h/a"))
            .await
            .unwrap();
        client
            .patch(Request::new(Method::Patch, "http://h/b"))
            .await
            .unwrap();

        let results = client.execute().await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.as_ref().unwrap().status == 204));

        let observed = transport.observed.lock().unwrap();
        assert_eq!(observed[0].url, "http://h/a");
        assert_eq!(observed[1].url, "http://h/b");
    }

    #[tokio::test]
    async fn mock_transport_sees_bearer_header_once_authorized() {
        let transport = Arc::new(MockTransport::new(vec![ok_response(200)]));
        let client = HttpClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();
        client.set_authorization("tok").await;

        client
            .send(Request::new(Method::Get, "http://h/"))
            .await
            .unwrap();

        let observed = transport.observed.lock().unwrap();
        assert_eq!(
            observed[0].headers.get("Authorization").unwrap(),
            "Bearer tok"
        );
    }
}
