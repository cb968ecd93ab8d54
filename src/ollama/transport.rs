//! HTTP transport for chat requests.
//!
//! A [`Transport`] opens one [`TransportHandle`] per call. The handle performs
//! a single POST and pushes the response body into a caller-provided sink,
//! then is dropped. Nothing is shared between calls apart from the
//! process-wide header template created by [`init_transport`].

use std::io::{ErrorKind, Read};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, trace};

use super::error::OllamaError;

const USER_AGENT_VALUE: &str = concat!("tinychain/", env!("CARGO_PKG_VERSION"));
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Opens per-call transport handles.
///
/// Implementations must not retry and must not reuse connections across
/// handles.
pub trait Transport: Send + Sync {
    /// Creates the handle for a single exchange.
    ///
    /// # Errors
    ///
    /// Returns [`OllamaError::ResourceInit`] if the handle cannot be created.
    fn open(&self) -> Result<Box<dyn TransportHandle>, OllamaError>;
}

/// One HTTP exchange. Resources are released when the handle is dropped.
pub trait TransportHandle {
    /// POSTs `body` to `url` and feeds every received body chunk to `sink`.
    ///
    /// The handle takes ownership of the call's header list, which is
    /// released no later than the handle itself.
    ///
    /// Returns the HTTP status code. Non-success statuses are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`OllamaError::Transport`] if the request could not be sent or
    /// the body could not be read.
    fn post(
        &mut self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<u16, OllamaError>;
}

/// Call-scoped accumulator for the response body.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    bytes: Vec<u8>,
}

impl ResponseBuffer {
    /// Appends one received chunk.
    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Returns the number of bytes received so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the buffer, returning the full body.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Default transport backed by `reqwest::blocking`.
///
/// Each handle owns a fresh client with idle pooling disabled. There is no
/// timeout unless one is configured.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with an optional whole-request timeout.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Returns the configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Transport for ReqwestTransport {
    fn open(&self) -> Result<Box<dyn TransportHandle>, OllamaError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| OllamaError::ResourceInit(e.to_string()))?;

        Ok(Box::new(ReqwestHandle { client }))
    }
}

struct ReqwestHandle {
    client: reqwest::blocking::Client,
}

impl TransportHandle for ReqwestHandle {
    fn post(
        &mut self,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<u16, OllamaError> {
        let mut response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .map_err(OllamaError::transport)?;

        let status = response.status().as_u16();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match response.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    trace!(bytes = n, "received body chunk");
                    sink(&chunk[..n]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(OllamaError::transport(e)),
            }
        }

        Ok(status)
    }
}

const UNINITIALIZED: u8 = 0;
const READY: u8 = 1;
const SHUT_DOWN: u8 = 2;

/// Process-wide transport state: uninitialized, ready, then shut down.
///
/// Initialization is idempotent. Once shut down the state is terminal.
#[derive(Debug)]
pub struct TransportLifecycle {
    state: AtomicU8,
}

impl TransportLifecycle {
    /// Creates an uninitialized lifecycle.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
        }
    }

    /// Moves to ready. Returns `true` only for the call that did the work.
    ///
    /// # Errors
    ///
    /// Returns [`OllamaError::ResourceInit`] after shutdown.
    pub fn init(&self) -> Result<bool, OllamaError> {
        match self
            .state
            .compare_exchange(UNINITIALIZED, READY, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(true),
            Err(READY) => Ok(false),
            Err(_) => Err(OllamaError::ResourceInit(
                "transport subsystem has been shut down".to_string(),
            )),
        }
    }

    /// Moves to shut down. Returns `true` only for the first call.
    pub fn shutdown(&self) -> bool {
        self.state.swap(SHUT_DOWN, Ordering::AcqRel) != SHUT_DOWN
    }

    /// Returns `true` once initialized and before shutdown.
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Returns `true` after shutdown.
    pub fn is_shut_down(&self) -> bool {
        self.state.load(Ordering::Acquire) == SHUT_DOWN
    }
}

impl Default for TransportLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

static LIFECYCLE: TransportLifecycle = TransportLifecycle::new();
static DEFAULT_HEADERS: OnceLock<HeaderMap> = OnceLock::new();

/// Prepares the transport subsystem. Safe to call any number of times.
///
/// Requests call this lazily, so an explicit call at startup is optional.
///
/// # Errors
///
/// Returns [`OllamaError::ResourceInit`] after [`shutdown_transport`].
pub fn init_transport() -> Result<(), OllamaError> {
    if LIFECYCLE.init()? {
        DEFAULT_HEADERS.get_or_init(default_headers);
        debug!("transport subsystem initialized");
    }
    Ok(())
}

/// Tears the transport subsystem down. Later requests fail.
pub fn shutdown_transport() {
    if LIFECYCLE.shutdown() {
        debug!("transport subsystem shut down");
    }
}

/// Returns a fresh header list for one request.
pub fn json_headers() -> HeaderMap {
    DEFAULT_HEADERS.get_or_init(default_headers).clone()
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers
}
