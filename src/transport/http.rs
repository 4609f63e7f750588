use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use reqwest::Url;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ConnectionOptions;
use super::StreamConnection;
use super::StreamRequest;
use super::StreamTransport;
use crate::constants::CONNECT_TIMEOUT_MS;
use crate::constants::MAX_LINE_BYTES;
use crate::ConnectionConfig;
use crate::Error;
use crate::Result;
use crate::StreamError;
use crate::StreamListener;

struct Endpoints {
    filter_url: Url,
    sample_url: Url,
    bearer_token: Option<String>,
}

/// [`StreamTransport`] over a long-lived HTTP response with one JSON payload per line.
pub struct HttpStreamTransport {
    client: Client,
    endpoints: Arc<Endpoints>,
}

impl HttpStreamTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .build()
            .map_err(StreamError::from)?;

        Ok(Self {
            client,
            endpoints: Arc::new(Endpoints {
                filter_url: parse_url(&config.filter_url())?,
                sample_url: parse_url(&config.sample_url())?,
                bearer_token: config.bearer_token.clone(),
            }),
        })
    }
}

impl StreamTransport for HttpStreamTransport {
    fn open(
        &self,
        listener: Arc<dyn StreamListener>,
        options: &ConnectionOptions,
    ) -> Box<dyn StreamConnection> {
        Box::new(HttpStreamConnection {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            listener,
            options: options.clone(),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            started: false,
        })
    }
}

/// One HTTP stream. The receive loop runs on its own task once started.
pub struct HttpStreamConnection {
    client: Client,
    endpoints: Arc<Endpoints>,
    listener: Arc<dyn StreamListener>,
    options: ConnectionOptions,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    started: bool,
}

impl HttpStreamConnection {
    fn start(
        &mut self,
        request: StreamRequest,
    ) -> Result<()> {
        if self.started {
            return Err(Error::Fatal("connection was already started".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::Fatal(format!("no runtime to run the receive loop on: {}", e)))?;

        self.started = true;
        self.running.store(true, Ordering::SeqCst);

        let receive_loop = ReceiveLoop {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            request,
            listener: self.listener.clone(),
            options: self.options.clone(),
            running: self.running.clone(),
            cancel: self.cancel.clone(),
        };
        runtime.spawn(receive_loop.run());
        Ok(())
    }
}

impl StreamConnection for HttpStreamConnection {
    fn filter(
        &mut self,
        track: Vec<String>,
        languages: Option<Vec<String>>,
    ) -> Result<()> {
        self.start(StreamRequest::Filter { track, languages })
    }

    fn sample(
        &mut self,
        languages: Option<Vec<String>>,
    ) -> Result<()> {
        self.start(StreamRequest::Sample { languages })
    }

    fn disconnect(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("Disconnecting stream");
        }
        self.cancel.cancel();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for HttpStreamConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Outcome {
    /// The listener or the owner asked to stop
    Stopped,
    /// Non-200 answer the listener wants to retry
    Rejected,
    /// Network level failure, worth a reconnect
    Failed(StreamError),
    /// The listener itself failed; reconnecting would not help
    Fatal(StreamError),
}

struct ReceiveLoop {
    client: Client,
    endpoints: Arc<Endpoints>,
    request: StreamRequest,
    listener: Arc<dyn StreamListener>,
    options: ConnectionOptions,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    async fn run(self) {
        let mut failures = 0usize;

        loop {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => Outcome::Stopped,
                outcome = self.receive(&mut failures) => outcome,
            };

            match outcome {
                Outcome::Stopped => break,
                Outcome::Fatal(error) => {
                    self.listener.on_exception(error);
                    break;
                }
                Outcome::Rejected => {
                    failures += 1;
                    if failures > self.options.retry_count {
                        warn!(failures, "Endpoint keeps rejecting the stream, giving up");
                        break;
                    }
                }
                Outcome::Failed(error) => {
                    failures += 1;
                    if failures > self.options.retry_count {
                        self.listener.on_exception(error);
                        break;
                    }
                    warn!(%error, failures, "Stream interrupted, reconnecting in {:?}", self.options.retry_delay);
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.options.retry_delay) => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("Receive loop exited");
    }

    /// One connection attempt, read until it ends
    async fn receive(
        &self,
        failures: &mut usize,
    ) -> Outcome {
        let response = match self.build_request().send().await {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(e.into()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return if self.listener.on_error(status.as_u16()) {
                Outcome::Rejected
            } else {
                Outcome::Stopped
            };
        }

        *failures = 0;
        info!(url = %response.url(), "Stream connected");

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();
        loop {
            let chunk = match timeout(self.options.timeout, body.next()).await {
                Err(_) => return Outcome::Failed(StreamError::Timeout(self.options.timeout)),
                Ok(None) => {
                    return Outcome::Failed(
                        io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed by the server").into(),
                    )
                }
                Ok(Some(Err(e))) => return Outcome::Failed(e.into()),
                Ok(Some(Ok(chunk))) => chunk,
            };

            let received = match lines.push(&chunk) {
                Ok(received) => received,
                Err(e) => return Outcome::Failed(e),
            };
            for line in received {
                match self.deliver(&line) {
                    Ok(true) => {}
                    Ok(false) => return Outcome::Stopped,
                    Err(e) => return Outcome::Fatal(e),
                }
            }
        }
    }

    fn deliver(
        &self,
        line: &str,
    ) -> std::result::Result<bool, StreamError> {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.listener.on_data(line)))
            .map_err(|payload| StreamError::Handler(panic_message(payload)))
    }

    fn build_request(&self) -> RequestBuilder {
        let builder = match &self.request {
            StreamRequest::Filter { track, languages } => {
                let mut form = vec![("track", track.join(","))];
                form.extend(self.common_params(languages));
                self.client.post(self.endpoints.filter_url.clone()).form(&form)
            }
            StreamRequest::Sample { languages } => {
                let query = self.common_params(languages);
                self.client.get(self.endpoints.sample_url.clone()).query(&query)
            }
        };

        match &self.endpoints.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn common_params(
        &self,
        languages: &Option<Vec<String>>,
    ) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(languages) = languages {
            params.push(("language", languages.join(",")));
        }
        if self.options.stall_warnings {
            params.push(("stall_warnings", "true".to_string()));
        }
        params
    }
}

/// Splits a byte stream into trimmed, non-empty lines.
///
/// Blank lines are the server's keep-alives and are dropped. A partial line
/// stays buffered until the chunk completing it arrives, up to `max_line`
/// bytes.
pub(crate) struct LineBuffer {
    pending: BytesMut,
    // bytes of `pending` already known to hold no newline
    scanned: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub(crate) fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            scanned: 0,
            max_line,
        }
    }

    pub(crate) fn push(
        &mut self,
        chunk: &[u8],
    ) -> std::result::Result<Vec<String>, StreamError> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let line = self.pending.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_line {
            let buffered = self.pending.len();
            self.pending.clear();
            self.scanned = 0;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {} bytes ({} buffered)", self.max_line, buffered),
            )
            .into());
        }
        Ok(lines)
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn parse_url(url: &str) -> std::result::Result<Url, StreamError> {
    Url::parse(url).map_err(|e| StreamError::InvalidRequest(format!("{}: {}", url, e)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "message handler panicked".to_string()
    }
}
