use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ConnectionOptions;
use crate::Result;
use crate::StreamConnection;
use crate::StreamError;
use crate::StreamListener;
use crate::StreamRequest;
use crate::StreamTransport;

/// In-memory transport that records every connection it opens.
///
/// Connections never touch the network: the test drives them through
/// [`FakeConnectionState`].
#[derive(Default)]
pub struct FakeTransport {
    opened: Mutex<Vec<Arc<FakeConnectionState>>>,
    linger: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections keep reporting `is_running` after `disconnect` until
    /// [`FakeConnectionState::finish`] is called, like a receive loop still
    /// unwinding.
    pub fn lingering() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            linger: true,
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn connection(
        &self,
        index: usize,
    ) -> Arc<FakeConnectionState> {
        self.opened.lock()[index].clone()
    }

    pub fn last(&self) -> Option<Arc<FakeConnectionState>> {
        self.opened.lock().last().cloned()
    }

    /// Requests of all connections that were started, in order
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.opened.lock().iter().filter_map(|c| c.request()).collect()
    }
}

impl StreamTransport for FakeTransport {
    fn open(
        &self,
        listener: Arc<dyn StreamListener>,
        options: &ConnectionOptions,
    ) -> Box<dyn StreamConnection> {
        let state = Arc::new(FakeConnectionState {
            options: options.clone(),
            listener,
            request: Mutex::new(None),
            running: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
            linger: self.linger,
        });
        self.opened.lock().push(state.clone());
        Box::new(FakeConnection { state })
    }
}

pub struct FakeConnectionState {
    pub options: ConnectionOptions,
    listener: Arc<dyn StreamListener>,
    request: Mutex<Option<StreamRequest>>,
    running: AtomicBool,
    disconnects: AtomicUsize,
    linger: bool,
}

impl FakeConnectionState {
    pub fn request(&self) -> Option<StreamRequest> {
        self.request.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// The receive loop dies without reporting anything
    pub fn crash(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// The receive loop dies and reports `error` to its listener
    pub fn fail(
        &self,
        error: StreamError,
    ) {
        self.listener.on_exception(error);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Feeds one raw payload to the listener, as the receive loop would
    pub fn deliver(
        &self,
        raw: &str,
    ) -> bool {
        self.listener.on_data(raw)
    }

    /// A lingering receive loop finally exits
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn start(
        &self,
        request: StreamRequest,
    ) {
        *self.request.lock() = Some(request);
        self.running.store(true, Ordering::SeqCst);
    }
}

struct FakeConnection {
    state: Arc<FakeConnectionState>,
}

impl StreamConnection for FakeConnection {
    fn filter(
        &mut self,
        track: Vec<String>,
        languages: Option<Vec<String>>,
    ) -> Result<()> {
        self.state.start(StreamRequest::Filter { track, languages });
        Ok(())
    }

    fn sample(
        &mut self,
        languages: Option<Vec<String>>,
    ) -> Result<()> {
        self.state.start(StreamRequest::Sample { languages });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        if !self.state.linger {
            self.state.running.store(false, Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }
}
