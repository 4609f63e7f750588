use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ConnectionOptions;
use crate::Error;
use crate::Result;
use crate::StreamConfig;
use crate::StreamConnection;
use crate::StreamListener;
use crate::StreamTransport;
use crate::TermChecker;

/// Keeps one streaming connection in line with a changing set of terms.
///
/// [`start_polling`](Self::start_polling) runs the polling loop on the calling
/// task. Each tick asks the [`TermChecker`] for changes and restarts the
/// connection when the terms changed or the previous connection died. The
/// connection itself runs on its own task; failures it reports through the
/// listener end the polling session with [`Error::Stream`].
///
/// Every method takes `&self`, so a second task (a signal handler, say) can call
/// [`stop_polling`](Self::stop_polling) while the loop runs.
pub struct DynamicStream<C: TermChecker> {
    transport: Arc<dyn StreamTransport>,
    listener: Arc<dyn StreamListener>,
    checker: tokio::sync::Mutex<C>,
    stream: Mutex<Option<Box<dyn StreamConnection>>>,
    polling: watch::Sender<bool>,

    unfiltered: bool,
    languages: Option<Vec<String>>,
    stop_timeout: Duration,
    min_poll_wait: Duration,
    options: ConnectionOptions,
}

impl<C: TermChecker> DynamicStream<C> {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        listener: Arc<dyn StreamListener>,
        checker: C,
        settings: &StreamConfig,
        options: ConnectionOptions,
    ) -> Self {
        let (polling, _) = watch::channel(false);
        Self {
            transport,
            listener,
            checker: tokio::sync::Mutex::new(checker),
            stream: Mutex::new(None),
            polling,
            unfiltered: settings.unfiltered,
            languages: settings.languages(),
            stop_timeout: settings.stop_timeout(),
            min_poll_wait: settings.min_poll_wait(),
            options,
        }
    }

    /// Runs the polling loop until [`stop_polling`](Self::stop_polling) is called
    /// or a tick fails.
    ///
    /// The checker is reset first, so the first tick always (re)starts the
    /// stream when terms are present. Consecutive ticks start at least
    /// `interval` apart, and never less than the minimum poll wait apart. On
    /// return no connection is left open.
    pub async fn start_polling(
        &self,
        interval: Duration,
    ) -> Result<()> {
        self.polling.send_replace(true);
        self.checker.lock().await.reset();

        info!(?interval, "Starting polling for changes to the track list");
        let result = self.poll(interval).await;
        if let Err(e) = &result {
            warn!(error = %e, "Polling session failed");
        }

        self.polling.send_replace(false);
        self.stop_stream().await;
        result
    }

    /// Ends the polling loop and disconnects the stream. Safe to call at any time,
    /// any number of times.
    ///
    /// A tick already past its check may still open one last connection before
    /// the loop sees the flag; the loop disconnects it on its way out.
    pub async fn stop_polling(&self) {
        info!("Stopping polling loop");
        self.polling.send_replace(false);
        self.stop_stream().await;
    }

    pub fn is_polling(&self) -> bool {
        *self.polling.borrow()
    }

    /// Whether a connection is currently held, running or not
    pub fn is_streaming(&self) -> bool {
        self.stream.lock().is_some()
    }

    pub async fn tracking_terms(&self) -> Vec<String> {
        self.checker.lock().await.tracking_terms()
    }

    async fn poll(
        &self,
        interval: Duration,
    ) -> Result<()> {
        let mut polling = self.polling.subscribe();

        while *polling.borrow() {
            let tick_started = Instant::now();

            self.update_stream().await?;
            self.handle_exceptions()?;

            let wait = interval.saturating_sub(tick_started.elapsed()).max(self.min_poll_wait);
            debug!(?wait, "Waiting for the next tick");
            tokio::select! {
                _ = sleep(wait) => {}
                _ = wait_for_stop(&mut polling) => {}
            }
        }

        warn!("Term poll ceased!");
        Ok(())
    }

    /// Restarts the stream if the connection died, the terms changed, or an
    /// unfiltered stream is expected but absent. Returns whether it restarted.
    ///
    /// A dead connection whose receive loop captured a failure is not replaced;
    /// the failure is returned instead.
    pub(crate) async fn update_stream(&self) -> Result<bool> {
        let mut need_to_restart = false;

        let crashed = self.stream.lock().as_ref().is_some_and(|stream| !stream.is_running());
        if crashed {
            // A loop that reported its failure ends the session instead of reconnecting
            self.handle_exceptions()?;
            warn!("Stream exists but isn't running");
            need_to_restart = true;
        }

        // Always evaluated: the checker must store the latest terms on every tick
        let changed = self.checker.lock().await.check().await?;
        if changed {
            need_to_restart = true;
        }

        if self.unfiltered && !self.is_streaming() {
            need_to_restart = true;
        }

        if !need_to_restart {
            return Ok(false);
        }

        info!("Restarting stream...");
        self.stop_stream().await;
        self.start_stream().await?;
        Ok(true)
    }

    /// Opens a connection for the current terms: filtered when there are terms,
    /// a sample when there are none and unfiltered mode is on, nothing otherwise.
    pub(crate) async fn start_stream(&self) -> Result<()> {
        let terms = self.checker.lock().await.tracking_terms();

        if terms.is_empty() && !self.unfiltered {
            info!("No terms to track; waiting for some");
            return Ok(());
        }

        let mut stream = self.transport.open(self.listener.clone(), &self.options);
        if terms.is_empty() {
            info!("Starting new unfiltered stream");
            stream.sample(self.languages.clone())?;
        } else {
            info!(count = terms.len(), ?terms, "Starting new stream");
            stream.filter(terms, self.languages.clone())?;
        }

        *self.stream.lock() = Some(stream);
        Ok(())
    }

    /// Disconnects the current connection, if any, then waits the stop timeout
    /// so the server notices before the next connection is opened.
    pub(crate) async fn stop_stream(&self) {
        let current = self.stream.lock().take();
        if let Some(mut stream) = current {
            warn!("Stopping stream...");
            stream.disconnect();
            drop(stream);
            sleep(self.stop_timeout).await;
        }
    }

    /// Re-raises a failure captured on the connection task, at most once.
    pub(crate) fn handle_exceptions(&self) -> Result<()> {
        match self.listener.take_exception() {
            Some(e) => {
                warn!(error = %e, "Streaming exception");
                Err(Error::Stream(e))
            }
            None => Ok(()),
        }
    }
}

async fn wait_for_stop(polling: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which also ends the wait
    let _ = polling.wait_for(|polling| !*polling).await;
}
