use std::io::Stdout;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use serde_json::Value;
use tracing::error;
use tracing::info;

use super::MessageHandler;

/// Something that can log and reset a throughput figure
#[cfg_attr(test, automock)]
pub trait ThroughputReporter: Send + Sync + 'static {
    fn print_status(&self);
}

/// Writes every status as one line of JSON and counts them.
///
/// The counters are atomics: the connection task increments them while the
/// polling loop reads and resets them.
pub struct PrintingHandler<W: Write + Send + 'static> {
    out: Mutex<W>,
    terminate: AtomicBool,
    received: AtomicU64,
    since: Mutex<Instant>,
}

impl PrintingHandler<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> PrintingHandler<W> {
    pub fn new(out: W) -> Self {
        PrintingHandler {
            out: Mutex::new(out),
            terminate: AtomicBool::new(false),
            received: AtomicU64::new(0),
            since: Mutex::new(Instant::now()),
        }
    }

    /// Asks the receive loop to stop after the next status
    pub fn set_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Statuses received since the last report
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn output(&self) -> MutexGuard<'_, W> {
        self.out.lock()
    }

    /// Logs the status rate since the last report and resets the counter.
    ///
    /// Returns the rate in statuses per second, `None` if no time has elapsed.
    pub fn report_throughput(&self) -> Option<f64> {
        let received = self.received.swap(0, Ordering::AcqRel);
        let now = Instant::now();
        let elapsed = {
            let mut since = self.since.lock();
            let elapsed = now.duration_since(*since);
            *since = now;
            elapsed
        };

        let seconds = elapsed.as_secs_f64();
        if seconds > 0.0 {
            let rate = received as f64 / seconds;
            info!(received, "Receiving statuses at {:.2} per second", rate);
            Some(rate)
        } else {
            None
        }
    }

    fn write_status(
        &self,
        status: &Value,
    ) -> std::io::Result<()> {
        let mut out = self.out.lock();
        serde_json::to_writer(&mut *out, status)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

impl<W: Write + Send + 'static> MessageHandler for PrintingHandler<W> {
    fn on_status(
        &self,
        status: &Value,
    ) -> bool {
        if let Err(e) = self.write_status(status) {
            error!("Failed to write status: {}", e);
            return false;
        }

        self.received.fetch_add(1, Ordering::AcqRel);
        !self.is_terminating()
    }
}

impl<W: Write + Send + 'static> ThroughputReporter for PrintingHandler<W> {
    fn print_status(&self) {
        self.report_throughput();
    }
}
