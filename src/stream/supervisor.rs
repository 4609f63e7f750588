use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::time::sleep;
use tracing::error;
use tracing::info;

use super::DynamicStream;
use crate::Result;
use crate::TermChecker;

/// Something that runs polling sessions until they end or fail
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Poller: Send + Sync + 'static {
    async fn start_polling(
        &self,
        interval: Duration,
    ) -> Result<()>;
}

#[async_trait]
impl<C: TermChecker> Poller for DynamicStream<C> {
    async fn start_polling(
        &self,
        interval: Duration,
    ) -> Result<()> {
        DynamicStream::start_polling(self, interval).await
    }
}

/// Runs polling sessions back to back while `should_continue` returns `true`.
///
/// A failed session is logged and followed by `backoff` before the next one
/// starts; the failure itself never leaves this loop.
pub async fn begin_stream_loop<P, F>(
    poller: &P,
    interval: Duration,
    backoff: Duration,
    mut should_continue: F,
) where
    P: Poller + ?Sized,
    F: FnMut() -> bool,
{
    while should_continue() {
        if let Err(e) = poller.start_polling(interval).await {
            error!(error = %e, "Exception while polling. Restarting in {:?}...", backoff);
            sleep(backoff).await;
        }
    }
    info!("Stream loop finished");
}
