//! Cancellable periodic tasks.
//!
//! A [`Poller`] runs an async step on a fixed interval until the step asks to
//! stop or the poller is cancelled. Dropping the poller cancels it.

use std::{future::Future, ops::ControlFlow, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a task that runs on a fixed interval.
#[derive(Debug)]
pub struct Poller {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawns `step` to run every `period`, starting immediately.
    ///
    /// The task ends when `step` returns [`ControlFlow::Break`] or the
    /// poller is cancelled. Slow steps delay the following ticks rather than
    /// causing a burst of catch-up runs.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero or when called outside of a Tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut step: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        trace!("{name}: cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if step().await.is_break() {
                            debug!("{name}: stopped");
                            break;
                        }
                    }
                }
            }
        });

        debug!("{name}: polling every {:.1}s", period.as_secs_f32());
        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Requests the task to stop after its current step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the task to end, either by cancellation or by its step
    /// breaking out.
    ///
    /// # Errors
    ///
    /// Returns error if the task panicked.
    pub async fn stopped(mut self) -> crate::error::Result<()> {
        match self.handle.take() {
            Some(handle) => Ok(handle.await?),
            None => Ok(()),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
