//! The request-ahead timer.

use super::scheduler::TimerToken;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A cancellable one-shot deferred task, holding at most one pending instance.
///
/// Arming replaces (and aborts) whatever was armed before.
#[derive(Debug, Default)]
pub(crate) struct RequestTimer {
    armed: Option<(TimerToken, JoinHandle<()>)>,
}

impl RequestTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` after `delay`, unless cancelled first.
    pub(crate) fn arm<F>(&mut self, token: TimerToken, delay: Duration, on_fire: F)
    where
        F: FnOnce(TimerToken) + Send + 'static,
    {
        self.cancel_any();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(token);
        });
        self.armed = Some((token, task));
    }

    /// Cancel the timer armed with `token`, if it is still the armed one.
    pub(crate) fn cancel(&mut self, token: TimerToken) {
        if self.armed.as_ref().is_some_and(|(armed, _)| *armed == token) {
            self.cancel_any();
        }
    }

    /// Forget the timer once it has fired.
    pub(crate) fn fired(&mut self, token: TimerToken) {
        if self.armed.as_ref().is_some_and(|(armed, _)| *armed == token) {
            self.armed = None;
        }
    }

    pub(crate) fn cancel_any(&mut self) {
        if let Some((token, task)) = self.armed.take() {
            task.abort();
            tracing::trace!(sample_index = token.sample_index(), "request timer cancelled");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.cancel_any();
    }
}
