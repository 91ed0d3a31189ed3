//! Retransmission and completion timers.
//!
//! A transaction owns two [`TimerSlot`]s. Each armed slot is a tokio task
//! that sleeps and then runs its callback. Every `arm` and `stop` bumps the
//! slot generation; the callback must present the generation it was armed
//! with to [`TimerSlot::fire`] while holding the transaction lock, so a timer
//! that was stopped or replaced can never act even if its task already woke.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Replaces whatever is armed with a new timer firing after `after`.
    ///
    /// `make` receives the generation of the new timer and builds the
    /// callback future.
    pub(crate) fn arm<F, Fut>(&mut self, after: Duration, make: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();
        let callback = make(self.generation);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            callback.await;
        }));
    }

    pub(crate) fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Claims a firing timer.
    ///
    /// Returns false for stale generations. On success the task handle is
    /// released so that re-arming from inside the callback does not abort
    /// the callback itself.
    pub(crate) fn fire(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.handle = None;
        true
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
