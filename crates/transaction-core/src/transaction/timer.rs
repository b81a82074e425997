//! One-shot, re-armable timer owned by a single transaction.
//!
//! A [`RetryTimer`] holds at most one scheduled callback. Arming it again
//! releases the previous callback before scheduling the new one, and
//! dropping it releases whatever is outstanding, so the owner never has to
//! clean up by hand.
//!
//! Every arm gets a fresh epoch. A callback receives its epoch and must
//! present it to [`RetryTimer::release_fired`] before acting; a callback
//! from an earlier arm, or one racing a disarm, is then recognised as stale.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct RetryTimer {
    handle: Option<JoinHandle<()>>,
    epoch: u64,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `on_fire` to run after `after`, replacing any armed
    /// callback. Returns the epoch handed to `on_fire`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, after: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.disarm();
        self.epoch += 1;
        let epoch = self.epoch;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire(epoch).await;
        }));
        epoch
    }

    /// Cancels the armed callback. Returns false when nothing was armed.
    pub fn disarm(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by a firing callback. Detaches the callback's own handle
    /// without aborting it and reports whether `epoch` is still current.
    pub fn release_fired(&mut self, epoch: u64) -> bool {
        if self.handle.is_some() && self.epoch == epoch {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
