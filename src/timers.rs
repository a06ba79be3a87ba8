//! Named, cancelable, single-shot delayed actions
//!
//! Each slot holds at most one pending timer. Arming an occupied slot cancels
//! the previous timer first.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timer slots used by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerSlot {
    /// No reply after the user stopped talking: send a filler prompt
    Silence,
    /// No activity after the assistant's last turn: close the conversation
    Ending,
    /// Grace period between entering `ending` and stopping the transport
    Hangup,
    /// Debounce before showing the busy indicator
    ProcessingSpinner,
    /// Delay before an automatic call restart
    Retry,
}

/// Reference to one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub slot: TimerSlot,
    generation: u64,
}

#[cfg(test)]
impl TimerHandle {
    /// A handle no `TimerSet` will ever claim, for driving transitions directly
    pub fn detached(slot: TimerSlot) -> Self {
        Self {
            slot,
            generation: 0,
        }
    }
}

#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    cancel: CancellationToken,
}

/// Owns the pending timers for a session
#[derive(Debug, Default)]
pub struct TimerSet {
    slots: HashMap<TimerSlot, PendingTimer>,
    next_generation: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run after `delay` unless canceled first.
    ///
    /// The action receives the handle so it can report back; use
    /// [`TimerSet::complete`] to check the report is still current.
    pub fn arm<F, Fut>(&mut self, slot: TimerSlot, delay: Duration, action: F) -> TimerHandle
    where
        F: FnOnce(TimerHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(slot);

        self.next_generation += 1;
        let handle = TimerHandle {
            slot,
            generation: self.next_generation,
        };
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => action(handle).await,
            }
        });

        tracing::trace!(?slot, delay_ms = %delay.as_millis(), "Timer armed");
        self.slots.insert(
            slot,
            PendingTimer {
                generation: handle.generation,
                cancel,
            },
        );
        handle
    }

    /// Cancel the timer in `slot`, if any
    pub fn cancel(&mut self, slot: TimerSlot) {
        if let Some(pending) = self.slots.remove(&slot) {
            pending.cancel.cancel();
            tracing::trace!(?slot, "Timer canceled");
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.slots.drain() {
            pending.cancel.cancel();
        }
    }

    /// Claim a fired timer. Returns false if the handle was canceled or
    /// superseded since it was armed, in which case the fire must be ignored.
    pub fn complete(&mut self, handle: TimerHandle) -> bool {
        match self.slots.get(&handle.slot) {
            Some(pending) if pending.generation == handle.generation => {
                self.slots.remove(&handle.slot);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Number of pending timers across all slots
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
