//! Effects produced by state transitions

use crate::timers::TimerSlot;
use std::time::Duration;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the transport to start a call; `attempt` tags any failure report
    StartTransport { assistant_id: String, attempt: u64 },

    /// Ask the transport to stop; safe when no call is active
    StopTransport,

    /// Arm a timer, replacing any pending timer in the same slot
    ArmTimer { slot: TimerSlot, delay: Duration },

    /// Cancel one timer slot
    CancelTimer { slot: TimerSlot },

    /// Cancel every pending timer
    CancelAllTimers,

    /// Speak a filler prompt during silence
    SendPrompt { text: String },

    /// Record a turn response latency sample
    RecordLatency { sample: Duration },
}

impl Effect {
    pub fn arm(slot: TimerSlot, delay: Duration) -> Self {
        Effect::ArmTimer { slot, delay }
    }

    pub fn cancel(slot: TimerSlot) -> Self {
        Effect::CancelTimer { slot }
    }
}
