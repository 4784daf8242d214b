use std::fmt;

/// The ten states a request cycle moves through.
///
/// `Idle` is the rest state of a recycled slot; `Complete` is terminal for
/// one request pass and only `recycle()` leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Slot is at rest, no request in flight.
    Idle,
    /// Original (or post-recycle) pass is running in the pipeline.
    Dispatched,
    /// `suspend()` was called, the pass has not yet returned control.
    Suspending,
    /// A resume arrived before the suspension parked.
    Redispatching,
    /// The request is parked, awaiting resume, completion or expiry.
    Suspended,
    /// A resume arrived for a parked request; re-entry is pending.
    Unsuspending,
    /// A resumed pass is running in the pipeline.
    Redispatched,
    /// Terminal intent recorded; the cycle is on its way to completion.
    Completing,
    /// The pipeline is done with the request; completion not yet run.
    Uncompleted,
    /// The request is finished; only `recycle()` is legal.
    Complete,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "IDLE",
            CycleState::Dispatched => "DISPATCHED",
            CycleState::Suspending => "SUSPENDING",
            CycleState::Redispatching => "REDISPATCHING",
            CycleState::Suspended => "SUSPENDED",
            CycleState::Unsuspending => "UNSUSPENDING",
            CycleState::Redispatched => "REDISPATCHED",
            CycleState::Completing => "COMPLETING",
            CycleState::Uncompleted => "UNCOMPLETED",
            CycleState::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
