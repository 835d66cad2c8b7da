//! Outbox state machine for the offline effect queue.
//!
//! This module provides a pure, side-effect-free state machine for the
//! single global outbox. The machine takes events as input and produces a new
//! state plus a list of actions to execute.
//!
//! The actual I/O (committing, persisting, arming timers) is performed by
//! offline-client, not by this module.
//!
//! ```text
//! Idle ──emit(online)──▶ Committing ──ok──▶ Idle
//!  │                         │
//!  └─emit(offline)─▶ Queued ◀┘fail
//!                    │  ▲
//!        online/timer│  │fail (attempts + 1)
//!                    ▼  │
//!                  Flushing ──ok──▶ Idle
//! ```

use offline_first_types::{NetworkStatus, ToolError};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Outbox state - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxState {
    /// Nothing queued, nothing in flight.
    Idle,
    /// A freshly emitted effect is being committed directly.
    Committing,
    /// A batch is persisted and waiting for connectivity or the retry timer.
    Queued {
        /// Failed commit attempts so far.
        attempts: u32,
    },
    /// The persisted batch is being committed.
    Flushing {
        /// Failed commit attempts before this flush.
        attempts: u32,
    },
}

impl OutboxState {
    /// Create a machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions in order.
    pub fn on_event(self, event: Event, policy: &dyn RetryPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // Cold start with a persisted batch
            (Self::Idle, Event::Hydrated { attempts }) => (
                Self::Queued { attempts },
                vec![Action::ScheduleRetry {
                    delay: policy.retry(attempts),
                }],
            ),

            // From Idle
            (Self::Idle, Event::EffectEmitted { online: true }) => {
                (Self::Committing, vec![Action::CommitEffect])
            }
            (Self::Idle, Event::EffectEmitted { online: false }) => (
                Self::Queued { attempts: 0 },
                vec![
                    Action::MergeEffect,
                    Action::Persist { attempts: 0 },
                    Action::ScheduleRetry {
                        delay: policy.retry(0),
                    },
                    Action::Emit(OutboxEvent::Queued { attempts: 0 }),
                ],
            ),

            // From Committing
            (Self::Committing, Event::CommitSucceeded) => {
                (Self::Idle, vec![Action::Emit(OutboxEvent::Committed)])
            }
            (Self::Committing, Event::CommitFailed { error }) => {
                if policy.discard(&error, 1) {
                    return (
                        Self::Idle,
                        vec![Action::Emit(OutboxEvent::Discarded { attempts: 1, error })],
                    );
                }
                (
                    Self::Queued { attempts: 1 },
                    vec![
                        Action::MergeEffect,
                        Action::Persist { attempts: 1 },
                        Action::ScheduleRetry {
                            delay: policy.retry(1),
                        },
                        Action::Emit(OutboxEvent::CommitFailed { attempts: 1, error }),
                    ],
                )
            }

            // From Queued
            (Self::Queued { attempts }, Event::EffectEmitted { online: true }) => (
                Self::Flushing { attempts },
                vec![
                    Action::MergeEffect,
                    Action::Persist { attempts },
                    Action::CancelRetry,
                    Action::FlushBatch,
                ],
            ),
            (Self::Queued { attempts }, Event::EffectEmitted { online: false }) => (
                Self::Queued { attempts },
                vec![
                    Action::MergeEffect,
                    Action::Persist { attempts },
                    Action::Emit(OutboxEvent::Queued { attempts }),
                ],
            ),
            (Self::Queued { attempts }, Event::NetworkChanged(NetworkStatus { online: true })) => (
                Self::Flushing { attempts },
                vec![Action::CancelRetry, Action::FlushBatch],
            ),
            (Self::Queued { attempts }, Event::RetryTimer { online: true }) => {
                (Self::Flushing { attempts }, vec![Action::FlushBatch])
            }
            (Self::Queued { attempts }, Event::RetryTimer { online: false }) => (
                Self::Queued { attempts },
                vec![Action::ScheduleRetry {
                    delay: policy.retry(attempts),
                }],
            ),

            // From Flushing
            (Self::Flushing { attempts }, Event::CommitSucceeded) => (
                Self::Idle,
                vec![
                    Action::ClearPersisted,
                    Action::Emit(OutboxEvent::Flushed { attempts }),
                ],
            ),
            (Self::Flushing { attempts }, Event::CommitFailed { error }) => {
                let next = attempts.saturating_add(1);
                if policy.discard(&error, next) {
                    return (
                        Self::Idle,
                        vec![
                            Action::ClearPersisted,
                            Action::Emit(OutboxEvent::Discarded {
                                attempts: next,
                                error,
                            }),
                        ],
                    );
                }
                (
                    Self::Queued { attempts: next },
                    vec![
                        Action::Persist { attempts: next },
                        Action::ScheduleRetry {
                            delay: policy.retry(next),
                        },
                        Action::Emit(OutboxEvent::CommitFailed {
                            attempts: next,
                            error,
                        }),
                    ],
                )
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Failed attempts recorded for the queued batch.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Queued { attempts } | Self::Flushing { attempts } => *attempts,
            Self::Idle | Self::Committing => 0,
        }
    }
}

impl Default for OutboxState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A non-empty batch was restored from storage.
    Hydrated {
        /// Failed attempts recorded in the persisted batch.
        attempts: u32,
    },
    /// An action handler emitted an effect.
    EffectEmitted {
        /// Connectivity at emission time.
        online: bool,
    },
    /// The in-flight commit succeeded.
    CommitSucceeded,
    /// The in-flight commit failed.
    CommitFailed {
        /// Why the commit failed.
        error: ToolError,
    },
    /// The network watcher reported a transition.
    NetworkChanged(NetworkStatus),
    /// The retry timer fired.
    RetryTimer {
        /// Connectivity when the timer fired.
        online: bool,
    },
}

/// Actions to be executed by offline-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Commit the just-emitted effect on its own.
    CommitEffect,
    /// Merge the just-emitted effect into the queued batch.
    MergeEffect,
    /// Commit the whole queued batch in one call.
    FlushBatch,
    /// Write the queued batch to storage with this attempt count.
    Persist {
        /// Attempt count to store.
        attempts: u32,
    },
    /// Remove the queued batch from storage.
    ClearPersisted,
    /// Arm the retry timer.
    ScheduleRetry {
        /// Delay before the timer fires.
        delay: Duration,
    },
    /// Disarm the retry timer.
    CancelRetry,
    /// Report an outcome to observers.
    Emit(OutboxEvent),
}

/// Outcomes reported by the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxEvent {
    /// An emitted effect was committed directly.
    Committed,
    /// An emitted effect was merged into the queued batch.
    Queued {
        /// Attempts recorded for the batch.
        attempts: u32,
    },
    /// The queued batch was committed.
    Flushed {
        /// Failed attempts before the successful flush.
        attempts: u32,
    },
    /// A commit failed and the batch was re-queued.
    CommitFailed {
        /// Attempts recorded after this failure.
        attempts: u32,
        /// Why the commit failed.
        error: ToolError,
    },
    /// The policy dropped the batch.
    Discarded {
        /// Attempts recorded after the final failure.
        attempts: u32,
        /// The final failure.
        error: ToolError,
    },
}
