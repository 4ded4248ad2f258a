//! Cancelable, observable handles for requested render jobs.

use std::sync::{Arc, Condvar, Mutex};

use log::warn;
use ordered_float::OrderedFloat;
use uuid::Uuid;

use crate::error::RenderError;
use crate::model::TimeRange;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JobKind {
    Hash,
    Video,
    Audio,
}

/// Kind-specific request payload.
#[derive(Clone, PartialEq, Debug)]
pub enum JobPayload {
    Hash(Vec<OrderedFloat<f64>>),
    Video(OrderedFloat<f64>),
    Audio(TimeRange),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Hash(_) => JobKind::Hash,
            JobPayload::Video(_) => JobKind::Video,
            JobPayload::Audio(_) => JobKind::Audio,
        }
    }
}

/// Rendered video frame, raw bytes.
#[derive(Clone, PartialEq, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Rendered audio samples, interleaved.
#[derive(Clone, PartialEq, Debug)]
pub struct SampleBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub data: Vec<f32>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum JobOutput {
    Hashes(Vec<u64>),
    Frame(Frame),
    Audio(SampleBuffer),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TicketStatus {
    Queued,
    Dispatched,
    Completed,
    Cancelled,
}

/// Terminal result of a ticket. Cancellation is distinct from failure:
/// a cancelled ticket never ran, a failed one ran and reported an error.
#[derive(Clone, PartialEq, Debug)]
pub enum TicketOutcome {
    Completed(Result<JobOutput, RenderError>),
    Cancelled,
}

#[derive(Debug)]
enum TicketState {
    Queued,
    Dispatched,
    Finished(Result<JobOutput, RenderError>),
    Cancelled,
}

struct TicketInner {
    id: Uuid,
    payload: JobPayload,
    state: Mutex<TicketState>,
    done: Condvar,
}

/// Shared handle for one requested unit of render work.
///
/// State transitions are monotonic: `Queued -> Dispatched -> Finished`,
/// or `Queued -> Cancelled`. The result slot is fulfilled exactly once.
#[derive(Clone)]
pub struct Ticket {
    inner: Arc<TicketInner>,
}

impl Ticket {
    pub(crate) fn new(payload: JobPayload) -> Self {
        Self {
            inner: Arc::new(TicketInner {
                id: Uuid::new_v4(),
                payload,
                state: Mutex::new(TicketState::Queued),
                done: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> JobKind {
        self.inner.payload.kind()
    }

    pub fn payload(&self) -> &JobPayload {
        &self.inner.payload
    }

    pub fn status(&self) -> TicketStatus {
        match *self.inner.state.lock().expect("ticket state poisoned") {
            TicketState::Queued => TicketStatus::Queued,
            TicketState::Dispatched => TicketStatus::Dispatched,
            TicketState::Finished(_) => TicketStatus::Completed,
            TicketState::Cancelled => TicketStatus::Cancelled,
        }
    }

    /// Cancel a still-queued ticket. Has no effect once the ticket has been
    /// dispatched to a worker; the caller is expected to discard a late
    /// result instead.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock().expect("ticket state poisoned");
        match *state {
            TicketState::Queued => {
                *state = TicketState::Cancelled;
                self.inner.done.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Move a queued ticket to dispatched. Returns false when the ticket was
    /// cancelled while waiting in the queue, in which case it must be skipped.
    pub(crate) fn mark_dispatched(&self) -> bool {
        let mut state = self.inner.state.lock().expect("ticket state poisoned");
        match *state {
            TicketState::Queued => {
                *state = TicketState::Dispatched;
                true
            }
            _ => false,
        }
    }

    /// Fulfill the result slot. Only valid for a dispatched ticket.
    pub(crate) fn fulfill(&self, result: Result<JobOutput, RenderError>) {
        let mut state = self.inner.state.lock().expect("ticket state poisoned");
        match *state {
            TicketState::Dispatched => {
                *state = TicketState::Finished(result);
                self.inner.done.notify_all();
            }
            _ => {
                warn!("ticket {} fulfilled in non-dispatched state", self.inner.id);
            }
        }
    }

    /// Non-blocking result observation.
    pub fn outcome(&self) -> Option<TicketOutcome> {
        match &*self.inner.state.lock().expect("ticket state poisoned") {
            TicketState::Finished(result) => Some(TicketOutcome::Completed(result.clone())),
            TicketState::Cancelled => Some(TicketOutcome::Cancelled),
            _ => None,
        }
    }

    /// Block until the ticket reaches a terminal state.
    pub fn wait(&self) -> TicketOutcome {
        let mut state = self.inner.state.lock().expect("ticket state poisoned");
        loop {
            match &*state {
                TicketState::Finished(result) => {
                    return TicketOutcome::Completed(result.clone());
                }
                TicketState::Cancelled => return TicketOutcome::Cancelled,
                _ => {
                    state = self
                        .inner
                        .done
                        .wait(state)
                        .expect("ticket state poisoned");
                }
            }
        }
    }
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("id", &self.inner.id)
            .field("kind", &self.kind())
            .field("status", &self.status())
            .finish()
    }
}
