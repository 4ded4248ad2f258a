pub mod backend;
pub mod hash_cache;
pub mod params;
pub mod snapshot;
pub mod ticket;
pub mod update_queue;
pub mod worker;

pub use backend::RenderBackend;
pub use hash_cache::FrameHashCache;
pub use params::{AudioParams, ColorTransform, RenderMode, VideoParams};
pub use snapshot::{Snapshot, SAMPLES_INPUT, TEXTURE_INPUT};
pub use ticket::{
    Frame, JobKind, JobOutput, JobPayload, SampleBuffer, Ticket, TicketOutcome, TicketStatus,
};
pub use update_queue::UpdateQueue;
pub use worker::{RenderWorker, WorkerSettings};
