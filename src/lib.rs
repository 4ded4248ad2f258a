pub mod error;
pub mod model;
pub mod rendering;

pub use error::RenderError;
pub use model::{Graph, InputRef, Node, NodeInput, OutputRef, ParamValue, TimeRange, TrackKind};
pub use rendering::{
    AudioParams, ColorTransform, Frame, FrameHashCache, JobKind, JobOutput, JobPayload,
    RenderBackend, RenderMode, RenderWorker, SampleBuffer, Snapshot, Ticket, TicketOutcome,
    TicketStatus, VideoParams, WorkerSettings,
};
