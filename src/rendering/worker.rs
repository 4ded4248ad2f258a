//! Worker boundary: the trait a render worker implements and the pool slot
//! machinery that binds one worker to one pool thread.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};
use ordered_float::OrderedFloat;

use crate::error::RenderError;
use crate::model::TimeRange;
use crate::rendering::params::{AudioParams, ColorTransform, RenderMode, VideoParams};
use crate::rendering::snapshot::Snapshot;
use crate::rendering::ticket::{Frame, JobOutput, JobPayload, SampleBuffer, Ticket};

/// Output configuration handed to a worker before every job.
#[derive(Clone, Debug, Default)]
pub struct WorkerSettings {
    pub video: VideoParams,
    pub audio: AudioParams,
    pub color_transform: ColorTransform,
    pub mode: RenderMode,
    /// When set, the worker should also generate preview data for jobs at
    /// or beyond this time.
    pub preview_time: Option<OrderedFloat<f64>>,
}

/// One render/hash executor. Implementations are external to this core; the
/// scheduler only requires one operation per job kind plus configuration.
///
/// A worker may read arbitrarily deep into the snapshot graph for the whole
/// duration of a job; the scheduler guarantees the snapshot is not mutated
/// while it does.
pub trait RenderWorker: Send {
    fn configure(&mut self, settings: &WorkerSettings);

    fn hash(
        &mut self,
        snapshot: &Snapshot,
        times: &[OrderedFloat<f64>],
    ) -> Result<Vec<u64>, RenderError>;

    fn render_frame(
        &mut self,
        snapshot: &Snapshot,
        time: OrderedFloat<f64>,
    ) -> Result<Frame, RenderError>;

    fn render_audio(
        &mut self,
        snapshot: &Snapshot,
        range: TimeRange,
    ) -> Result<SampleBuffer, RenderError>;
}

/// Factory building one worker per pool slot.
pub type WorkerFactory = Box<dyn Fn() -> Box<dyn RenderWorker>>;

pub(crate) struct WorkerJob {
    pub ticket: Ticket,
    pub snapshot: Arc<Snapshot>,
    pub settings: WorkerSettings,
}

/// One reusable executor slot bound 1:1 to a pool thread.
pub(crate) struct WorkerSlot {
    tx: Option<Sender<WorkerJob>>,
    handle: Option<JoinHandle<()>>,
    pub busy: bool,
}

impl WorkerSlot {
    pub fn spawn(index: usize, worker: Box<dyn RenderWorker>, done_tx: Sender<usize>) -> Self {
        let (tx, rx) = mpsc::channel::<WorkerJob>();

        let handle = thread::spawn(move || {
            let mut worker = worker;
            while let Ok(job) = rx.recv() {
                let WorkerJob {
                    ticket,
                    snapshot,
                    settings,
                } = job;

                worker.configure(&settings);
                let result = match ticket.payload() {
                    JobPayload::Hash(times) => {
                        worker.hash(&snapshot, times).map(JobOutput::Hashes)
                    }
                    JobPayload::Video(time) => {
                        worker.render_frame(&snapshot, *time).map(JobOutput::Frame)
                    }
                    JobPayload::Audio(range) => {
                        worker.render_audio(&snapshot, *range).map(JobOutput::Audio)
                    }
                };

                if let Err(e) = &result {
                    debug!("worker {index} job {} failed: {e}", ticket.id());
                }
                ticket.fulfill(result);

                // Release the snapshot before reporting idle, so an idle pool
                // really means no one is reading the graph.
                drop(snapshot);
                if done_tx.send(index).is_err() {
                    break;
                }
            }
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
            busy: false,
        }
    }

    pub fn submit(&mut self, job: WorkerJob) {
        let Some(tx) = &self.tx else {
            error!("submit on a closed worker slot");
            return;
        };
        if tx.send(job).is_err() {
            error!("worker slot thread is gone");
            return;
        }
        self.busy = true;
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        // Closing the channel ends the thread's receive loop.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
