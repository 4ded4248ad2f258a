//! The render backend: a control-thread scheduler that feeds a fixed pool
//! of worker threads from a FIFO ticket queue, against a graph snapshot
//! that is only refreshed while the pool is drained.
//!
//! Everything here runs on the thread that owns the live graph. Workers
//! communicate back over a completion channel which `pump`/`wait_idle`
//! drain; a dispatch pass is never entered recursively, it is requested
//! through a flag and run from the pump loop.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, error, info, warn};
use ordered_float::OrderedFloat;
use uuid::Uuid;

use crate::error::RenderError;
use crate::model::node::InputRef;
use crate::model::{Graph, TimeRange};
use crate::rendering::params::{AudioParams, ColorTransform, RenderMode, VideoParams};
use crate::rendering::snapshot::{Snapshot, SAMPLES_INPUT, TEXTURE_INPUT};
use crate::rendering::ticket::{JobPayload, Ticket};
use crate::rendering::update_queue::UpdateQueue;
use crate::rendering::worker::{RenderWorker, WorkerFactory, WorkerJob, WorkerSettings, WorkerSlot};

const DEFAULT_AUDIO_CHUNK_LEN: f64 = 2.0;

pub struct RenderBackend {
    factory: WorkerFactory,
    worker_count: Option<usize>,

    snapshot: Option<Arc<Snapshot>>,
    job_queue: VecDeque<Ticket>,
    update_queue: UpdateQueue,
    workers: Vec<WorkerSlot>,
    done_tx: Sender<usize>,
    done_rx: Receiver<usize>,
    dispatch_pending: bool,

    video_params: VideoParams,
    audio_params: AudioParams,
    color_transform: ColorTransform,
    render_mode: RenderMode,
    preview_time: Option<OrderedFloat<f64>>,
    track_graph: bool,
    audio_chunk_len: f64,
}

impl RenderBackend {
    pub fn new(factory: impl Fn() -> Box<dyn RenderWorker> + 'static) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            factory: Box::new(factory),
            worker_count: None,
            snapshot: None,
            job_queue: VecDeque::new(),
            update_queue: UpdateQueue::new(),
            workers: Vec::new(),
            done_tx,
            done_rx,
            dispatch_pending: false,
            video_params: VideoParams::default(),
            audio_params: AudioParams::default(),
            color_transform: ColorTransform::identity(),
            render_mode: RenderMode::default(),
            preview_time: None,
            track_graph: true,
            audio_chunk_len: DEFAULT_AUDIO_CHUNK_LEN,
        }
    }

    // -- configuration ------------------------------------------------------

    /// Fixed pool size. Defaults to the machine's available parallelism.
    /// Only effective before the first dispatch allocates the slots.
    pub fn set_worker_count(&mut self, count: usize) {
        self.worker_count = Some(count.max(1));
    }

    pub fn set_video_params(&mut self, params: VideoParams) {
        self.video_params = params;
    }

    pub fn set_audio_params(&mut self, params: AudioParams) {
        self.audio_params = params;
    }

    pub fn set_color_transform(&mut self, transform: ColorTransform) {
        self.color_transform = transform;
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    /// Optional preview-generation hint passed through to workers.
    pub fn set_preview_time(&mut self, time: Option<f64>) {
        self.preview_time = time.map(OrderedFloat);
    }

    /// When disabled, recorded graph changes are only applied through
    /// [`RenderBackend::apply_updates`], never by the dispatch pass.
    pub fn set_track_graph(&mut self, track: bool) {
        self.track_graph = track;
    }

    /// Granularity used by [`RenderBackend::split_range_into_chunks`].
    pub fn set_audio_chunk_len(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.audio_chunk_len = seconds;
        }
    }

    // -- viewer attachment --------------------------------------------------

    /// Attach a live viewer root, building the snapshot of everything its
    /// texture and samples inputs reach. Replacing an existing root first
    /// tears the old session down (cancel queue, drain pool, drop snapshot).
    pub fn set_viewer(&mut self, live: &Graph, viewer: Uuid) -> Result<(), RenderError> {
        if self.snapshot.as_ref().map(|s| s.viewer()) == Some(viewer) {
            return Ok(());
        }

        let viewer_node = live.node(viewer).ok_or(RenderError::NoViewer)?;
        self.detach();

        let mut snapshot = Snapshot::new(live, viewer)?;
        for root in [TEXTURE_INPUT, SAMPLES_INPUT] {
            if viewer_node.input(root).is_some() {
                self.update_queue
                    .record(live, &snapshot, InputRef::new(viewer, root));
            }
        }
        for entry in self.update_queue.take_all() {
            snapshot.apply_input(live, &entry)?;
        }

        info!(
            "attached viewer {viewer}, snapshot holds {} node(s)",
            snapshot.node_count()
        );
        self.snapshot = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Tear the session down: stop accepting tickets, cancel the queued
    /// ones, wait for in-flight jobs, then release the snapshot and discard
    /// buffered updates. Worker slots stay allocated for the next root.
    pub fn detach(&mut self) {
        if self.snapshot.is_none() && self.job_queue.is_empty() {
            self.update_queue.clear();
            return;
        }

        self.cancel_queue();
        self.drain_pool();
        self.dispatch_pending = false;
        self.update_queue.clear();

        if let Some(snapshot) = self.snapshot.take() {
            debug_assert_eq!(
                Arc::strong_count(&snapshot),
                1,
                "snapshot still shared after the pool drained"
            );
            debug!(
                "detached viewer {}, releasing {} snapshot node(s)",
                snapshot.viewer(),
                snapshot.node_count()
            );
        }
    }

    /// Full shutdown: detach and release the worker slots.
    pub fn close(&mut self) {
        self.detach();
        self.workers.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Read access to the current snapshot, mainly for inspection in tests.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_deref()
    }

    // -- job submission -----------------------------------------------------

    /// Request content hashes for a set of frame times.
    pub fn request_hash(&mut self, times: Vec<f64>) -> Option<Ticket> {
        self.enqueue(JobPayload::Hash(times.into_iter().map(OrderedFloat).collect()))
    }

    /// Request one rendered video frame.
    pub fn request_frame(&mut self, time: f64) -> Option<Ticket> {
        self.enqueue(JobPayload::Video(OrderedFloat(time)))
    }

    /// Request rendered audio for a time range.
    pub fn request_audio(&mut self, range: TimeRange) -> Option<Ticket> {
        self.enqueue(JobPayload::Audio(range))
    }

    fn enqueue(&mut self, payload: JobPayload) -> Option<Ticket> {
        if self.snapshot.is_none() {
            debug!("ignoring {:?} request, no viewer attached", payload.kind());
            return None;
        }

        let ticket = Ticket::new(payload);
        self.job_queue.push_back(ticket.clone());
        self.dispatch_pending = true;
        Some(ticket)
    }

    /// Cancel every queued ticket and empty the queue. Jobs already handed
    /// to a worker keep running; their results are the caller's to discard.
    pub fn cancel_queue(&mut self) {
        for ticket in self.job_queue.drain(..) {
            ticket.cancel();
        }
    }

    pub fn queue_len(&self) -> usize {
        self.job_queue.len()
    }

    // -- graph change tracking ----------------------------------------------

    /// Notification that one live input's value or connectivity changed.
    /// Buffered and coalesced; applied at the next safe point.
    pub fn graph_changed(&mut self, live: &Graph, input: InputRef) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        self.update_queue.record(live, snapshot, input);
    }

    /// Explicitly flush pending updates into the snapshot. Refused (returns
    /// false) while any worker is reading the snapshot.
    pub fn apply_updates(&mut self, live: &Graph) -> bool {
        if self.update_queue.is_empty() {
            return true;
        }
        if self.workers.iter().any(|w| w.busy) {
            return false;
        }
        self.flush_updates(live)
    }

    pub fn pending_update_len(&self) -> usize {
        self.update_queue.len()
    }

    fn flush_updates(&mut self, live: &Graph) -> bool {
        let Some(snapshot) = self.snapshot.as_mut() else {
            self.update_queue.clear();
            return false;
        };
        let Some(snapshot) = Arc::get_mut(snapshot) else {
            // Bookkeeping said the pool is idle, yet someone still holds the
            // graph. Do not touch it.
            error!("snapshot still referenced by a worker, deferring update flush");
            return false;
        };

        let entries = self.update_queue.take_all();
        let count = entries.len();
        let started = Instant::now();
        for entry in entries {
            if let Err(e) = snapshot.apply_input(live, &entry) {
                error!("failed to apply update for {}:{}: {e}", entry.node_id, entry.input);
            }
        }
        debug!("applied {count} graph update(s) in {:?}", started.elapsed());
        true
    }

    // -- scheduling ---------------------------------------------------------

    /// Drain worker completions and run dispatch passes while one is
    /// requested. Non-blocking; call from the control thread's run loop.
    pub fn pump(&mut self, live: &Graph) {
        loop {
            while let Ok(slot) = self.done_rx.try_recv() {
                self.worker_finished(slot);
            }
            if !self.dispatch_pending {
                break;
            }
            self.dispatch_pending = false;
            self.dispatch_pass(live);
        }
    }

    /// Like [`RenderBackend::pump`] but blocks until the queue is empty and
    /// every slot is idle (or no further progress is possible).
    pub fn wait_idle(&mut self, live: &Graph) {
        loop {
            self.pump(live);
            if self.workers.iter().all(|w| !w.busy) {
                if !self.job_queue.is_empty() {
                    warn!(
                        "pool idle with {} undispatched job(s), giving up the wait",
                        self.job_queue.len()
                    );
                }
                return;
            }
            match self.done_rx.recv() {
                Ok(slot) => self.worker_finished(slot),
                Err(_) => return,
            }
        }
    }

    pub fn busy_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.busy).count()
    }

    fn worker_finished(&mut self, slot: usize) {
        if let Some(worker) = self.workers.get_mut(slot) {
            worker.busy = false;
        }
        if self.snapshot.is_some() {
            self.dispatch_pending = true;
        }
    }

    fn dispatch_pass(&mut self, live: &Graph) {
        if self.job_queue.is_empty() {
            return;
        }

        if let Err(e) = self.check_params() {
            debug!("skipping dispatch: {e}");
            return;
        }

        // Snapshot refreshes are serialized against job execution: they only
        // happen when no worker is reading the graph.
        if self.track_graph && !self.update_queue.is_empty() {
            if self.workers.iter().any(|w| w.busy) {
                return;
            }
            if !self.flush_updates(live) {
                return;
            }
        }

        if self.workers.is_empty() {
            self.allocate_workers();
        }

        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        let settings = self.worker_settings();

        for i in 0..self.workers.len() {
            if self.workers[i].busy {
                continue;
            }

            let ticket = loop {
                match self.job_queue.pop_front() {
                    // Cancelled while queued: skip without running.
                    Some(t) if !t.mark_dispatched() => continue,
                    other => break other,
                }
            };
            let Some(ticket) = ticket else {
                break;
            };

            debug!("dispatching {:?} job {} to worker {i}", ticket.kind(), ticket.id());
            self.workers[i].submit(WorkerJob {
                ticket,
                snapshot: Arc::clone(&snapshot),
                settings: settings.clone(),
            });
        }
    }

    fn check_params(&self) -> Result<(), RenderError> {
        if !self.video_params.is_valid() {
            return Err(RenderError::InvalidParams(format!(
                "video {}x{} @ {}",
                self.video_params.width, self.video_params.height, self.video_params.frame_rate
            )));
        }
        if !self.audio_params.is_valid() {
            return Err(RenderError::InvalidParams(format!(
                "audio {} Hz, {} channel(s)",
                self.audio_params.sample_rate, self.audio_params.channels
            )));
        }
        Ok(())
    }

    fn allocate_workers(&mut self) {
        let count = self.worker_count.unwrap_or_else(|| {
            thread::available_parallelism().map(|v| v.get()).unwrap_or(1)
        });
        info!("allocating {count} render worker slot(s)");
        for index in 0..count {
            let worker = (self.factory)();
            self.workers
                .push(WorkerSlot::spawn(index, worker, self.done_tx.clone()));
        }
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            video: self.video_params,
            audio: self.audio_params,
            color_transform: self.color_transform,
            mode: self.render_mode,
            preview_time: self.preview_time,
        }
    }

    fn drain_pool(&mut self) {
        while self.workers.iter().any(|w| w.busy) {
            match self.done_rx.recv() {
                Ok(slot) => {
                    if let Some(worker) = self.workers.get_mut(slot) {
                        worker.busy = false;
                    }
                }
                Err(_) => break,
            }
        }
    }

    // -- helpers ------------------------------------------------------------

    /// Split an audio range into chunk-aligned sub-ranges for separate jobs.
    /// The granularity comes from [`RenderBackend::set_audio_chunk_len`].
    pub fn split_range_into_chunks(&self, range: TimeRange) -> Vec<TimeRange> {
        let chunk = self.audio_chunk_len;
        let start = (range.start.into_inner() / chunk).floor() * chunk;
        let end = (range.end.into_inner() / chunk).ceil() * chunk;

        let mut chunks = Vec::new();
        let mut t = start;
        while t < end {
            chunks.push(TimeRange::new(
                t.max(range.start.into_inner()),
                (t + chunk).min(range.end.into_inner()),
            ));
            t += chunk;
        }
        chunks
    }
}

impl Drop for RenderBackend {
    fn drop(&mut self) {
        self.close();
    }
}
