//! Deep copy of the live graph that worker threads read.
//!
//! The snapshot owns every node it creates. Copies keep their live node's
//! id, so the live-to-snapshot index is the snapshot's own node table keyed
//! by live identity; a live node can never have more than one counterpart.

use log::debug;
use uuid::Uuid;

use crate::error::RenderError;
use crate::model::node::{InputRef, OutputRef};
use crate::model::Graph;

/// Input id of the texture-producing root on the viewer node.
pub const TEXTURE_INPUT: &str = "texture";
/// Input id of the audio-producing root on the viewer node.
pub const SAMPLES_INPUT: &str = "samples";

pub struct Snapshot {
    graph: Graph,
    viewer: Uuid,
}

impl Snapshot {
    /// Copy the viewer node itself. The subgraphs behind its texture and
    /// samples inputs are brought in through the update queue, exactly like
    /// any later incremental change.
    pub(crate) fn new(live: &Graph, viewer: Uuid) -> Result<Self, RenderError> {
        let viewer_node = live
            .node(viewer)
            .ok_or_else(|| RenderError::Graph(format!("viewer node {viewer} not found")))?;

        let mut graph = Graph::new();
        let mut copy = viewer_node.render_copy();
        copy.track_kind = viewer_node.track_kind;
        graph.add_node(copy);

        Ok(Self { graph, viewer })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Id of the copied viewer root.
    pub fn viewer(&self) -> Uuid {
        self.viewer
    }

    /// Whether a live node currently has a snapshot counterpart.
    pub fn contains(&self, live_id: Uuid) -> bool {
        self.graph.contains(live_id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.nodes.len()
    }

    /// Apply one pending change: copy the live input's value onto its
    /// counterpart and, when connectivity is involved, rebuild the affected
    /// edge and the subgraph behind it.
    ///
    /// A missing counterpart is a contract violation in the notifier; the
    /// coalescer only admits entries for indexed nodes.
    pub(crate) fn apply_input(&mut self, live: &Graph, source: &InputRef) -> Result<(), RenderError> {
        if !self.graph.contains(source.node_id) {
            debug_assert!(
                false,
                "applying update for {}:{} with no snapshot counterpart",
                source.node_id, source.input
            );
            return Err(RenderError::Graph(format!(
                "no snapshot counterpart for node {}",
                source.node_id
            )));
        }

        let live_input = live
            .input(source)
            .ok_or_else(|| {
                RenderError::Graph(format!("live input {}:{} not found", source.node_id, source.input))
            })?
            .clone();

        self.graph.copy_value_from(source, live, source)?;

        let snap_connected = self
            .graph
            .input(source)
            .map(|i| i.is_connected())
            .unwrap_or(false);

        if live_input.is_connected() || snap_connected {
            // The change came from connecting or disconnecting something.
            // Drop the old edge, release whatever becomes unreachable, then
            // rebuild from the live side.
            self.graph.disconnect(source);
            self.prune_unreachable();
            self.connect_input_from_live(live, source)?;
        }

        if live_input.is_array {
            for sub in &live_input.sub_inputs {
                self.apply_input(live, &InputRef::new(source.node_id, &sub.id))?;
            }
        }

        Ok(())
    }

    /// Recreate the live input's connection on the snapshot side, copying
    /// the connected subgraph as needed.
    fn connect_input_from_live(&mut self, live: &Graph, at: &InputRef) -> Result<(), RenderError> {
        let live_input = live.input(at).ok_or_else(|| {
            RenderError::Graph(format!("live input {}:{} not found", at.node_id, at.input))
        })?;

        if let Some(conn) = live_input.connection.clone() {
            self.ensure_copy(live, conn.node_id)?;
            self.graph
                .connect(OutputRef::new(conn.node_id, &conn.output), at)?;
        }
        Ok(())
    }

    /// Recursively copy a live node and everything upstream of it into the
    /// snapshot. Nodes already indexed are left alone; shared subtrees are
    /// therefore visited once and the recursion terminates on any DAG.
    fn ensure_copy(&mut self, live: &Graph, live_id: Uuid) -> Result<(), RenderError> {
        if self.graph.contains(live_id) {
            return Ok(());
        }

        let live_node = live
            .node(live_id)
            .ok_or_else(|| RenderError::Graph(format!("live node {live_id} not found")))?;

        let mut copy = live_node.render_copy();
        if live_node.is_track() {
            // Bulk timeline copying is skipped for render copies, which loses
            // the track category; re-apply it here.
            copy.track_kind = live_node.track_kind;
        }
        self.graph.add_node(copy);

        for input in live_node.inputs_including_arrays() {
            let at = InputRef::new(live_id, &input.id);
            self.connect_input_from_live(live, &at)?;
        }
        Ok(())
    }

    /// Unindex and release every snapshot node no longer reachable from the
    /// viewer root.
    fn prune_unreachable(&mut self) {
        let keep = self.graph.reachable_from(self.viewer);
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|id, _| keep.contains(id));
        let dropped = before - self.graph.nodes.len();
        if dropped > 0 {
            debug!("released {dropped} unreachable snapshot node(s)");
        }
    }
}
