//! Change-coalescing queue for live graph edits that have not yet been
//! copied into the snapshot.
//!
//! The queue stays minimal: a change whose subtree will be re-copied anyway
//! by an already-pending entry is dropped, and a new change that covers
//! pending entries removes them. Insertion order of surviving entries is
//! preserved because applying an earlier entry may copy the nodes a later
//! entry targets.

use crate::model::node::InputRef;
use crate::model::Graph;
use crate::rendering::snapshot::Snapshot;

#[derive(Default)]
pub struct UpdateQueue {
    pending: Vec<InputRef>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn entries(&self) -> &[InputRef] {
        &self.pending
    }

    /// Record one changed live input, deduplicating against the pending set.
    pub fn record(&mut self, live: &Graph, snapshot: &Snapshot, source: InputRef) {
        // A node without a counterpart is owed to a copy that is still
        // pending; the change is picked up when that copy happens.
        if !snapshot.contains(source.node_id) {
            debug_assert!(
                !self.pending.is_empty(),
                "change notification for {}:{} but no copy is outstanding",
                source.node_id,
                source.input
            );
            return;
        }

        let mut i = 0;
        while i < self.pending.len() {
            let queued = &self.pending[i];

            if *queued == source {
                return;
            }

            // The changed node feeds a pending input, so re-copying that
            // input's subtree picks this change up as well.
            if live.outputs_to(source.node_id, queued) {
                return;
            }

            // Member of a pending array: copied when the array is.
            if Self::is_sub_input_of(live, queued, &source) {
                return;
            }

            // Symmetric case: the new change covers this pending entry.
            if live.outputs_to(queued.node_id, &source)
                || Self::is_sub_input_of(live, &source, queued)
            {
                self.pending.remove(i);
                continue;
            }

            i += 1;
        }

        self.pending.push(source);
    }

    /// Drain all pending entries in insertion order for application.
    pub fn take_all(&mut self) -> Vec<InputRef> {
        std::mem::take(&mut self.pending)
    }

    fn is_sub_input_of(live: &Graph, array: &InputRef, candidate: &InputRef) -> bool {
        if array.node_id != candidate.node_id {
            return false;
        }
        live.input(array)
            .map(|a| a.is_array && a.sub_inputs.iter().any(|s| s.id == candidate.input))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::model::node::{Node, NodeInput, OutputRef};
    use crate::model::value::ParamValue;
    use crate::rendering::snapshot::{Snapshot, TEXTURE_INPUT};

    struct Fixture {
        live: Graph,
        snapshot: Snapshot,
        upstream: Uuid,
        downstream: Uuid,
        viewer: Uuid,
    }

    fn fixture() -> Fixture {
        // upstream -> downstream -> viewer.texture
        let mut live = Graph::new();
        let upstream = live.add_node(
            Node::new("gen").with_input(NodeInput::new("seed", ParamValue::number(1.0))),
        );
        let downstream = live.add_node(
            Node::new("fx")
                .with_input(NodeInput::new("in", ParamValue::default()))
                .with_input(NodeInput::new("amount", ParamValue::number(0.5)))
                .with_input(NodeInput::array(
                    "layers",
                    vec![
                        NodeInput::new("layers.0", ParamValue::number(0.0)),
                        NodeInput::new("layers.1", ParamValue::number(0.0)),
                    ],
                )),
        );
        let viewer = live.add_node(
            Node::new("viewer").with_input(NodeInput::new(TEXTURE_INPUT, ParamValue::default())),
        );
        live.connect(OutputRef::new(upstream, "out"), &InputRef::new(downstream, "in"))
            .unwrap();
        live.connect(
            OutputRef::new(downstream, "out"),
            &InputRef::new(viewer, TEXTURE_INPUT),
        )
        .unwrap();

        let mut snapshot = Snapshot::new(&live, viewer).unwrap();
        snapshot
            .apply_input(&live, &InputRef::new(viewer, TEXTURE_INPUT))
            .unwrap();

        Fixture {
            live,
            snapshot,
            upstream,
            downstream,
            viewer,
        }
    }

    #[test]
    fn test_duplicate_notification_is_idempotent() {
        let f = fixture();
        let mut queue = UpdateQueue::new();
        let at = InputRef::new(f.downstream, "amount");

        queue.record(&f.live, &f.snapshot, at.clone());
        queue.record(&f.live, &f.snapshot, at.clone());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_upstream_change_absorbed_by_pending_entry() {
        // An entry whose application re-copies the changed node's subtree
        // already covers the change, whichever order they arrive in.
        let f = fixture();
        let mut queue = UpdateQueue::new();
        let fed = InputRef::new(f.viewer, TEXTURE_INPUT);
        let feeding = InputRef::new(f.upstream, "seed");

        queue.record(&f.live, &f.snapshot, fed.clone());
        queue.record(&f.live, &f.snapshot, feeding.clone());
        assert_eq!(queue.entries(), &[fed.clone()]);

        let mut queue = UpdateQueue::new();
        queue.record(&f.live, &f.snapshot, feeding);
        queue.record(&f.live, &f.snapshot, fed.clone());
        assert_eq!(queue.entries(), &[fed]);
    }

    #[test]
    fn test_absorbing_entry_still_produces_both_values() {
        let mut f = fixture();
        let mut queue = UpdateQueue::new();

        let seed = InputRef::new(f.upstream, "seed");
        let texture = InputRef::new(f.viewer, TEXTURE_INPUT);
        f.live.input_mut(&seed).unwrap().value = ParamValue::number(9.0);
        queue.record(&f.live, &f.snapshot, seed.clone());
        // Reconnect-style change on the input fed by the seed's node.
        queue.record(&f.live, &f.snapshot, texture.clone());
        assert_eq!(queue.len(), 1);

        for entry in queue.take_all() {
            f.snapshot.apply_input(&f.live, &entry).unwrap();
        }
        assert_eq!(
            f.snapshot.graph().input(&seed).unwrap().value,
            ParamValue::number(9.0)
        );
    }

    #[test]
    fn test_array_member_covered_by_array_entry() {
        let f = fixture();
        let mut queue = UpdateQueue::new();
        let array = InputRef::new(f.downstream, "layers");
        let member = InputRef::new(f.downstream, "layers.1");

        queue.record(&f.live, &f.snapshot, array.clone());
        queue.record(&f.live, &f.snapshot, member.clone());
        assert_eq!(queue.entries(), &[array.clone()]);

        let mut queue = UpdateQueue::new();
        queue.record(&f.live, &f.snapshot, member);
        queue.record(&f.live, &f.snapshot, array.clone());
        assert_eq!(queue.entries(), &[array]);
    }

    #[test]
    fn test_unrelated_entries_keep_insertion_order() {
        let f = fixture();
        let mut queue = UpdateQueue::new();
        let first = InputRef::new(f.downstream, "amount");
        let second = InputRef::new(f.downstream, "layers");

        queue.record(&f.live, &f.snapshot, first.clone());
        queue.record(&f.live, &f.snapshot, second.clone());
        assert_eq!(queue.take_all(), vec![first, second]);
    }

    #[test]
    fn test_unindexed_node_ignored_while_copy_outstanding() {
        let mut f = fixture();
        let mut queue = UpdateQueue::new();

        // A new node connected to the viewer: the viewer entry is pending,
        // so changes inside the not-yet-copied subtree are ignored.
        let fresh = f.live.add_node(
            Node::new("gen").with_input(NodeInput::new("seed", ParamValue::number(3.0))),
        );
        let texture = InputRef::new(f.viewer, TEXTURE_INPUT);
        f.live
            .connect(OutputRef::new(fresh, "out"), &texture)
            .unwrap();

        queue.record(&f.live, &f.snapshot, texture.clone());
        queue.record(&f.live, &f.snapshot, InputRef::new(fresh, "seed"));
        assert_eq!(queue.entries(), &[texture]);
    }
}
