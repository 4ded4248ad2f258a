//! Graph container and the analysis/edit operations the render scheduler
//! relies on: connectivity edits, value copying between graphs, transitive
//! "outputs-to" queries and reachability for snapshot pruning.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RenderError;
use crate::model::node::{InputRef, Node, NodeInput, OutputRef};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Graph {
    pub nodes: HashMap<Uuid, Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> Uuid {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: Uuid) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn remove_node(&mut self, id: Uuid) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn input(&self, at: &InputRef) -> Option<&NodeInput> {
        self.node(at.node_id).and_then(|n| n.input(&at.input))
    }

    pub fn input_mut(&mut self, at: &InputRef) -> Option<&mut NodeInput> {
        self.node_mut(at.node_id).and_then(|n| n.input_mut(&at.input))
    }

    /// Connect a node output to an input. Both ends must exist.
    pub fn connect(&mut self, from: OutputRef, to: &InputRef) -> Result<(), RenderError> {
        let source = self
            .node(from.node_id)
            .ok_or_else(|| RenderError::Graph(format!("source node {} not found", from.node_id)))?;
        if !source.outputs.iter().any(|o| *o == from.output) {
            return Err(RenderError::Graph(format!(
                "node {} has no output '{}'",
                from.node_id, from.output
            )));
        }
        let input = self
            .input_mut(to)
            .ok_or_else(|| RenderError::Graph(format!("input {}:{} not found", to.node_id, to.input)))?;
        input.connection = Some(from);
        Ok(())
    }

    pub fn disconnect(&mut self, at: &InputRef) {
        if let Some(input) = self.input_mut(at) {
            input.connection = None;
        }
    }

    /// Copy one input's value from another graph, leaving connections alone.
    ///
    /// For array inputs the sub-input list is synchronized with the source
    /// structurally (additions and removals), so that a following recursion
    /// over the source's sub-inputs finds a counterpart for each one.
    pub fn copy_value_from(&mut self, at: &InputRef, src_graph: &Graph, src: &InputRef) -> Result<(), RenderError> {
        let src_input = src_graph
            .input(src)
            .ok_or_else(|| RenderError::Graph(format!("input {}:{} not found", src.node_id, src.input)))?
            .clone();
        let dst_input = self
            .input_mut(at)
            .ok_or_else(|| RenderError::Graph(format!("input {}:{} not found", at.node_id, at.input)))?;

        dst_input.value = src_input.value.clone();
        dst_input.is_array = src_input.is_array;
        if src_input.is_array {
            let mut synced = Vec::with_capacity(src_input.sub_inputs.len());
            for sub in &src_input.sub_inputs {
                let existing = dst_input.sub_inputs.iter().find(|d| d.id == sub.id);
                synced.push(match existing {
                    Some(found) => found.clone(),
                    None => sub.disconnected_copy(),
                });
            }
            dst_input.sub_inputs = synced;
        }
        Ok(())
    }

    /// Whether `from_node`'s output transitively feeds the `target` input.
    ///
    /// This is the dependency relation the update coalescer uses to decide
    /// which pending entries subsume which.
    pub fn outputs_to(&self, from_node: Uuid, target: &InputRef) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from_node];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for node in self.nodes.values() {
                for input in node.inputs_including_arrays() {
                    let Some(conn) = &input.connection else {
                        continue;
                    };
                    if conn.node_id != current {
                        continue;
                    }
                    if node.id == target.node_id && input.id == target.input {
                        return true;
                    }
                    stack.push(node.id);
                }
            }
        }
        false
    }

    pub fn load(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    pub fn save(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// All nodes reachable by following input connections upstream from `root`,
    /// including `root` itself.
    pub fn reachable_from(&self, root: Uuid) -> HashSet<Uuid> {
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.node(current) else {
                continue;
            };
            for input in node.inputs_including_arrays() {
                if let Some(conn) = &input.connection {
                    stack.push(conn.node_id);
                }
            }
        }
        seen
    }
}
