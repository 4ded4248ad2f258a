//! Node and input parameter model for the data-flow graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::value::ParamValue;

/// One output port of one node.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
pub struct OutputRef {
    pub node_id: Uuid,
    pub output: String,
}

impl OutputRef {
    pub fn new(node_id: Uuid, output: &str) -> Self {
        Self {
            node_id,
            output: output.to_string(),
        }
    }
}

/// One input parameter of one node. Array sub-inputs carry their own
/// unique input id within the node, so a ref addresses them directly.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
pub struct InputRef {
    pub node_id: Uuid,
    pub input: String,
}

impl InputRef {
    pub fn new(node_id: Uuid, input: &str) -> Self {
        Self {
            node_id,
            input: input.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

/// An input parameter on a node: a value, an optional upstream connection,
/// and for array-typed inputs an ordered list of sub-inputs.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct NodeInput {
    pub id: String,
    pub value: ParamValue,
    pub connection: Option<OutputRef>,
    pub is_array: bool,
    pub sub_inputs: Vec<NodeInput>,
}

impl NodeInput {
    pub fn new(id: &str, value: ParamValue) -> Self {
        Self {
            id: id.to_string(),
            value,
            connection: None,
            is_array: false,
            sub_inputs: Vec::new(),
        }
    }

    pub fn array(id: &str, sub_inputs: Vec<NodeInput>) -> Self {
        Self {
            id: id.to_string(),
            value: ParamValue::default(),
            connection: None,
            is_array: true,
            sub_inputs,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Clone of this input with all connections stripped, recursively.
    pub(crate) fn disconnected_copy(&self) -> NodeInput {
        NodeInput {
            id: self.id.clone(),
            value: self.value.clone(),
            connection: None,
            is_array: self.is_array,
            sub_inputs: self
                .sub_inputs
                .iter()
                .map(NodeInput::disconnected_copy)
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Node {
    pub id: Uuid,
    /// References a node type definition, e.g. "viewer", "effect.blur", "track".
    pub type_id: String,
    pub track_kind: Option<TrackKind>,
    /// Ordered clip references making up a track's timeline. Bulk timeline
    /// contents are never carried by render copies.
    pub blocks: Vec<Uuid>,
    pub inputs: Vec<NodeInput>,
    pub outputs: Vec<String>,
}

impl Node {
    pub fn new(type_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_id: type_id.to_string(),
            track_kind: None,
            blocks: Vec::new(),
            inputs: Vec::new(),
            outputs: vec!["out".to_string()],
        }
    }

    pub fn with_input(mut self, input: NodeInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn is_track(&self) -> bool {
        self.track_kind.is_some() || self.type_id == "track"
    }

    /// Find an input by id, searching array sub-inputs as well.
    pub fn input(&self, id: &str) -> Option<&NodeInput> {
        fn find<'a>(inputs: &'a [NodeInput], id: &str) -> Option<&'a NodeInput> {
            for input in inputs {
                if input.id == id {
                    return Some(input);
                }
                if let Some(found) = find(&input.sub_inputs, id) {
                    return Some(found);
                }
            }
            None
        }
        find(&self.inputs, id)
    }

    pub fn input_mut(&mut self, id: &str) -> Option<&mut NodeInput> {
        fn find<'a>(inputs: &'a mut [NodeInput], id: &str) -> Option<&'a mut NodeInput> {
            for input in inputs {
                if input.id == id {
                    return Some(input);
                }
                if let Some(found) = find(&mut input.sub_inputs, id) {
                    return Some(found);
                }
            }
            None
        }
        find(&mut self.inputs, id)
    }

    /// Flat enumeration of all inputs, including array sub-inputs.
    pub fn inputs_including_arrays(&self) -> Vec<&NodeInput> {
        fn collect<'a>(inputs: &'a [NodeInput], out: &mut Vec<&'a NodeInput>) {
            for input in inputs {
                out.push(input);
                collect(&input.sub_inputs, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.inputs, &mut out);
        out
    }

    /// Structurally independent clone for the render snapshot: same id and
    /// type, parameter values copied, connections stripped. Track kind and
    /// timeline blocks are deliberately not carried over; the snapshot
    /// re-applies the track kind itself after the copy.
    pub fn render_copy(&self) -> Node {
        Node {
            id: self.id,
            type_id: self.type_id.clone(),
            track_kind: None,
            blocks: Vec::new(),
            inputs: self
                .inputs
                .iter()
                .map(NodeInput::disconnected_copy)
                .collect(),
            outputs: self.outputs.clone(),
        }
    }
}
