pub mod graph;
pub mod node;
pub mod value;

pub use graph::Graph;
pub use node::{InputRef, Node, NodeInput, OutputRef, TrackKind};
pub use value::{Keyframe, ParamValue};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)` in seconds.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimeRange {
    pub start: OrderedFloat<f64>,
    pub end: OrderedFloat<f64>,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: OrderedFloat(start),
            end: OrderedFloat(end),
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).into_inner()
    }

    pub fn contains(&self, time: OrderedFloat<f64>) -> bool {
        time >= self.start && time < self.end
    }

    pub fn intersects(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}
