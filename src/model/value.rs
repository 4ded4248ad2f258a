use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A single keyframe on an animated parameter.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Keyframe {
    pub time: OrderedFloat<f64>,
    pub value: OrderedFloat<f64>,
}

impl Keyframe {
    pub fn new(time: f64, value: f64) -> Self {
        Self {
            time: OrderedFloat(time),
            value: OrderedFloat(value),
        }
    }
}

/// Value stored on a node input parameter.
///
/// Either a plain scalar or a keyframed curve. Connections are not values;
/// they live on the input itself.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
#[serde(untagged)]
pub enum ParamValue {
    // Integer before Number so untagged deserialization keeps integers.
    Integer(i64),
    Number(OrderedFloat<f64>),
    Boolean(bool),
    Text(String),
    Keyframes(Vec<Keyframe>),
}

impl ParamValue {
    pub fn number(v: f64) -> Self {
        ParamValue::Number(OrderedFloat(v))
    }
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Number(OrderedFloat(0.0))
    }
}
