//! A small library of ready-made cells.
//!
//! Each kind of cell comes with its state type, its effect type and a constructor that binds a
//! topic to a new [Cell][crate::Cell]. Models are free to build their own cells from scratch; these
//! cover the common cases.

pub mod counter;
pub mod history;
pub mod polynomial;
pub mod register;
pub mod stopwatch;

pub use counter::counter;
pub use history::history;
pub use polynomial::{Linear, LinearEffect, linear};
pub use register::{Register, RegisterEffect, RegisterTrait, register};
pub use stopwatch::{Stopwatch, StopwatchCommand, stopwatch};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resource value, as it appears in profiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    List(Vec<SerializedValue>),
    Map(BTreeMap<String, SerializedValue>),
}

impl From<bool> for SerializedValue {
    fn from(value: bool) -> Self {
        SerializedValue::Bool(value)
    }
}

impl From<i64> for SerializedValue {
    fn from(value: i64) -> Self {
        SerializedValue::Int(value)
    }
}

impl From<f64> for SerializedValue {
    fn from(value: f64) -> Self {
        SerializedValue::Real(value)
    }
}

impl From<String> for SerializedValue {
    fn from(value: String) -> Self {
        SerializedValue::Text(value)
    }
}

impl From<&str> for SerializedValue {
    fn from(value: &str) -> Self {
        SerializedValue::Text(value.to_string())
    }
}

impl<T: Into<SerializedValue>> From<Vec<T>> for SerializedValue {
    fn from(value: Vec<T>) -> Self {
        SerializedValue::List(value.into_iter().map(Into::into).collect())
    }
}
