//! Metric data model

use serde::{Deserialize, Serialize};

/// A single time-series sample
///
/// `value`, `score` and `average` are stored independently; no relation
/// between them is enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Time series identifier
    pub name: String,
    /// Sample time, seconds since the Unix epoch
    pub stamp: u32,
    pub value: f64,
    pub score: f64,
    pub average: f64,
}

impl Metric {
    pub fn new(name: impl Into<String>, stamp: u32, value: f64, score: f64, average: f64) -> Self {
        Self {
            name: name.into(),
            stamp,
            value,
            score,
            average,
        }
    }
}
