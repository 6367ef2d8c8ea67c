use serde::{Deserialize, Serialize};

/// A 1D segment to fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub length: f64,
    /// Per-segment seed; the pipeline derives one when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Segment {
    pub fn new(length: f64) -> Self {
        Self { length, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
