//! Plain-data capture of an engine's memory state.
//!
//! A [`MemorySnapshot`] holds everything that persists between steps
//! except the controller, which is opaque to the engine. It derives serde
//! so callers pick the encoding; the memory matrix is stored exactly as
//! the engine holds it (flat, stride-padded).

use serde::{Deserialize, Serialize};

use crate::error::{DncError, Result};

/// Persisted memory state of one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Number of locations (N).
    pub locations: usize,
    /// Vector width (M).
    pub width: usize,
    /// Row stride of `memory`.
    pub stride: usize,
    /// Flat, stride-padded memory matrix, `locations × stride`.
    pub memory: Vec<f32>,
    /// Usage vector, `N`.
    pub usage: Vec<f32>,
    /// Precedence weighting, `N`.
    pub precedence: Vec<f32>,
    /// Write history, oldest first.
    pub history: Vec<usize>,
    /// Dominant writes ever recorded, including ones no longer retained.
    pub history_total: u64,
    /// Each read head's location weighting, `R × N`.
    pub read_weightings: Vec<Vec<f32>>,
    /// Each read head's last read vector, `R × M`.
    pub read_vectors: Vec<Vec<f32>>,
    /// Steps taken when the snapshot was captured.
    pub step_count: u64,
}

impl MemorySnapshot {
    /// Check that this snapshot fits an engine of the given shape.
    ///
    /// # Errors
    /// Returns `DncError::SnapshotShape` naming the first mismatching field.
    pub fn check_shape(&self, locations: usize, width: usize, stride: usize, heads: usize) -> Result<()> {
        let mismatch = |field: &str, expected: usize, actual: usize| {
            Err(DncError::SnapshotShape(format!(
                "{field}: expected {expected}, got {actual}"
            )))
        };
        if self.locations != locations {
            return mismatch("locations", locations, self.locations);
        }
        if self.width != width {
            return mismatch("width", width, self.width);
        }
        if self.stride != stride {
            return mismatch("stride", stride, self.stride);
        }
        if self.memory.len() != locations * stride {
            return mismatch("memory", locations * stride, self.memory.len());
        }
        if self.usage.len() != locations {
            return mismatch("usage", locations, self.usage.len());
        }
        if self.precedence.len() != locations {
            return mismatch("precedence", locations, self.precedence.len());
        }
        if let Some(&slot) = self.history.iter().find(|&&s| s >= locations) {
            return Err(DncError::SnapshotShape(format!(
                "history: slot {slot} out of range for {locations} locations"
            )));
        }
        if self.read_weightings.len() != heads {
            return mismatch("read_weightings", heads, self.read_weightings.len());
        }
        if self.read_vectors.len() != heads {
            return mismatch("read_vectors", heads, self.read_vectors.len());
        }
        for w in &self.read_weightings {
            if w.len() != locations {
                return mismatch("read_weightings[..]", locations, w.len());
            }
        }
        for r in &self.read_vectors {
            if r.len() != width {
                return mismatch("read_vectors[..]", width, r.len());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MemorySnapshot {
        MemorySnapshot {
            locations: 2,
            width: 3,
            stride: 8,
            memory: vec![0.0; 16],
            usage: vec![0.0, 0.5],
            precedence: vec![0.0, 1.0],
            history: vec![1],
            history_total: 1,
            read_weightings: vec![vec![0.5, 0.5]],
            read_vectors: vec![vec![0.0; 3]],
            step_count: 1,
        }
    }

    #[test]
    fn matching_shape_passes() {
        assert!(snapshot().check_shape(2, 3, 8, 1).is_ok());
    }

    #[test]
    fn mismatches_are_named() {
        let err = snapshot().check_shape(4, 3, 8, 1).expect_err("locations differ");
        assert!(err.to_string().contains("locations"));

        let mut bad = snapshot();
        bad.history.push(5);
        let err = bad.check_shape(2, 3, 8, 1).expect_err("history out of range");
        assert!(err.to_string().contains("history"));

        let err = snapshot().check_shape(2, 3, 8, 2).expect_err("head count differs");
        assert!(err.to_string().contains("read_weightings"));
    }

    #[test]
    fn serializes_through_json() {
        let snap = snapshot();
        let json = serde_json::to_string(&snap).expect("serialize");
        let back: MemorySnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, snap);
    }
}
