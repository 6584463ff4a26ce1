//! Shared fixtures for the DNC benchmark suite.

use dnc_core::memory::MemoryMatrix;
use dnc_core::{Dnc, DncConfig, LstmController};

/// A `locations × width` matrix filled with a deterministic, non-degenerate pattern.
#[must_use]
pub fn patterned_memory(locations: usize, width: usize) -> MemoryMatrix {
    let mut memory = MemoryMatrix::new(locations, width);
    for loc in 0..locations {
        for (i, v) in memory.row_mut(loc).iter_mut().enumerate() {
            *v = ((loc * width + i) as f32 * 0.37).sin();
        }
    }
    memory
}

/// A key of `width` floats.
#[must_use]
pub fn key(width: usize) -> Vec<f32> {
    (0..width).map(|i| (i as f32 * 0.91).cos()).collect()
}

/// An LSTM-driven engine at the given size, warmed up by a few steps.
///
/// # Panics
/// Panics if the dimensions exceed the engine's static limits.
#[must_use]
pub fn warm_engine(heads: usize, locations: usize, width: usize) -> Dnc<LstmController> {
    let config = DncConfig::with_dimensions(8, 16, heads, locations, width);
    let mut dnc = Dnc::with_lstm(config).expect("benchmark dimensions are valid");
    for t in 0..4 {
        dnc.step(&[t as f32 * 0.1; 8]).expect("input is 8 wide");
    }
    dnc
}
