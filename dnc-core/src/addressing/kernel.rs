//! Similarity kernels: cosine similarity of one key against every location.
//!
//! This is the hottest loop in the engine, run once per head per step.
//! Two strategies share one trait:
//!
//! - [`ScalarKernel`]: straight-line reference implementation.
//! - [`LaneKernel`]: accumulates in `SIMD_WIDTH`-wide lane arrays so the
//!   compiler can emit whatever vector instructions the target has. No
//!   instruction set is named in the source.
//!
//! [`DefaultKernel`] picks one at build time via the `simd` feature.

use crate::memory::{MemoryMatrix, SIMD_WIDTH};

/// Batched cosine similarity against a memory matrix.
pub trait SimilarityKernel {
    /// Short name used in logs and benchmark labels.
    fn name(&self) -> &'static str;

    /// Cosine similarity of `a` and `b`, or `0.0` if either norm is below
    /// `epsilon`.
    fn cosine(&self, a: &[f32], b: &[f32], epsilon: f32) -> f32;

    /// Write the similarity of `key` against every location into `out`.
    ///
    /// `out.len()` must equal `memory.locations()`.
    fn similarities(&self, memory: &MemoryMatrix, key: &[f32], epsilon: f32, out: &mut [f32]) {
        debug_assert_eq!(out.len(), memory.locations());
        for (slot, row) in out.iter_mut().zip(memory.rows()) {
            *slot = self.cosine(row, key, epsilon);
        }
    }
}

/// Reduce accumulated dot product and squared norms to a similarity.
#[inline]
fn finish(dot: f32, norm_a_sq: f32, norm_b_sq: f32, epsilon: f32) -> f32 {
    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();
    let denom = norm_a * norm_b;
    if norm_a < epsilon || norm_b < epsilon || denom < epsilon {
        return 0.0;
    }
    dot / denom
}

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// One accumulator per quantity, one element at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl SimilarityKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn cosine(&self, a: &[f32], b: &[f32], epsilon: f32) -> f32 {
        let mut dot = 0.0_f32;
        let mut norm_a = 0.0_f32;
        let mut norm_b = 0.0_f32;
        for (&x, &y) in a.iter().zip(b) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        finish(dot, norm_a, norm_b, epsilon)
    }
}

// ---------------------------------------------------------------------------
// Lane-batched
// ---------------------------------------------------------------------------

/// `SIMD_WIDTH` independent accumulators per quantity, summed at the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaneKernel;

type Lanes = [f32; SIMD_WIDTH];

#[inline]
fn lane_sum(lanes: &Lanes) -> f32 {
    lanes.iter().sum()
}

/// Dot product and both squared norms over full lanes, plus the tail.
#[inline]
fn lane_moments(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let mut dot: Lanes = [0.0; SIMD_WIDTH];
    let mut norm_a: Lanes = [0.0; SIMD_WIDTH];
    let mut norm_b: Lanes = [0.0; SIMD_WIDTH];

    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let a_chunks = a.chunks_exact(SIMD_WIDTH);
    let b_chunks = b.chunks_exact(SIMD_WIDTH);
    let a_tail = a_chunks.remainder();
    let b_tail = b_chunks.remainder();

    for (ca, cb) in a_chunks.zip(b_chunks) {
        for lane in 0..SIMD_WIDTH {
            dot[lane] += ca[lane] * cb[lane];
            norm_a[lane] += ca[lane] * ca[lane];
            norm_b[lane] += cb[lane] * cb[lane];
        }
    }

    let mut d = lane_sum(&dot);
    let mut na = lane_sum(&norm_a);
    let mut nb = lane_sum(&norm_b);
    for (&x, &y) in a_tail.iter().zip(b_tail) {
        d += x * y;
        na += x * x;
        nb += y * y;
    }
    (d, na, nb)
}

/// Dot product of `row` and `key` plus the squared norm of `row`.
#[inline]
fn lane_dot_and_row_norm(row: &[f32], key: &[f32]) -> (f32, f32) {
    let mut dot: Lanes = [0.0; SIMD_WIDTH];
    let mut norm: Lanes = [0.0; SIMD_WIDTH];

    let len = row.len().min(key.len());
    let (row, key) = (&row[..len], &key[..len]);
    let r_chunks = row.chunks_exact(SIMD_WIDTH);
    let k_chunks = key.chunks_exact(SIMD_WIDTH);
    let r_tail = r_chunks.remainder();
    let k_tail = k_chunks.remainder();

    for (cr, ck) in r_chunks.zip(k_chunks) {
        for lane in 0..SIMD_WIDTH {
            dot[lane] += cr[lane] * ck[lane];
            norm[lane] += cr[lane] * cr[lane];
        }
    }

    let mut d = lane_sum(&dot);
    let mut n = lane_sum(&norm);
    for (&x, &y) in r_tail.iter().zip(k_tail) {
        d += x * y;
        n += x * x;
    }
    (d, n)
}

impl SimilarityKernel for LaneKernel {
    fn name(&self) -> &'static str {
        "lane"
    }

    fn cosine(&self, a: &[f32], b: &[f32], epsilon: f32) -> f32 {
        let (dot, na, nb) = lane_moments(a, b);
        finish(dot, na, nb, epsilon)
    }

    fn similarities(&self, memory: &MemoryMatrix, key: &[f32], epsilon: f32, out: &mut [f32]) {
        debug_assert_eq!(out.len(), memory.locations());
        // The key norm is shared by every location.
        let (_, key_norm_sq, _) = lane_moments(key, key);
        for (slot, row) in out.iter_mut().zip(memory.rows()) {
            let (dot, row_norm_sq) = lane_dot_and_row_norm(row, key);
            *slot = finish(dot, row_norm_sq, key_norm_sq, epsilon);
        }
    }
}

// ---------------------------------------------------------------------------
// Build-time selection
// ---------------------------------------------------------------------------

/// The kernel used when none is specified.
#[cfg(feature = "simd")]
pub type DefaultKernel = LaneKernel;

/// The kernel used when none is specified.
#[cfg(not(feature = "simd"))]
pub type DefaultKernel = ScalarKernel;
