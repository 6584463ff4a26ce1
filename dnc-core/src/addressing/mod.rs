//! Addressing: turning keys and usage into weightings over locations.
//!
//! - **Content**: cosine similarity against every row, sharpened by
//!   `beta`, softmaxed over N.
//! - **Allocation**: least-used-first preference derived from the usage
//!   vector, one sort per pass.
//!
//! All functions write into caller-owned buffers and never allocate.

pub mod kernel;

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::memory::MemoryMatrix;

pub use kernel::{DefaultKernel, LaneKernel, ScalarKernel, SimilarityKernel};

/// Sums at or below this are treated as an empty weighting.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// In-place numerically stable softmax. No-op on an empty slice.
pub fn softmax_in_place(values: &mut [f32]) {
    let Some(max) = values.iter().copied().reduce(f32::max) else {
        return;
    };
    let mut sum = 0.0_f32;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    let inv = 1.0 / sum;
    for v in values.iter_mut() {
        *v *= inv;
    }
}

/// Softmax of a fixed-size array, returned by value.
#[must_use]
pub fn softmax<const K: usize>(mut logits: [f32; K]) -> [f32; K] {
    softmax_in_place(&mut logits);
    logits
}

/// Logistic sigmoid.
#[inline]
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Floor negatives at zero and rescale to sum to 1.
///
/// Returns `false` (leaving the floored values in place) when the sum is
/// too small to normalise.
pub fn normalize_in_place(weights: &mut [f32]) -> bool {
    let mut sum = 0.0_f32;
    for w in weights.iter_mut() {
        if *w < 0.0 {
            *w = 0.0;
        }
        sum += *w;
    }
    if sum <= NORMALIZE_EPSILON {
        return false;
    }
    let inv = 1.0 / sum;
    for w in weights.iter_mut() {
        *w *= inv;
    }
    true
}

/// Index and value of the largest weight; the first index wins ties.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn argmax(weights: &[f32]) -> Option<(usize, f32)> {
    weights
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, w)| match best {
            Some((_, bw)) if w <= bw => best,
            _ => Some((i, w)),
        })
}

/// Content weighting: `softmax(beta · cos(key, M[i]))` over all locations.
///
/// `out.len()` must equal `memory.locations()`. The result is non-negative
/// and sums to 1; rows or keys with near-zero norm contribute similarity 0.
pub fn content_weighting<K: SimilarityKernel + ?Sized>(
    kernel: &K,
    memory: &MemoryMatrix,
    key: &[f32],
    beta: f32,
    epsilon: f32,
    out: &mut [f32],
) {
    kernel.similarities(memory, key, epsilon, out);
    if beta != 1.0 {
        for w in out.iter_mut() {
            *w *= beta;
        }
    }
    softmax_in_place(out);
}

/// Allocation weighting from usage.
///
/// With locations sorted ascending by usage (ties by index),
/// `a[φ_i] = (1 − u[φ_i]) · Π_{j<i} u[φ_j]`. `order` is scratch space of
/// the same length as `usage`; on return it holds the sorted order.
pub fn allocation_weighting(usage: &[f32], order: &mut [usize], out: &mut [f32]) {
    debug_assert_eq!(usage.len(), order.len());
    debug_assert_eq!(usage.len(), out.len());

    for (i, slot) in order.iter_mut().enumerate() {
        *slot = i;
    }
    // (usage, index) is a total order, so an unstable sort is deterministic
    // and needs no scratch allocation.
    order.sort_unstable_by(|&a, &b| {
        match OrderedFloat(usage[a]).cmp(&OrderedFloat(usage[b])) {
            Ordering::Equal => a.cmp(&b),
            other => other,
        }
    });

    let mut product = 1.0_f32;
    for &idx in order.iter() {
        let u = usage[idx];
        out[idx] = product * (1.0 - u);
        product *= u;
    }
}
