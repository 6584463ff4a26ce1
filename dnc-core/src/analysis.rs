//! Read-only memory diagnostics.

use serde::{Deserialize, Serialize};

use crate::addressing::SimilarityKernel;
use crate::addressing::argmax;
use crate::linkage::TemporalLinkage;
use crate::memory::MemoryMatrix;
use crate::usage::UsageTracker;

/// A summary of how memory is being used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAnalysis {
    /// Mean usage over all locations.
    pub average_usage: f32,
    /// Population standard deviation of usage.
    pub fragmentation_score: f32,
    /// Location with the highest usage; the lowest index wins ties.
    pub most_accessed_slot: usize,
    /// Size of the free list at the last allocation pass.
    pub free_slots: usize,
    /// Oldest location still in the write history.
    pub oldest_memory_slot: Option<usize>,
    /// Mean cosine similarity between the contents of consecutively
    /// recorded write locations. 0 with fewer than two recorded writes.
    pub temporal_coherence: f32,
    /// `1 −` mean pairwise cosine similarity among occupied rows. 0 with
    /// fewer than two occupied rows.
    pub content_diversity: f32,
}

/// Compute a [`MemoryAnalysis`] without touching any state.
pub fn analyze<K: SimilarityKernel + ?Sized>(
    kernel: &K,
    memory: &MemoryMatrix,
    usage: &UsageTracker,
    linkage: &TemporalLinkage,
    epsilon: f32,
) -> MemoryAnalysis {
    let u = usage.usage();
    let n = u.len().max(1) as f32;
    let average_usage = u.iter().sum::<f32>() / n;
    let variance = u
        .iter()
        .map(|&x| (x - average_usage) * (x - average_usage))
        .sum::<f32>()
        / n;

    MemoryAnalysis {
        average_usage,
        fragmentation_score: variance.sqrt(),
        most_accessed_slot: argmax(u).map_or(0, |(i, _)| i),
        free_slots: usage.free_slots().len(),
        oldest_memory_slot: linkage.oldest(),
        temporal_coherence: temporal_coherence(kernel, memory, linkage, epsilon),
        content_diversity: content_diversity(kernel, memory, usage, epsilon),
    }
}

fn temporal_coherence<K: SimilarityKernel + ?Sized>(
    kernel: &K,
    memory: &MemoryMatrix,
    linkage: &TemporalLinkage,
    epsilon: f32,
) -> f32 {
    let mut previous = None;
    let mut total = 0.0_f32;
    let mut pairs = 0_u32;
    for slot in linkage.chronological_writes() {
        if let Some(prev) = previous {
            total += kernel.cosine(memory.row(prev), memory.row(slot), epsilon);
            pairs += 1;
        }
        previous = Some(slot);
    }
    if pairs == 0 { 0.0 } else { total / pairs as f32 }
}

fn content_diversity<K: SimilarityKernel + ?Sized>(
    kernel: &K,
    memory: &MemoryMatrix,
    usage: &UsageTracker,
    epsilon: f32,
) -> f32 {
    let threshold = usage.threshold();
    let occupied = |i: &usize| usage.usage()[*i] >= threshold;

    let mut total = 0.0_f32;
    let mut pairs = 0_u32;
    for a in (0..memory.locations()).filter(occupied) {
        for b in (a + 1..memory.locations()).filter(occupied) {
            total += kernel.cosine(memory.row(a), memory.row(b), epsilon);
            pairs += 1;
        }
    }
    if pairs == 0 { 0.0 } else { 1.0 - total / pairs as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::ScalarKernel;

    fn fixture() -> (MemoryMatrix, UsageTracker, TemporalLinkage) {
        let mut memory = MemoryMatrix::new(4, 2);
        memory.row_mut(0).copy_from_slice(&[1.0, 0.0]);
        memory.row_mut(1).copy_from_slice(&[1.0, 0.0]);
        memory.row_mut(2).copy_from_slice(&[0.0, 1.0]);
        (memory, UsageTracker::new(4, 0.1), TemporalLinkage::new(4, 4, 0.1))
    }

    #[test]
    fn empty_state_reports_defaults() {
        let (memory, usage, linkage) = fixture();
        let a = analyze(&ScalarKernel, &memory, &usage, &linkage, 1e-6);
        assert_eq!(a.average_usage, 0.0);
        assert_eq!(a.fragmentation_score, 0.0);
        assert_eq!(a.most_accessed_slot, 0);
        assert_eq!(a.free_slots, 4);
        assert_eq!(a.oldest_memory_slot, None);
        assert_eq!(a.temporal_coherence, 0.0);
        assert_eq!(a.content_diversity, 0.0);
    }

    #[test]
    fn usage_statistics() {
        let (memory, mut usage, linkage) = fixture();
        usage.record_write(&[0.0, 1.0, 0.0, 1.0]);
        let a = analyze(&ScalarKernel, &memory, &usage, &linkage, 1e-6);
        assert!((a.average_usage - 0.5).abs() < 1e-6);
        assert!((a.fragmentation_score - 0.5).abs() < 1e-6);
        assert_eq!(a.most_accessed_slot, 1);
    }

    #[test]
    fn coherence_and_diversity() {
        let (memory, mut usage, mut linkage) = fixture();
        usage.record_write(&[1.0, 1.0, 1.0, 0.0]);
        for slot in [0, 1, 2] {
            let mut w = [0.0; 4];
            w[slot] = 1.0;
            linkage.update(&w);
        }
        let a = analyze(&ScalarKernel, &memory, &usage, &linkage, 1e-6);
        assert_eq!(a.oldest_memory_slot, Some(0));
        // cos(r0, r1) = 1, cos(r1, r2) = 0
        assert!((a.temporal_coherence - 0.5).abs() < 1e-6);
        // pairs (0,1)=1, (0,2)=0, (1,2)=0
        assert!((a.content_diversity - (1.0 - 1.0 / 3.0)).abs() < 1e-6);
    }
}
