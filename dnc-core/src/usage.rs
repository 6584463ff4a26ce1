//! Usage tracking and the free list.
//!
//! Each location carries an occupancy score in `[0, 1]`. Writes push it
//! towards 1 (`u ← u + w − u·w`); retention scales it back down. The free
//! list is rebuilt from scratch on every allocation pass.

use crate::addressing::allocation_weighting;

/// Per-location usage plus the derived free list.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    usage: Box<[f32]>,
    free: Box<[usize]>,
    free_len: usize,
    order: Box<[usize]>,
    threshold: f32,
}

impl UsageTracker {
    /// All locations unused and free.
    #[must_use]
    pub fn new(locations: usize, free_threshold: f32) -> Self {
        let mut tracker = Self {
            usage: vec![0.0; locations].into_boxed_slice(),
            free: vec![0; locations].into_boxed_slice(),
            free_len: 0,
            order: vec![0; locations].into_boxed_slice(),
            threshold: free_threshold,
        };
        tracker.reset();
        tracker
    }

    /// Zero usage; every index becomes free.
    pub fn reset(&mut self) {
        self.usage.fill(0.0);
        for (i, slot) in self.free.iter_mut().enumerate() {
            *slot = i;
        }
        self.free_len = self.free.len();
    }

    /// The usage vector.
    #[must_use]
    pub fn usage(&self) -> &[f32] {
        &self.usage
    }

    /// Indices whose usage was below the threshold at the last allocation
    /// pass, ascending.
    #[must_use]
    pub fn free_slots(&self) -> &[usize] {
        &self.free[..self.free_len]
    }

    /// Usage threshold for the free list.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compute the allocation weighting into `out` and rebuild the free list.
    pub fn allocate(&mut self, out: &mut [f32]) {
        allocation_weighting(&self.usage, &mut self.order, out);
        self.refresh_free_list();
    }

    /// Locations ordered by ascending usage at the last allocation pass.
    #[must_use]
    pub fn allocation_order(&self) -> &[usize] {
        &self.order
    }

    fn refresh_free_list(&mut self) {
        self.free_len = 0;
        for (i, &u) in self.usage.iter().enumerate() {
            if u < self.threshold {
                self.free[self.free_len] = i;
                self.free_len += 1;
            }
        }
    }

    /// Apply a write weighting with retention fixed at 1:
    /// `u ← clamp(u + w − u·w, 0, 1)`.
    pub fn record_write(&mut self, write_weights: &[f32]) {
        for (u, &w) in self.usage.iter_mut().zip(write_weights) {
            *u = (*u + w - *u * w).clamp(0.0, 1.0);
        }
    }

    /// Apply a write weighting then scale by per-location retention:
    /// `u ← clamp(u + w − u·w, 0, 1) · ψ`.
    pub fn record_write_with_retention(&mut self, write_weights: &[f32], retention: &[f32]) {
        for ((u, &w), &psi) in self.usage.iter_mut().zip(write_weights).zip(retention) {
            *u = (*u + w - *u * w).clamp(0.0, 1.0) * psi.clamp(0.0, 1.0);
        }
    }

    /// Bytes held by the usage, free-list and sort buffers.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(&*self.usage)
            + std::mem::size_of_val(&*self.free)
            + std::mem::size_of_val(&*self.order)
    }

    /// Overwrite usage from a snapshot, clamping into `[0, 1]`, then rebuild
    /// the free list.
    ///
    /// Returns `false` if the length differs.
    pub fn restore(&mut self, usage: &[f32]) -> bool {
        if usage.len() != self.usage.len() {
            return false;
        }
        for (dst, &src) in self.usage.iter_mut().zip(usage) {
            *dst = src.clamp(0.0, 1.0);
        }
        self.refresh_free_list();
        true
    }
}
