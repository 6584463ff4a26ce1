//! Read and write heads.
//!
//! A head owns its parameter buffers (overwritten from the interface each
//! step) and its weightings. Only a read head's location weighting
//! survives from one step to the next.

use crate::addressing::{SimilarityKernel, content_weighting, normalize_in_place};
use crate::interface::{InterfaceView, READ_GATE_LEN, READ_SHIFT_LEN, WRITE_GATE_LEN};
use crate::memory::MemoryMatrix;
use crate::usage::UsageTracker;

/// Borrowed read-head parameters, for driving a head directly.
#[derive(Debug, Clone, Copy)]
pub struct ReadParams<'a> {
    /// Lookup key, `M` wide.
    pub key: &'a [f32],
    /// Sharpness, `>= 1`.
    pub beta: f32,
    /// `[previous, content, unused]` blend.
    pub gate: [f32; READ_GATE_LEN],
}

/// Borrowed write-head parameters, for driving a head directly.
#[derive(Debug, Clone, Copy)]
pub struct WriteParams<'a> {
    /// Lookup key, `M` wide.
    pub key: &'a [f32],
    /// Sharpness, `>= 1`.
    pub beta: f32,
    /// `[content, allocation]` blend.
    pub gate: [f32; WRITE_GATE_LEN],
    /// Vector to write, `M` wide.
    pub vector: &'a [f32],
    /// Erase vector in `[0, 1]`, `M` wide.
    pub erase: &'a [f32],
}

// ---------------------------------------------------------------------------
// Read head
// ---------------------------------------------------------------------------

/// One read head.
#[derive(Debug, Clone)]
pub struct ReadHead {
    index: usize,
    key: Box<[f32]>,
    beta: f32,
    gate: [f32; READ_GATE_LEN],
    shift: [f32; READ_SHIFT_LEN],
    content_weighting: Box<[f32]>,
    weighting: Box<[f32]>,
    read_vector: Box<[f32]>,
}

impl ReadHead {
    /// A head with uniform location weighting and a zero read vector.
    #[must_use]
    pub fn new(index: usize, locations: usize, width: usize) -> Self {
        let mut head = Self {
            index,
            key: vec![0.0; width].into_boxed_slice(),
            beta: 1.0,
            gate: [0.0; READ_GATE_LEN],
            shift: [0.0; READ_SHIFT_LEN],
            content_weighting: vec![0.0; locations].into_boxed_slice(),
            weighting: vec![0.0; locations].into_boxed_slice(),
            read_vector: vec![0.0; width].into_boxed_slice(),
        };
        head.reset();
        head
    }

    /// Restore the uniform weighting and clear the read vector.
    pub fn reset(&mut self) {
        self.fill_uniform();
        self.content_weighting.fill(0.0);
        self.read_vector.fill(0.0);
    }

    fn fill_uniform(&mut self) {
        let uniform = 1.0 / self.weighting.len() as f32;
        self.weighting.fill(uniform);
    }

    /// Overwrite this head's parameters from the interface.
    pub fn load(&mut self, view: &InterfaceView<'_>) {
        self.key.copy_from_slice(view.read_key(self.index));
        self.beta = view.read_strength(self.index);
        self.gate = view.read_gate(self.index);
        self.shift = view.read_shift(self.index);
    }

    /// Overwrite this head's parameters directly.
    ///
    /// # Panics
    /// Panics if `params.key` is not `M` wide.
    pub fn set_params(&mut self, params: ReadParams<'_>) {
        self.key.copy_from_slice(params.key);
        self.beta = params.beta;
        self.gate = params.gate;
    }

    /// Blend content addressing into the persisted weighting:
    /// `w ← normalize(max(0, g₀·w + g₁·c))`.
    ///
    /// Falls back to the uniform weighting if the blend has no mass.
    pub fn address<K: SimilarityKernel + ?Sized>(
        &mut self,
        kernel: &K,
        memory: &MemoryMatrix,
        similarity_epsilon: f32,
    ) {
        content_weighting(
            kernel,
            memory,
            &self.key,
            self.beta,
            similarity_epsilon,
            &mut self.content_weighting,
        );
        let [previous, content, _] = self.gate;
        for (w, &c) in self.weighting.iter_mut().zip(self.content_weighting.iter()) {
            *w = previous * *w + content * c;
        }
        if !normalize_in_place(&mut self.weighting) {
            self.fill_uniform();
        }
    }

    /// `r = Σ_i w_i · M[i]`, skipping weights below `skip_epsilon`.
    pub fn read(&mut self, memory: &MemoryMatrix, skip_epsilon: f32) {
        self.read_vector.fill(0.0);
        for (loc, &w) in self.weighting.iter().enumerate() {
            if w < skip_epsilon {
                continue;
            }
            memory.accumulate_row(loc, w, &mut self.read_vector);
        }
    }

    /// Head index within the engine.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current key.
    #[must_use]
    pub fn key(&self) -> &[f32] {
        &self.key
    }

    /// Current sharpness.
    #[must_use]
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Current gate.
    #[must_use]
    pub fn gate(&self) -> [f32; READ_GATE_LEN] {
        self.gate
    }

    /// Current shift weighting (parsed, not applied).
    #[must_use]
    pub fn shift(&self) -> [f32; READ_SHIFT_LEN] {
        self.shift
    }

    /// Content weighting from the last addressing pass.
    #[must_use]
    pub fn content_weighting(&self) -> &[f32] {
        &self.content_weighting
    }

    /// Location weighting; persists across steps.
    #[must_use]
    pub fn weighting(&self) -> &[f32] {
        &self.weighting
    }

    /// Replace the location weighting.
    ///
    /// # Panics
    /// Panics if `weights` is not `N` long.
    pub fn set_weighting(&mut self, weights: &[f32]) {
        self.weighting.copy_from_slice(weights);
    }

    /// Read vector from the last read.
    #[must_use]
    pub fn read_vector(&self) -> &[f32] {
        &self.read_vector
    }

    /// Overwrite the persisted weighting and read vector.
    pub(crate) fn restore(&mut self, weighting: &[f32], read_vector: &[f32]) {
        self.weighting.copy_from_slice(weighting);
        self.read_vector.copy_from_slice(read_vector);
        self.content_weighting.fill(0.0);
    }

    /// Bytes held by this head's buffers.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<f32>()
            * (self.key.len()
                + self.content_weighting.len()
                + self.weighting.len()
                + self.read_vector.len())
    }
}

// ---------------------------------------------------------------------------
// Write head
// ---------------------------------------------------------------------------

/// The write head.
#[derive(Debug, Clone)]
pub struct WriteHead {
    key: Box<[f32]>,
    beta: f32,
    gate: [f32; WRITE_GATE_LEN],
    vector: Box<[f32]>,
    erase: Box<[f32]>,
    content_weighting: Box<[f32]>,
    allocation_weighting: Box<[f32]>,
    weighting: Box<[f32]>,
}

impl WriteHead {
    /// A head with zeroed parameters and weightings.
    #[must_use]
    pub fn new(locations: usize, width: usize) -> Self {
        Self {
            key: vec![0.0; width].into_boxed_slice(),
            beta: 1.0,
            gate: [0.0; WRITE_GATE_LEN],
            vector: vec![0.0; width].into_boxed_slice(),
            erase: vec![0.0; width].into_boxed_slice(),
            content_weighting: vec![0.0; locations].into_boxed_slice(),
            allocation_weighting: vec![0.0; locations].into_boxed_slice(),
            weighting: vec![0.0; locations].into_boxed_slice(),
        }
    }

    /// Zero all weightings.
    pub fn reset(&mut self) {
        self.content_weighting.fill(0.0);
        self.allocation_weighting.fill(0.0);
        self.weighting.fill(0.0);
    }

    /// Overwrite parameters from the interface.
    pub fn load(&mut self, view: &InterfaceView<'_>) {
        self.key.copy_from_slice(view.write_key());
        self.beta = view.write_strength();
        self.gate = view.write_gate();
        self.vector.copy_from_slice(view.write_vector());
        view.erase_into(&mut self.erase);
    }

    /// Overwrite parameters directly.
    ///
    /// # Panics
    /// Panics if any vector is not `M` wide.
    pub fn set_params(&mut self, params: WriteParams<'_>) {
        self.key.copy_from_slice(params.key);
        self.beta = params.beta;
        self.gate = params.gate;
        self.vector.copy_from_slice(params.vector);
        self.erase.copy_from_slice(params.erase);
    }

    /// Compute `w = g₀·content + g₁·allocation`.
    ///
    /// Runs an allocation pass on `usage`, which also rebuilds its free list.
    pub fn address<K: SimilarityKernel + ?Sized>(
        &mut self,
        kernel: &K,
        memory: &MemoryMatrix,
        usage: &mut UsageTracker,
        similarity_epsilon: f32,
    ) {
        content_weighting(
            kernel,
            memory,
            &self.key,
            self.beta,
            similarity_epsilon,
            &mut self.content_weighting,
        );
        usage.allocate(&mut self.allocation_weighting);
        let [content, allocation] = self.gate;
        for ((w, &c), &a) in self
            .weighting
            .iter_mut()
            .zip(self.content_weighting.iter())
            .zip(self.allocation_weighting.iter())
        {
            *w = content * c + allocation * a;
        }
    }

    /// Erase-then-write every location whose weight is at least `skip_epsilon`.
    pub fn write(&self, memory: &mut MemoryMatrix, skip_epsilon: f32) {
        for (loc, &w) in self.weighting.iter().enumerate() {
            if w < skip_epsilon {
                continue;
            }
            memory.erase_write(loc, w, &self.erase, &self.vector);
        }
    }

    /// Replace the write weighting, bypassing addressing.
    ///
    /// # Panics
    /// Panics if `weights` is not `N` long.
    pub fn set_weighting(&mut self, weights: &[f32]) {
        self.weighting.copy_from_slice(weights);
    }

    /// Current sharpness.
    #[must_use]
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Current `[content, allocation]` gate.
    #[must_use]
    pub fn gate(&self) -> [f32; WRITE_GATE_LEN] {
        self.gate
    }

    /// Current key.
    #[must_use]
    pub fn key(&self) -> &[f32] {
        &self.key
    }

    /// Current write vector.
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Current erase vector.
    #[must_use]
    pub fn erase(&self) -> &[f32] {
        &self.erase
    }

    /// Content weighting from the last addressing pass.
    #[must_use]
    pub fn content_weighting(&self) -> &[f32] {
        &self.content_weighting
    }

    /// Allocation weighting from the last addressing pass.
    #[must_use]
    pub fn allocation_weighting(&self) -> &[f32] {
        &self.allocation_weighting
    }

    /// Final write weighting.
    #[must_use]
    pub fn weighting(&self) -> &[f32] {
        &self.weighting
    }

    /// Bytes held by this head's buffers.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<f32>()
            * (self.key.len()
                + self.vector.len()
                + self.erase.len()
                + self.content_weighting.len()
                + self.allocation_weighting.len()
                + self.weighting.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::ScalarKernel;

    const EPS: f32 = 1e-6;

    fn seeded_memory() -> MemoryMatrix {
        let mut memory = MemoryMatrix::new(4, 3);
        memory.row_mut(0).copy_from_slice(&[1.0, 0.0, 0.0]);
        memory.row_mut(1).copy_from_slice(&[0.0, 1.0, 0.0]);
        memory.row_mut(2).copy_from_slice(&[0.0, 0.0, 1.0]);
        memory.row_mut(3).copy_from_slice(&[1.0, 1.0, 0.0]);
        memory
    }

    #[test]
    fn new_read_head_is_uniform() {
        let head = ReadHead::new(0, 4, 3);
        assert!(head.weighting().iter().all(|&w| (w - 0.25).abs() < 1e-6));
        assert!(head.read_vector().iter().all(|&r| r == 0.0));
    }

    #[test]
    fn pure_content_read_finds_row() {
        let memory = seeded_memory();
        let mut head = ReadHead::new(0, 4, 3);
        head.set_params(ReadParams {
            key: &[0.0, 1.0, 0.0],
            beta: 200.0,
            gate: [0.0, 1.0, 0.0],
        });
        head.address(&ScalarKernel, &memory, EPS);
        head.read(&memory, EPS);
        assert!(head.weighting()[1] > 0.99);
        assert!((head.read_vector()[1] - 1.0).abs() < 0.01);
    }

    #[test]
    fn previous_gate_keeps_weighting() {
        let memory = seeded_memory();
        let mut head = ReadHead::new(0, 4, 3);
        head.set_weighting(&[0.0, 0.0, 1.0, 0.0]);
        head.set_params(ReadParams {
            key: &[1.0, 0.0, 0.0],
            beta: 50.0,
            gate: [1.0, 0.0, 0.0],
        });
        head.address(&ScalarKernel, &memory, EPS);
        assert_eq!(head.weighting(), &[0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn massless_blend_falls_back_to_uniform() {
        let memory = seeded_memory();
        let mut head = ReadHead::new(0, 4, 3);
        head.set_params(ReadParams {
            key: &[1.0, 0.0, 0.0],
            beta: 5.0,
            gate: [0.0, 0.0, 1.0],
        });
        head.address(&ScalarKernel, &memory, EPS);
        assert!(head.weighting().iter().all(|&w| (w - 0.25).abs() < 1e-6));
    }

    #[test]
    fn one_hot_write_then_read_round_trips() {
        let mut memory = seeded_memory();
        let mut write = WriteHead::new(4, 3);
        let value = [0.3, -0.7, 2.5];
        write.set_params(WriteParams {
            key: &[0.0; 3],
            beta: 1.0,
            gate: [1.0, 0.0],
            vector: &value,
            erase: &[1.0; 3],
        });
        write.set_weighting(&[0.0, 0.0, 0.0, 1.0]);
        write.write(&mut memory, EPS);

        let mut read = ReadHead::new(0, 4, 3);
        read.set_weighting(&[0.0, 0.0, 0.0, 1.0]);
        read.read(&memory, EPS);
        for (r, v) in read.read_vector().iter().zip(value) {
            assert!((r - v).abs() < 1e-6);
        }
        assert_eq!(memory.row(0), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn allocation_gate_targets_least_used_slot() {
        let memory = seeded_memory();
        let mut usage = UsageTracker::new(4, 0.1);
        usage.record_write(&[0.9, 0.8, 0.1, 0.7]);
        let mut write = WriteHead::new(4, 3);
        write.set_params(WriteParams {
            key: &[1.0, 0.0, 0.0],
            beta: 10.0,
            gate: [0.0, 1.0],
            vector: &[0.0; 3],
            erase: &[0.0; 3],
        });
        write.address(&ScalarKernel, &memory, &mut usage, EPS);
        let best = crate::addressing::argmax(write.weighting()).map(|(i, _)| i);
        assert_eq!(best, Some(2));
        assert!((write.weighting()[2] - 0.9).abs() < 1e-6);
    }
}
