//! The controller ↔ memory interface vector.
//!
//! The controller's raw output ends with a flat segment that is sliced
//! into per-head parameters every step. Field order is a wire contract:
//!
//! ```text
//! per read head × R : key(M) | strength(1) | gate(3) | shift(3)
//! write head        : key(M) | strength(1) | gate(2) | vector(M) | erase(M)
//! free gates        : R
//! ```
//!
//! [`InterfaceLayout`] is the single source of truth for offsets; it is
//! built by walking a cursor over the fields in order, so changing one
//! field's size moves every later offset with it. [`InterfaceView`] reads
//! named, transformed fields out of a raw slice without copying, and
//! [`InterfaceBuilder`] writes raw slices by field name.

use std::ops::Range;

use crate::addressing::{sigmoid, softmax};

/// Width of a read head's gate (previous, content, unused third mode).
pub const READ_GATE_LEN: usize = 3;
/// Width of a read head's shift weighting.
pub const READ_SHIFT_LEN: usize = 3;
/// Width of the write head's content/allocation gate.
pub const WRITE_GATE_LEN: usize = 2;

/// Map a raw strength to a sharpness `>= 1`: `1 + e^x`.
#[inline]
#[must_use]
pub fn strength_from_raw(raw: f32) -> f32 {
    1.0 + raw.exp()
}

/// Inverse of [`strength_from_raw`]: the raw value that yields `beta`.
///
/// Values of `beta <= 1` map to a very negative raw value (beta ≈ 1).
#[must_use]
pub fn strength_logit(beta: f32) -> f32 {
    (beta - 1.0).max(f32::MIN_POSITIVE).ln()
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Offsets of one read head's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadHeadLayout {
    /// Lookup key, `M` wide.
    pub key: Range<usize>,
    /// Raw strength.
    pub strength: usize,
    /// Gate logits.
    pub gate: Range<usize>,
    /// Shift logits.
    pub shift: Range<usize>,
}

/// Offsets of the write head's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteHeadLayout {
    /// Lookup key, `M` wide.
    pub key: Range<usize>,
    /// Raw strength.
    pub strength: usize,
    /// Content/allocation gate logits.
    pub gate: Range<usize>,
    /// Vector to write, `M` wide.
    pub vector: Range<usize>,
    /// Erase logits, `M` wide.
    pub erase: Range<usize>,
}

/// Hands out consecutive, non-overlapping ranges.
#[derive(Debug, Default)]
struct LayoutCursor {
    offset: usize,
}

impl LayoutCursor {
    fn field(&mut self, len: usize) -> Range<usize> {
        let start = self.offset;
        self.offset += len;
        start..self.offset
    }

    fn scalar(&mut self) -> usize {
        self.field(1).start
    }
}

/// Offsets of every field in the interface segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceLayout {
    read: Vec<ReadHeadLayout>,
    write: WriteHeadLayout,
    free_gates: Range<usize>,
    vector_size: usize,
    len: usize,
}

impl InterfaceLayout {
    /// Lay out the interface for `num_read_heads` heads over `vector_size`-wide memory.
    #[must_use]
    pub fn new(num_read_heads: usize, vector_size: usize) -> Self {
        let mut cursor = LayoutCursor::default();
        let read = (0..num_read_heads)
            .map(|_| ReadHeadLayout {
                key: cursor.field(vector_size),
                strength: cursor.scalar(),
                gate: cursor.field(READ_GATE_LEN),
                shift: cursor.field(READ_SHIFT_LEN),
            })
            .collect();
        let write = WriteHeadLayout {
            key: cursor.field(vector_size),
            strength: cursor.scalar(),
            gate: cursor.field(WRITE_GATE_LEN),
            vector: cursor.field(vector_size),
            erase: cursor.field(vector_size),
        };
        let free_gates = cursor.field(num_read_heads);
        Self {
            read,
            write,
            free_gates,
            vector_size,
            len: cursor.offset,
        }
    }

    /// Interface size by formula:
    /// `R·M + R + 3R + 3R + M + 1 + 2 + M + M + R`.
    #[must_use]
    pub const fn expected_len(num_read_heads: usize, vector_size: usize) -> usize {
        let (r, m) = (num_read_heads, vector_size);
        r * m + r + READ_GATE_LEN * r + READ_SHIFT_LEN * r + m + 1 + WRITE_GATE_LEN + m + m + r
    }

    /// Total number of floats in the interface segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the layout is empty (never true for a valid engine).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of read heads laid out.
    #[must_use]
    pub fn num_read_heads(&self) -> usize {
        self.read.len()
    }

    /// Memory vector width.
    #[must_use]
    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    /// Offsets of read head `head`.
    ///
    /// # Panics
    /// Panics if `head >= self.num_read_heads()`.
    #[must_use]
    pub fn read_head(&self, head: usize) -> &ReadHeadLayout {
        &self.read[head]
    }

    /// Offsets of the write head.
    #[must_use]
    pub fn write_head(&self) -> &WriteHeadLayout {
        &self.write
    }

    /// Offsets of the free gates.
    #[must_use]
    pub fn free_gates(&self) -> Range<usize> {
        self.free_gates.clone()
    }

    /// A typed view over `raw`, or `None` if its length is wrong.
    #[must_use]
    pub fn view<'a>(&'a self, raw: &'a [f32]) -> Option<InterfaceView<'a>> {
        (raw.len() == self.len).then_some(InterfaceView { layout: self, raw })
    }

    /// View over a segment whose length the caller already guarantees.
    pub(crate) fn view_sized<'a>(&'a self, raw: &'a [f32]) -> InterfaceView<'a> {
        debug_assert_eq!(raw.len(), self.len);
        InterfaceView { layout: self, raw }
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Named, transformed access to one step's raw interface segment.
///
/// Strengths come back as `1 + e^x`, gates and shifts softmaxed, erase
/// and free gates through the logistic sigmoid. Keys and the write vector
/// are raw.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceView<'a> {
    layout: &'a InterfaceLayout,
    raw: &'a [f32],
}

impl<'a> InterfaceView<'a> {
    /// The layout this view reads through.
    #[must_use]
    pub fn layout(&self) -> &'a InterfaceLayout {
        self.layout
    }

    fn array<const K: usize>(&self, range: &Range<usize>) -> [f32; K] {
        let mut out = [0.0; K];
        out.copy_from_slice(&self.raw[range.clone()]);
        out
    }

    /// Read head `head`'s lookup key.
    #[must_use]
    pub fn read_key(&self, head: usize) -> &'a [f32] {
        &self.raw[self.layout.read[head].key.clone()]
    }

    /// Read head `head`'s sharpness, `>= 1`.
    #[must_use]
    pub fn read_strength(&self, head: usize) -> f32 {
        strength_from_raw(self.raw[self.layout.read[head].strength])
    }

    /// Read head `head`'s gate, softmaxed.
    #[must_use]
    pub fn read_gate(&self, head: usize) -> [f32; READ_GATE_LEN] {
        softmax(self.array(&self.layout.read[head].gate))
    }

    /// Read head `head`'s shift weighting, softmaxed.
    #[must_use]
    pub fn read_shift(&self, head: usize) -> [f32; READ_SHIFT_LEN] {
        softmax(self.array(&self.layout.read[head].shift))
    }

    /// Write key.
    #[must_use]
    pub fn write_key(&self) -> &'a [f32] {
        &self.raw[self.layout.write.key.clone()]
    }

    /// Write sharpness, `>= 1`.
    #[must_use]
    pub fn write_strength(&self) -> f32 {
        strength_from_raw(self.raw[self.layout.write.strength])
    }

    /// Write gate `[content, allocation]`, softmaxed.
    #[must_use]
    pub fn write_gate(&self) -> [f32; WRITE_GATE_LEN] {
        softmax(self.array(&self.layout.write.gate))
    }

    /// Vector to write.
    #[must_use]
    pub fn write_vector(&self) -> &'a [f32] {
        &self.raw[self.layout.write.vector.clone()]
    }

    /// Erase logits before the sigmoid.
    #[must_use]
    pub fn erase_logits(&self) -> &'a [f32] {
        &self.raw[self.layout.write.erase.clone()]
    }

    /// Write the erase vector, in `[0, 1]`, into `out`.
    pub fn erase_into(&self, out: &mut [f32]) {
        for (e, &x) in out.iter_mut().zip(self.erase_logits()) {
            *e = sigmoid(x);
        }
    }

    /// Free gate for read head `head`, in `[0, 1]`.
    ///
    /// # Panics
    /// Panics if `head >= self.layout().num_read_heads()`.
    #[must_use]
    pub fn free_gate(&self, head: usize) -> f32 {
        sigmoid(self.raw[self.layout.free_gates.clone()][head])
    }

    /// Write all free gates into `out`.
    pub fn free_gates_into(&self, out: &mut [f32]) {
        for (f, &x) in out.iter_mut().zip(&self.raw[self.layout.free_gates.clone()]) {
            *f = sigmoid(x);
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Writes a raw interface segment field by field.
///
/// All fields start at zero. Setters take raw (pre-transform) values,
/// except the `*_beta` helpers which take the desired sharpness.
///
/// ```
/// use dnc_core::interface::{InterfaceBuilder, InterfaceLayout};
///
/// let layout = InterfaceLayout::new(1, 4);
/// let raw = InterfaceBuilder::new(&layout)
///     .write_key(&[1.0, 0.0, 0.0, 0.0])
///     .write_beta(1000.0)
///     .write_gate_logits([30.0, -30.0])
///     .build();
/// let view = layout.view(&raw).expect("layout length");
/// assert!((view.write_strength() - 1000.0).abs() < 0.5);
/// assert!(view.write_gate()[0] > 0.999);
/// ```
#[derive(Debug, Clone)]
pub struct InterfaceBuilder<'a> {
    layout: &'a InterfaceLayout,
    raw: Vec<f32>,
}

impl<'a> InterfaceBuilder<'a> {
    /// An all-zero interface for `layout`.
    #[must_use]
    pub fn new(layout: &'a InterfaceLayout) -> Self {
        Self {
            layout,
            raw: vec![0.0; layout.len()],
        }
    }

    fn put(&mut self, range: Range<usize>, values: &[f32]) -> &mut Self {
        self.raw[range].copy_from_slice(values);
        self
    }

    /// Set read head `head`'s key.
    ///
    /// # Panics
    /// Panics if `key.len()` is not the memory width or `head` is out of range.
    pub fn read_key(&mut self, head: usize, key: &[f32]) -> &mut Self {
        let range = self.layout.read[head].key.clone();
        self.put(range, key)
    }

    /// Set read head `head`'s raw strength.
    pub fn read_strength_raw(&mut self, head: usize, raw: f32) -> &mut Self {
        self.raw[self.layout.read[head].strength] = raw;
        self
    }

    /// Set read head `head`'s strength so that the parsed sharpness is `beta`.
    pub fn read_beta(&mut self, head: usize, beta: f32) -> &mut Self {
        self.read_strength_raw(head, strength_logit(beta))
    }

    /// Set read head `head`'s gate logits.
    pub fn read_gate_logits(&mut self, head: usize, logits: [f32; READ_GATE_LEN]) -> &mut Self {
        let range = self.layout.read[head].gate.clone();
        self.put(range, &logits)
    }

    /// Set read head `head`'s shift logits.
    pub fn read_shift_logits(&mut self, head: usize, logits: [f32; READ_SHIFT_LEN]) -> &mut Self {
        let range = self.layout.read[head].shift.clone();
        self.put(range, &logits)
    }

    /// Set the write key.
    ///
    /// # Panics
    /// Panics if `key.len()` is not the memory width.
    pub fn write_key(&mut self, key: &[f32]) -> &mut Self {
        let range = self.layout.write.key.clone();
        self.put(range, key)
    }

    /// Set the write head's raw strength.
    pub fn write_strength_raw(&mut self, raw: f32) -> &mut Self {
        self.raw[self.layout.write.strength] = raw;
        self
    }

    /// Set the write strength so that the parsed sharpness is `beta`.
    pub fn write_beta(&mut self, beta: f32) -> &mut Self {
        self.write_strength_raw(strength_logit(beta))
    }

    /// Set the write gate logits `[content, allocation]`.
    pub fn write_gate_logits(&mut self, logits: [f32; WRITE_GATE_LEN]) -> &mut Self {
        let range = self.layout.write.gate.clone();
        self.put(range, &logits)
    }

    /// Set the vector to write.
    ///
    /// # Panics
    /// Panics if `vector.len()` is not the memory width.
    pub fn write_vector(&mut self, vector: &[f32]) -> &mut Self {
        let range = self.layout.write.vector.clone();
        self.put(range, vector)
    }

    /// Set every erase logit to `logit`.
    pub fn erase_all(&mut self, logit: f32) -> &mut Self {
        self.raw[self.layout.write.erase.clone()].fill(logit);
        self
    }

    /// Set the erase logits.
    ///
    /// # Panics
    /// Panics if `logits.len()` is not the memory width.
    pub fn erase_logits(&mut self, logits: &[f32]) -> &mut Self {
        let range = self.layout.write.erase.clone();
        self.put(range, logits)
    }

    /// Set the free gate logits, one per read head.
    ///
    /// # Panics
    /// Panics if `logits.len()` is not the read head count.
    pub fn free_gate_logits(&mut self, logits: &[f32]) -> &mut Self {
        let range = self.layout.free_gates.clone();
        self.put(range, logits)
    }

    /// The raw segment built so far.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.raw
    }

    /// Finish and take the raw segment.
    #[must_use]
    pub fn build(&self) -> Vec<f32> {
        self.raw.clone()
    }
}
