//! Temporal linkage: which locations were written, and in what order.
//!
//! Instead of a dense `N × N` link matrix this keeps two cheap structures:
//!
//! - a precedence weighting, `p_i ← (1 − w_i)·p_i + w_i`, updated on every
//!   write and biased towards the most recently written locations;
//! - a bounded ring of *dominant* writes: the argmax location of a write,
//!   recorded only when its weight exceeds the significance threshold.
//!
//! The ring answers "what was written right after X" for any X still in
//! the window.

/// Precedence weighting plus a bounded write-order history.
#[derive(Debug, Clone)]
pub struct TemporalLinkage {
    precedence: Box<[f32]>,
    history: Box<[usize]>,
    head: usize,
    len: usize,
    total_recorded: u64,
    significance: f32,
}

impl TemporalLinkage {
    /// Empty linkage over `locations` slots with a ring of `capacity`.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(locations: usize, capacity: usize, significance: f32) -> Self {
        assert!(capacity > 0, "write history capacity must be non-zero");
        Self {
            precedence: vec![0.0; locations].into_boxed_slice(),
            history: vec![0; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
            total_recorded: 0,
            significance,
        }
    }

    /// Zero precedence and forget all history.
    pub fn reset(&mut self) {
        self.precedence.fill(0.0);
        self.history.fill(0);
        self.head = 0;
        self.len = 0;
        self.total_recorded = 0;
    }

    /// Fold one write weighting in.
    ///
    /// Returns the location recorded in the history, if the dominant weight
    /// was significant.
    pub fn update(&mut self, write_weights: &[f32]) -> Option<usize> {
        for (p, &w) in self.precedence.iter_mut().zip(write_weights) {
            *p = (1.0 - w) * *p + w;
        }

        let (slot, weight) = crate::addressing::argmax(write_weights)?;
        if weight > self.significance {
            self.push(slot);
            Some(slot)
        } else {
            None
        }
    }

    fn push(&mut self, slot: usize) {
        let cap = self.history.len();
        self.history[self.head] = slot;
        self.head = (self.head + 1) % cap;
        self.len = (self.len + 1).min(cap);
        self.total_recorded += 1;
    }

    /// The `i`-th retained entry in chronological order (0 = oldest).
    fn chronological(&self, i: usize) -> usize {
        let cap = self.history.len();
        self.history[(self.head + cap - self.len + i) % cap]
    }

    /// The precedence weighting.
    #[must_use]
    pub fn precedence(&self) -> &[f32] {
        &self.precedence
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no write has been recorded since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ring capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    /// Bytes held by the precedence and history buffers.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(&*self.precedence) + std::mem::size_of_val(&*self.history)
    }

    /// Dominant writes recorded since reset, including ones that have
    /// since fallen out of the ring.
    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Retained writes, newest first.
    pub fn recent_writes(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        (0..self.len).rev().map(move |i| self.chronological(i))
    }

    /// Retained writes, oldest first.
    pub fn chronological_writes(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        (0..self.len).map(move |i| self.chronological(i))
    }

    /// The oldest retained write.
    #[must_use]
    pub fn oldest(&self) -> Option<usize> {
        (self.len > 0).then(|| self.chronological(0))
    }

    /// The newest retained write.
    #[must_use]
    pub fn newest(&self) -> Option<usize> {
        (self.len > 0).then(|| self.chronological(self.len - 1))
    }

    /// The location written right after the most recent write to `slot`
    /// that has a successor in the window.
    #[must_use]
    pub fn successor_of(&self, slot: usize) -> Option<usize> {
        (0..self.len.saturating_sub(1))
            .rev()
            .find(|&i| self.chronological(i) == slot)
            .map(|i| self.chronological(i + 1))
    }

    /// The location written right before the most recent write to `slot`.
    #[must_use]
    pub fn predecessor_of(&self, slot: usize) -> Option<usize> {
        (1..self.len)
            .rev()
            .find(|&i| self.chronological(i) == slot)
            .map(|i| self.chronological(i - 1))
    }

    /// Overwrite from a snapshot: precedence plus chronological history.
    ///
    /// History longer than the ring keeps only its newest entries. Returns
    /// `false` if the precedence length differs or a history entry is out
    /// of range.
    pub fn restore(&mut self, precedence: &[f32], history: &[usize], total_recorded: u64) -> bool {
        let locations = self.precedence.len();
        if precedence.len() != locations || history.iter().any(|&s| s >= locations) {
            return false;
        }
        self.reset();
        self.precedence.copy_from_slice(precedence);
        let skip = history.len().saturating_sub(self.history.len());
        for &slot in &history[skip..] {
            self.push(slot);
        }
        self.total_recorded = total_recorded.max(self.len as u64);
        true
    }
}
