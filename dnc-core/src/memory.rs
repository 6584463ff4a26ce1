//! The external memory matrix.
//!
//! `N` locations of `M`-wide vectors stored row-major in one flat buffer.
//! Each row is padded to a multiple of [`SIMD_WIDTH`] floats so a row
//! always starts on a lane boundary. Padding is kept at zero.
//!
//! The buffer is allocated once in [`MemoryMatrix::new`] and never resized;
//! the flat view ([`MemoryMatrix::as_flat`]) is what a persistence layer
//! copies.

use rand::Rng;

/// Number of `f32` lanes each row is padded to.
pub const SIMD_WIDTH: usize = 8;

/// Round `width` up to the next multiple of [`SIMD_WIDTH`].
#[must_use]
pub const fn padded_stride(width: usize) -> usize {
    width.div_ceil(SIMD_WIDTH) * SIMD_WIDTH
}

/// Fixed-capacity, stride-padded `N × M` memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMatrix {
    data: Box<[f32]>,
    locations: usize,
    width: usize,
    stride: usize,
}

impl MemoryMatrix {
    /// Allocate a zeroed matrix of `locations` rows of `width` floats.
    #[must_use]
    pub fn new(locations: usize, width: usize) -> Self {
        let stride = padded_stride(width);
        Self {
            data: vec![0.0; locations * stride].into_boxed_slice(),
            locations,
            width,
            stride,
        }
    }

    /// Number of locations (N).
    #[must_use]
    pub fn locations(&self) -> usize {
        self.locations
    }

    /// Vector width (M).
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row stride in floats, `>= width`, constant for the matrix's lifetime.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The stored vector at `location` (without padding).
    ///
    /// # Panics
    /// Panics if `location >= self.locations()`.
    #[must_use]
    pub fn row(&self, location: usize) -> &[f32] {
        let start = location * self.stride;
        &self.data[start..start + self.width]
    }

    /// Mutable access to the stored vector at `location`.
    ///
    /// # Panics
    /// Panics if `location >= self.locations()`.
    pub fn row_mut(&mut self, location: usize) -> &mut [f32] {
        let start = location * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Iterate over all rows in location order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.data
            .chunks_exact(self.stride)
            .map(move |padded| &padded[..self.width])
    }

    /// The whole matrix as one flat, stride-padded slice.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Overwrite the matrix from a flat, stride-padded slice.
    ///
    /// Returns `false` (leaving the matrix untouched) if the length differs.
    pub fn copy_from_flat(&mut self, flat: &[f32]) -> bool {
        if flat.len() != self.data.len() {
            return false;
        }
        self.data.copy_from_slice(flat);
        for padded in self.data.chunks_exact_mut(self.stride) {
            padded[self.width..].fill(0.0);
        }
        true
    }

    /// Zero every entry.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Fill the used columns with uniform noise in `[-amplitude/2, amplitude/2]`.
    pub fn fill_noise<R: Rng>(&mut self, rng: &mut R, amplitude: f32) {
        let half = amplitude.abs() * 0.5;
        if half == 0.0 {
            self.clear();
            return;
        }
        let width = self.width;
        for padded in self.data.chunks_exact_mut(self.stride) {
            for value in &mut padded[..width] {
                *value = rng.gen_range(-half..=half);
            }
        }
    }

    /// Erase-then-write one location:
    /// `M[loc] ← M[loc] ⊙ (1 − weight·erase) + weight·write`.
    ///
    /// # Panics
    /// Panics if `location` is out of range.
    pub fn erase_write(&mut self, location: usize, weight: f32, erase: &[f32], write: &[f32]) {
        let row = self.row_mut(location);
        for ((m, &e), &v) in row.iter_mut().zip(erase).zip(write) {
            *m = *m * (1.0 - weight * e) + weight * v;
        }
    }

    /// Accumulate `weight · M[loc]` into `out`.
    ///
    /// # Panics
    /// Panics if `location` is out of range.
    pub fn accumulate_row(&self, location: usize, weight: f32, out: &mut [f32]) {
        for (o, &m) in out.iter_mut().zip(self.row(location)) {
            *o += weight * m;
        }
    }

    /// Bytes held by the matrix buffer.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(&*self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn stride_is_padded_to_lane_width() {
        assert_eq!(padded_stride(1), 8);
        assert_eq!(padded_stride(8), 8);
        assert_eq!(padded_stride(9), 16);
        let m = MemoryMatrix::new(4, 5);
        assert_eq!(m.stride(), 8);
        assert_eq!(m.as_flat().len(), 32);
        assert_eq!(m.row(3).len(), 5);
    }

    #[test]
    fn noise_leaves_padding_zero() {
        let mut m = MemoryMatrix::new(6, 5);
        let mut rng = StdRng::seed_from_u64(7);
        m.fill_noise(&mut rng, 0.01);
        for padded in m.as_flat().chunks_exact(m.stride()) {
            assert!(padded[..5].iter().all(|v| v.abs() <= 0.005));
            assert!(padded[5..].iter().all(|&v| v == 0.0));
        }
        assert!(m.as_flat().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn full_erase_replaces_row() {
        let mut m = MemoryMatrix::new(3, 4);
        m.row_mut(1).copy_from_slice(&[9.0, 9.0, 9.0, 9.0]);
        m.erase_write(1, 1.0, &[1.0; 4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.row(1), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.row(0), &[0.0; 4]);
    }

    #[test]
    fn partial_write_blends() {
        let mut m = MemoryMatrix::new(1, 2);
        m.row_mut(0).copy_from_slice(&[1.0, 1.0]);
        m.erase_write(0, 0.5, &[1.0, 0.0], &[2.0, 2.0]);
        // 1·(1 − 0.5) + 1 = 1.5 ; 1·1 + 1 = 2
        assert!((m.row(0)[0] - 1.5).abs() < 1e-6);
        assert!((m.row(0)[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn copy_from_flat_checks_length() {
        let mut m = MemoryMatrix::new(2, 2);
        assert!(!m.copy_from_flat(&[1.0; 3]));
        let mut flat = vec![0.0; m.as_flat().len()];
        flat[0] = 3.0;
        flat[7] = 5.0; // padding of row 0, forced back to zero
        assert!(m.copy_from_flat(&flat));
        assert_eq!(m.row(0), &[3.0, 0.0]);
        assert_eq!(m.as_flat()[7], 0.0);
    }
}
