//! Controllers: whatever turns `input ⊕ previous reads` into
//! `hidden ⊕ raw interface` each step.
//!
//! The engine only depends on the [`Controller`] trait. Two implementations
//! ship with the crate:
//!
//! - [`LstmController`], a single fused-gate LSTM cell with seeded weights;
//! - [`FixedController`], which replays one fixed output vector, useful for
//!   driving the memory with hand-built interface vectors.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::addressing::sigmoid;

/// A recurrent unit driving the memory engine.
///
/// `forward` is called with exactly `input_size()` values and must fill an
/// `output_size()` buffer. Implementations used from a steady-state engine
/// should not allocate in `forward`.
pub trait Controller {
    /// Length of the concatenated input.
    fn input_size(&self) -> usize;

    /// Length of the produced output (hidden segment plus interface).
    fn output_size(&self) -> usize;

    /// Advance one step; deterministic given the persisted state.
    fn forward(&mut self, input: &[f32], output: &mut [f32]);

    /// Zero any persisted recurrent state.
    fn reset(&mut self);
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn input_size(&self) -> usize {
        (**self).input_size()
    }

    fn output_size(&self) -> usize {
        (**self).output_size()
    }

    fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        (**self).forward(input, output);
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

// ---------------------------------------------------------------------------
// LSTM
// ---------------------------------------------------------------------------

/// Initial bias of the forget gate.
pub const FORGET_BIAS: f32 = 0.1;

/// Number of fused gates (input, forget, candidate, output).
const GATES: usize = 4;

/// Single-layer LSTM cell.
///
/// Gates are computed from one fused `4H × (I + H)` weight matrix over
/// `[input ⊕ previous hidden]`. The whole hidden state `h = o ⊙ tanh(c)`
/// is the output.
#[derive(Debug, Clone)]
pub struct LstmController {
    input_size: usize,
    hidden_size: usize,
    weights: Box<[f32]>,
    bias: Box<[f32]>,
    concat: Box<[f32]>,
    gates: Box<[f32]>,
    hidden: Box<[f32]>,
    cell: Box<[f32]>,
}

impl LstmController {
    /// Build a cell with uniformly random weights in
    /// `±scale · sqrt(2 / (concat + hidden))`.
    #[must_use]
    pub fn new(input_size: usize, hidden_size: usize, seed: u64, scale: f32) -> Self {
        let concat = input_size + hidden_size;
        let mut rng = StdRng::seed_from_u64(seed);
        let limit = scale.abs() * (2.0 / (concat + hidden_size).max(1) as f32).sqrt();

        let weights: Box<[f32]> = (0..GATES * hidden_size * concat)
            .map(|_| if limit > 0.0 { rng.gen_range(-limit..=limit) } else { 0.0 })
            .collect();

        let mut bias = vec![0.0; GATES * hidden_size].into_boxed_slice();
        bias[hidden_size..2 * hidden_size].fill(FORGET_BIAS);

        Self {
            input_size,
            hidden_size,
            weights,
            bias,
            concat: vec![0.0; concat].into_boxed_slice(),
            gates: vec![0.0; GATES * hidden_size].into_boxed_slice(),
            hidden: vec![0.0; hidden_size].into_boxed_slice(),
            cell: vec![0.0; hidden_size].into_boxed_slice(),
        }
    }

    /// Current hidden state.
    #[must_use]
    pub fn hidden(&self) -> &[f32] {
        &self.hidden
    }

    /// Current cell state.
    #[must_use]
    pub fn cell(&self) -> &[f32] {
        &self.cell
    }

    /// Bytes held by weights, biases and scratch.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<f32>()
            * (self.weights.len()
                + self.bias.len()
                + self.concat.len()
                + self.gates.len()
                + self.hidden.len()
                + self.cell.len())
    }
}

impl Controller for LstmController {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.hidden_size
    }

    fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        let (i_len, h) = (self.input_size, self.hidden_size);
        self.concat[..i_len].copy_from_slice(&input[..i_len]);
        self.concat[i_len..].copy_from_slice(&self.hidden);

        let cols = self.concat.len();
        for (g, (row, &b)) in self
            .gates
            .iter_mut()
            .zip(self.weights.chunks_exact(cols).zip(self.bias.iter()))
        {
            *g = b + row.iter().zip(self.concat.iter()).map(|(w, x)| w * x).sum::<f32>();
        }

        let (input_gate, rest) = self.gates.split_at(h);
        let (forget_gate, rest) = rest.split_at(h);
        let (candidate, output_gate) = rest.split_at(h);
        for j in 0..h {
            let c = sigmoid(forget_gate[j]) * self.cell[j]
                + sigmoid(input_gate[j]) * candidate[j].tanh();
            self.cell[j] = c;
            self.hidden[j] = sigmoid(output_gate[j]) * c.tanh();
        }
        output.copy_from_slice(&self.hidden);
    }

    fn reset(&mut self) {
        self.hidden.fill(0.0);
        self.cell.fill(0.0);
    }
}

// ---------------------------------------------------------------------------
// Fixed
// ---------------------------------------------------------------------------

/// Replays the same output every step, ignoring its input.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedController {
    input_size: usize,
    output: Box<[f32]>,
}

impl FixedController {
    /// Replay `output` for inputs of `input_size`.
    #[must_use]
    pub fn new(input_size: usize, output: Vec<f32>) -> Self {
        Self {
            input_size,
            output: output.into_boxed_slice(),
        }
    }

    /// Replace the replayed output in place.
    ///
    /// # Panics
    /// Panics if the length differs from `output_size()`.
    pub fn set_output(&mut self, output: &[f32]) {
        self.output.copy_from_slice(output);
    }

    /// The replayed output.
    #[must_use]
    pub fn output(&self) -> &[f32] {
        &self.output
    }
}

impl Controller for FixedController {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output.len()
    }

    fn forward(&mut self, _input: &[f32], output: &mut [f32]) {
        output.copy_from_slice(&self.output);
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lstm_is_deterministic_per_seed() {
        let mut a = LstmController::new(3, 5, 42, 0.5);
        let mut b = LstmController::new(3, 5, 42, 0.5);
        let mut c = LstmController::new(3, 5, 43, 0.5);
        let input = [0.3, -1.0, 2.0];
        let (mut oa, mut ob, mut oc) = ([0.0; 5], [0.0; 5], [0.0; 5]);
        a.forward(&input, &mut oa);
        b.forward(&input, &mut ob);
        c.forward(&input, &mut oc);
        assert_eq!(oa, ob);
        assert_ne!(oa, oc);
    }

    #[test]
    fn lstm_output_is_bounded() {
        let mut lstm = LstmController::new(4, 6, 1, 10.0);
        let mut out = [0.0; 6];
        for _ in 0..20 {
            lstm.forward(&[100.0, -100.0, 50.0, 1.0], &mut out);
            assert!(out.iter().all(|v| v.abs() <= 1.0));
        }
    }

    #[test]
    fn lstm_zero_weights_give_zero_output() {
        let mut lstm = LstmController::new(2, 3, 7, 0.0);
        let mut out = [1.0; 3];
        lstm.forward(&[5.0, 5.0], &mut out);
        assert_eq!(out, [0.0; 3]);
    }

    #[test]
    fn lstm_reset_restores_first_step() {
        let mut lstm = LstmController::new(2, 4, 9, 1.0);
        let input = [1.0, -0.5];
        let mut first = [0.0; 4];
        let mut later = [0.0; 4];
        lstm.forward(&input, &mut first);
        lstm.forward(&input, &mut later);
        assert_ne!(first, later);
        lstm.reset();
        assert!(lstm.hidden().iter().all(|&h| h == 0.0));
        lstm.forward(&input, &mut later);
        assert_eq!(first, later);
    }

    #[test]
    fn fixed_controller_replays_output() {
        let mut fixed = FixedController::new(2, vec![1.0, 2.0, 3.0]);
        assert_eq!(fixed.output_size(), 3);
        let mut out = [0.0; 3];
        fixed.forward(&[9.0, 9.0], &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        fixed.set_output(&[4.0, 5.0, 6.0]);
        fixed.forward(&[0.0, 0.0], &mut out);
        assert_eq!(out, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn boxed_controller_delegates() {
        let mut boxed: Box<dyn Controller> = Box::new(FixedController::new(1, vec![7.0]));
        assert_eq!(boxed.input_size(), 1);
        let mut out = [0.0];
        boxed.forward(&[0.0], &mut out);
        assert_eq!(out, [7.0]);
    }
}
