//! The step orchestrator.
//!
//! [`Dnc`] owns the memory, usage, linkage and heads of one instance plus
//! its controller. Every buffer is sized from the config and allocated in
//! the constructor; [`Dnc::step`] only ever writes into them.
//!
//! One step:
//!
//! 1. `input ⊕ previous reads` → controller input buffer
//! 2. controller forward → `hidden ⊕ interface`
//! 3. interface parsed through [`InterfaceLayout`]
//! 4. write addressing, erase-write, usage and linkage update
//! 5. every read head addresses and reads
//! 6. `output = hidden ⊕ read₁ ⊕ … ⊕ read_R`

use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, trace, trace_span};

use crate::addressing::{DefaultKernel, SimilarityKernel};
use crate::analysis::{self, MemoryAnalysis};
use crate::config::{DncConfig, RetentionMode};
use crate::controller::{Controller, LstmController};
use crate::error::{DncError, Result};
use crate::heads::{ReadHead, WriteHead};
use crate::interface::InterfaceLayout;
use crate::linkage::TemporalLinkage;
use crate::memory::MemoryMatrix;
use crate::metrics::{EngineMetrics, MetricsSnapshot, spans};
use crate::snapshot::MemorySnapshot;
use crate::usage::UsageTracker;

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed or reset; no step taken since.
    Ready,
    /// At least one step taken.
    Stepping,
}

/// A DNC memory engine driven by controller `C`.
#[derive(Debug)]
pub struct Dnc<C: Controller, K: SimilarityKernel = DefaultKernel> {
    config: DncConfig,
    layout: InterfaceLayout,
    kernel: K,
    controller: C,
    memory: MemoryMatrix,
    usage: UsageTracker,
    linkage: TemporalLinkage,
    read_heads: Box<[ReadHead]>,
    write_head: WriteHead,
    controller_input: Box<[f32]>,
    controller_output: Box<[f32]>,
    free_gates: Box<[f32]>,
    retention: Box<[f32]>,
    output: Box<[f32]>,
    metrics: EngineMetrics,
    state: EngineState,
    step_count: u64,
}

impl Dnc<LstmController> {
    /// Build an engine driven by a freshly seeded [`LstmController`].
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn with_lstm(config: DncConfig) -> Result<Self> {
        config.validate()?;
        let layout = InterfaceLayout::new(
            config.dimensions.num_read_heads,
            config.dimensions.memory_vector_size,
        );
        let controller = LstmController::new(
            config.controller_input_size(),
            config.dimensions.controller_hidden_size + layout.len(),
            config.init.seed.wrapping_add(1),
            config.init.weight_scale,
        );
        Self::new(config, controller)
    }
}

impl<C: Controller, K: SimilarityKernel + Default> Dnc<C, K> {
    /// Build an engine around `controller` with the default kernel.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid, or
    /// `DncError::ControllerShape` if the controller's sizes do not match.
    pub fn new(config: DncConfig, controller: C) -> Result<Self> {
        Self::with_kernel(config, controller, K::default())
    }
}

impl<C: Controller, K: SimilarityKernel> Dnc<C, K> {
    /// Build an engine around `controller` using `kernel` for similarity.
    ///
    /// Memory starts as seeded noise of width `init.memory_noise`; usage
    /// and linkage start empty, read weightings uniform.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid, or
    /// `DncError::ControllerShape` if the controller's sizes do not match.
    pub fn with_kernel(config: DncConfig, controller: C, kernel: K) -> Result<Self> {
        config.validate()?;
        let d = &config.dimensions;
        let (n, m, r) = (d.memory_locations, d.memory_vector_size, d.num_read_heads);
        let layout = InterfaceLayout::new(r, m);

        let expected_input = config.controller_input_size();
        let expected_output = d.controller_hidden_size + layout.len();
        if controller.input_size() != expected_input || controller.output_size() != expected_output {
            return Err(DncError::ControllerShape {
                expected_input,
                actual_input: controller.input_size(),
                expected_output,
                actual_output: controller.output_size(),
            });
        }

        let mut memory = MemoryMatrix::new(n, m);
        let mut rng = StdRng::seed_from_u64(config.init.seed);
        memory.fill_noise(&mut rng, config.init.memory_noise);

        let dnc = Self {
            usage: UsageTracker::new(n, config.addressing.free_threshold),
            linkage: TemporalLinkage::new(
                n,
                config.history_capacity(),
                config.addressing.significance_threshold,
            ),
            read_heads: (0..r).map(|h| ReadHead::new(h, n, m)).collect(),
            write_head: WriteHead::new(n, m),
            controller_input: vec![0.0; expected_input].into_boxed_slice(),
            controller_output: vec![0.0; expected_output].into_boxed_slice(),
            free_gates: vec![0.0; r].into_boxed_slice(),
            retention: vec![1.0; n].into_boxed_slice(),
            output: vec![0.0; config.output_size()].into_boxed_slice(),
            metrics: EngineMetrics::new(),
            state: EngineState::Ready,
            step_count: 0,
            memory,
            layout,
            kernel,
            controller,
            config,
        };

        info!(
            locations = n,
            width = m,
            read_heads = r,
            interface = dnc.layout.len(),
            kernel = dnc.kernel.name(),
            footprint_bytes = dnc.footprint_bytes(),
            "DNC engine constructed"
        );
        Ok(dnc)
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Run one timestep on `input`.
    ///
    /// # Errors
    /// Returns `DncError::InputLength` (leaving all state untouched) if
    /// `input` is not `input_size` long.
    pub fn step(&mut self, input: &[f32]) -> Result<()> {
        let input_size = self.config.dimensions.input_size;
        if input.len() != input_size {
            return Err(DncError::InputLength {
                expected: input_size,
                actual: input.len(),
            });
        }
        let _step = trace_span!(spans::STEP).entered();
        let width = self.memory.width();
        let hidden = self.config.dimensions.controller_hidden_size;
        let a = &self.config.addressing;

        let started = Instant::now();
        let (external, previous_reads) = self.controller_input.split_at_mut(input_size);
        external.copy_from_slice(input);
        for (dst, head) in previous_reads.chunks_exact_mut(width).zip(self.read_heads.iter()) {
            dst.copy_from_slice(head.read_vector());
        }
        {
            let _span = trace_span!(spans::CONTROLLER).entered();
            self.controller
                .forward(&self.controller_input, &mut self.controller_output);
        }
        let controller_time = started.elapsed();

        let memory_started = Instant::now();
        // controller_output is hidden + layout.len() wide since construction.
        let view = self.layout.view_sized(&self.controller_output[hidden..]);

        let recorded = {
            let _span = trace_span!(spans::WRITE).entered();
            self.write_head.load(&view);
            self.write_head
                .address(&self.kernel, &self.memory, &mut self.usage, a.similarity_epsilon);
            self.write_head.write(&mut self.memory, a.write_epsilon);

            match a.retention {
                RetentionMode::Fixed => self.usage.record_write(self.write_head.weighting()),
                RetentionMode::FreeGated => {
                    // Previous step's read weightings, current free gates.
                    view.free_gates_into(&mut self.free_gates);
                    self.retention.fill(1.0);
                    for (head, &f) in self.read_heads.iter().zip(self.free_gates.iter()) {
                        for (psi, &w) in self.retention.iter_mut().zip(head.weighting()) {
                            *psi *= 1.0 - f * w;
                        }
                    }
                    self.usage
                        .record_write_with_retention(self.write_head.weighting(), &self.retention);
                }
            }
            self.linkage.update(self.write_head.weighting())
        };

        {
            let _span = trace_span!(spans::READ).entered();
            for head in self.read_heads.iter_mut() {
                head.load(&view);
                head.address(&self.kernel, &self.memory, a.similarity_epsilon);
                head.read(&self.memory, a.write_epsilon);
            }
        }

        let (out_hidden, out_reads) = self.output.split_at_mut(hidden);
        out_hidden.copy_from_slice(&self.controller_output[..hidden]);
        for (dst, head) in out_reads.chunks_exact_mut(width).zip(self.read_heads.iter()) {
            dst.copy_from_slice(head.read_vector());
        }

        self.step_count += 1;
        self.state = EngineState::Stepping;
        self.metrics
            .record_step(self.read_heads.len(), controller_time, memory_started.elapsed());
        trace!(step = self.step_count, write_slot = ?recorded, "DNC step");
        Ok(())
    }

    /// Run one timestep, then copy the output into `output`.
    ///
    /// # Errors
    /// Returns `DncError::OutputLength` or `DncError::InputLength` (leaving
    /// all state untouched) on a length mismatch.
    pub fn forward(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        if output.len() != self.output.len() {
            return Err(DncError::OutputLength {
                expected: self.output.len(),
                actual: output.len(),
            });
        }
        self.step(input)?;
        output.copy_from_slice(&self.output);
        Ok(())
    }

    /// Zero memory, usage, linkage, metrics and the controller state;
    /// restore uniform read weightings. Nothing is deallocated.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.usage.reset();
        self.linkage.reset();
        for head in self.read_heads.iter_mut() {
            head.reset();
        }
        self.write_head.reset();
        self.controller.reset();
        self.controller_input.fill(0.0);
        self.controller_output.fill(0.0);
        self.free_gates.fill(0.0);
        self.retention.fill(1.0);
        self.output.fill(0.0);
        self.metrics.reset();
        self.step_count = 0;
        self.state = EngineState::Ready;
        debug!("DNC engine reset");
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Last step's output: `hidden ⊕ read₁ ⊕ … ⊕ read_R`.
    #[must_use]
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    /// Hidden segment of the last output.
    #[must_use]
    pub fn hidden(&self) -> &[f32] {
        &self.output[..self.config.dimensions.controller_hidden_size]
    }

    /// Read vector of head `head`.
    ///
    /// # Panics
    /// Panics if `head` is out of range.
    #[must_use]
    pub fn read_vector(&self, head: usize) -> &[f32] {
        self.read_heads[head].read_vector()
    }

    /// Read vectors of all heads, in head order.
    pub fn read_vectors(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.read_heads.iter().map(ReadHead::read_vector)
    }

    /// Read heads.
    #[must_use]
    pub fn read_heads(&self) -> &[ReadHead] {
        &self.read_heads
    }

    /// The write head.
    #[must_use]
    pub fn write_head(&self) -> &WriteHead {
        &self.write_head
    }

    /// Memory matrix.
    #[must_use]
    pub fn memory(&self) -> &MemoryMatrix {
        &self.memory
    }

    /// Usage tracker.
    #[must_use]
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Temporal linkage.
    #[must_use]
    pub fn linkage(&self) -> &TemporalLinkage {
        &self.linkage
    }

    /// Interface layout the controller output is parsed with.
    #[must_use]
    pub fn layout(&self) -> &InterfaceLayout {
        &self.layout
    }

    /// The configuration this engine was built from.
    #[must_use]
    pub fn config(&self) -> &DncConfig {
        &self.config
    }

    /// The controller.
    #[must_use]
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Mutable access to the controller. Its input and output sizes must
    /// not change.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// The similarity kernel.
    #[must_use]
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Steps since construction or the last reset.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Performance counters since construction or the last reset.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Usage and content diagnostics. Never mutates state.
    #[must_use]
    pub fn analyze_memory(&self) -> MemoryAnalysis {
        let _span = trace_span!(spans::ANALYZE).entered();
        analysis::analyze(
            &self.kernel,
            &self.memory,
            &self.usage,
            &self.linkage,
            self.config.addressing.similarity_epsilon,
        )
    }

    /// Bytes allocated for the engine's own buffers, excluding the controller.
    #[must_use]
    pub fn footprint_bytes(&self) -> usize {
        let floats = self.controller_input.len()
            + self.controller_output.len()
            + self.free_gates.len()
            + self.retention.len()
            + self.output.len();
        self.memory.size_bytes()
            + self.usage.size_bytes()
            + self.linkage.size_bytes()
            + self.read_heads.iter().map(ReadHead::size_bytes).sum::<usize>()
            + self.write_head.size_bytes()
            + floats * std::mem::size_of::<f32>()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Capture memory, usage, linkage and read state.
    #[must_use]
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            locations: self.memory.locations(),
            width: self.memory.width(),
            stride: self.memory.stride(),
            memory: self.memory.as_flat().to_vec(),
            usage: self.usage.usage().to_vec(),
            precedence: self.linkage.precedence().to_vec(),
            history: self.linkage.chronological_writes().collect(),
            history_total: self.linkage.total_recorded(),
            read_weightings: self.read_heads.iter().map(|h| h.weighting().to_vec()).collect(),
            read_vectors: self.read_heads.iter().map(|h| h.read_vector().to_vec()).collect(),
            step_count: self.step_count,
        }
    }

    /// Restore state captured by [`Dnc::snapshot`]. The controller is not
    /// touched.
    ///
    /// # Errors
    /// Returns `DncError::SnapshotShape` (leaving all state untouched) if
    /// the snapshot was taken from an engine of a different shape.
    pub fn restore(&mut self, snapshot: &MemorySnapshot) -> Result<()> {
        snapshot.check_shape(
            self.memory.locations(),
            self.memory.width(),
            self.memory.stride(),
            self.read_heads.len(),
        )?;

        let restored = self.memory.copy_from_flat(&snapshot.memory)
            && self.usage.restore(&snapshot.usage)
            && self.linkage.restore(
                &snapshot.precedence,
                &snapshot.history,
                snapshot.history_total,
            );
        if !restored {
            return Err(DncError::SnapshotShape("component rejected snapshot".into()));
        }
        for ((head, w), r) in self
            .read_heads
            .iter_mut()
            .zip(&snapshot.read_weightings)
            .zip(&snapshot.read_vectors)
        {
            head.restore(w, r);
        }
        self.step_count = snapshot.step_count;
        self.state = if snapshot.step_count == 0 {
            EngineState::Ready
        } else {
            EngineState::Stepping
        };
        debug!(
            step_count = snapshot.step_count,
            history = snapshot.history.len(),
            "DNC snapshot restored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FixedController;
    use crate::interface::InterfaceBuilder;

    fn small_config() -> DncConfig {
        DncConfig::with_dimensions(2, 3, 2, 4, 3)
    }

    fn fixed_engine(raw_interface: &[f32]) -> Dnc<FixedController> {
        let config = small_config();
        let mut output = vec![0.5; config.dimensions.controller_hidden_size];
        output.extend_from_slice(raw_interface);
        let controller = FixedController::new(config.controller_input_size(), output);
        Dnc::new(config, controller).expect("engine")
    }

    #[test]
    fn sized_input_always_steps() {
        let layout = InterfaceLayout::new(2, 3);
        let raw: Vec<f32> = (0..layout.len()).map(|i| (i as f32 * 1.7).sin() * 4.0).collect();
        let mut dnc = fixed_engine(&raw);
        for t in 0..50 {
            dnc.step(&[t as f32 * 0.1, -1.0]).expect("sized input never fails");
        }
        assert_eq!(dnc.step_count(), 50);
        assert_eq!(dnc.state(), EngineState::Stepping);
    }

    #[test]
    fn rejects_mismatched_controller() {
        let config = small_config();
        let controller = FixedController::new(config.controller_input_size(), vec![0.0; 3]);
        let err = Dnc::<FixedController>::new(config, controller).expect_err("shape");
        assert!(matches!(err, DncError::ControllerShape { .. }));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = DncConfig::with_dimensions(2, 3, 9, 4, 3);
        assert!(matches!(
            Dnc::with_lstm(config),
            Err(DncError::ReadHeadsExceeded { .. })
        ));
    }

    #[test]
    fn non_finite_init_is_a_config_error() {
        let noisy = DncConfig::from_toml("[init]\nmemory_noise = inf\n").expect("parse");
        assert!(matches!(Dnc::with_lstm(noisy), Err(DncError::Config(_))));

        let scaled = DncConfig::from_toml("[init]\nweight_scale = nan\n").expect("parse");
        assert!(matches!(Dnc::with_lstm(scaled), Err(DncError::Config(_))));
    }

    #[test]
    fn step_checks_input_length_first() {
        let layout = InterfaceLayout::new(2, 3);
        let mut dnc = fixed_engine(&vec![0.0; layout.len()]);
        let before = dnc.snapshot();
        let err = dnc.step(&[0.0; 5]).expect_err("length");
        assert!(matches!(err, DncError::InputLength { expected: 2, actual: 5 }));
        assert_eq!(dnc.snapshot(), before);
        assert_eq!(dnc.state(), EngineState::Ready);
    }

    #[test]
    fn forward_checks_output_length() {
        let layout = InterfaceLayout::new(2, 3);
        let mut dnc = fixed_engine(&vec![0.0; layout.len()]);
        let mut short = [0.0; 2];
        assert!(matches!(
            dnc.forward(&[0.0; 2], &mut short),
            Err(DncError::OutputLength { expected: 9, actual: 2 })
        ));
        assert_eq!(dnc.step_count(), 0);

        let mut out = [0.0; 9];
        dnc.forward(&[0.0; 2], &mut out).expect("forward");
        assert_eq!(&out[..], dnc.output());
        assert_eq!(&out[..3], &[0.5; 3]);
        assert_eq!(dnc.state(), EngineState::Stepping);
    }

    #[test]
    fn output_concatenates_hidden_and_reads() {
        let layout = InterfaceLayout::new(2, 3);
        let mut dnc = fixed_engine(&vec![0.0; layout.len()]);
        dnc.step(&[1.0, 1.0]).expect("step");
        assert_eq!(dnc.hidden(), &[0.5; 3]);
        assert_eq!(&dnc.output()[3..6], dnc.read_vector(0));
        assert_eq!(&dnc.output()[6..9], dnc.read_vector(1));
        assert_eq!(dnc.metrics().total_reads, 2);
    }

    #[test]
    fn allocation_write_lands_in_first_free_slot() {
        let layout = InterfaceLayout::new(2, 3);
        let raw = InterfaceBuilder::new(&layout)
            .write_gate_logits([-30.0, 30.0])
            .write_vector(&[1.0, 2.0, 3.0])
            .erase_all(30.0)
            .build();
        let mut dnc = fixed_engine(&raw);
        dnc.reset();
        dnc.step(&[0.0, 0.0]).expect("step");
        for (got, want) in dnc.memory().row(0).iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-4);
        }
        assert!(dnc.usage().usage()[0] > 0.99);
        assert_eq!(dnc.linkage().newest(), Some(0));

        dnc.step(&[0.0, 0.0]).expect("step");
        assert_eq!(dnc.linkage().newest(), Some(1));
        assert_eq!(dnc.linkage().successor_of(0), Some(1));
    }

    #[test]
    fn free_gated_retention_releases_read_slots() {
        let layout = InterfaceLayout::new(2, 3);
        let raw = InterfaceBuilder::new(&layout)
            .write_gate_logits([-30.0, 30.0])
            .write_vector(&[1.0, 0.0, 0.0])
            .erase_all(30.0)
            .free_gate_logits(&[30.0, 30.0])
            .build();
        let mut config = small_config();
        config.addressing.retention = RetentionMode::FreeGated;
        let mut output = vec![0.0; 3];
        output.extend_from_slice(&raw);
        let controller = FixedController::new(config.controller_input_size(), output);
        let mut fixed = Dnc::<FixedController>::new(config, controller).expect("engine");
        fixed.reset();
        fixed.step(&[0.0, 0.0]).expect("step");
        // Uniform previous reads with free gates ≈ 1 scale usage by (1 − 1/4)².
        let u0 = fixed.usage().usage()[0];
        assert!((u0 - 0.5625).abs() < 1e-3, "usage {u0}");
    }

    #[test]
    fn reset_returns_to_ready() {
        let mut dnc = Dnc::with_lstm(small_config()).expect("engine");
        for _ in 0..3 {
            dnc.step(&[0.1, -0.1]).expect("step");
        }
        dnc.reset();
        assert_eq!(dnc.state(), EngineState::Ready);
        assert_eq!(dnc.step_count(), 0);
        assert!(dnc.usage().usage().iter().all(|&u| u == 0.0));
        assert_eq!(dnc.usage().free_slots(), &[0, 1, 2, 3]);
        assert!(dnc.linkage().is_empty());
        assert!(dnc.memory().as_flat().iter().all(|&v| v == 0.0));
        assert_eq!(dnc.metrics(), MetricsSnapshot::default());
        for head in dnc.read_heads() {
            assert!(head.weighting().iter().all(|&w| (w - 0.25).abs() < 1e-6));
        }
    }

    #[test]
    fn snapshot_restore_resumes_identically() {
        let layout = InterfaceLayout::new(2, 3);
        let raw = InterfaceBuilder::new(&layout)
            .write_gate_logits([0.0, 2.0])
            .write_vector(&[0.3, -0.2, 0.9])
            .read_gate_logits(0, [0.0, 3.0, -3.0])
            .read_key(0, &[0.3, -0.2, 0.9])
            .build();
        let mut a = fixed_engine(&raw);
        a.step(&[0.0, 0.0]).expect("step");
        let snap = a.snapshot();

        let mut b = fixed_engine(&raw);
        b.restore(&snap).expect("restore");
        assert_eq!(b.snapshot(), snap);
        a.step(&[0.0, 0.0]).expect("step");
        b.step(&[0.0, 0.0]).expect("step");
        assert_eq!(a.output(), b.output());
        assert_eq!(a.memory(), b.memory());
    }

    #[test]
    fn restore_rejects_foreign_shape() {
        let mut dnc = Dnc::with_lstm(small_config()).expect("engine");
        let other = Dnc::with_lstm(DncConfig::with_dimensions(2, 3, 2, 8, 3)).expect("engine");
        let before = dnc.snapshot();
        assert!(matches!(
            dnc.restore(&other.snapshot()),
            Err(DncError::SnapshotShape(_))
        ));
        assert_eq!(dnc.snapshot(), before);
    }

    #[test]
    fn footprint_covers_memory() {
        let dnc = Dnc::with_lstm(small_config()).expect("engine");
        assert!(dnc.footprint_bytes() > dnc.memory().size_bytes());
    }
}
