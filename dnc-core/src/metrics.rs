//! Per-instance performance counters.
//!
//! Each engine owns one [`EngineMetrics`]; nothing here is global. The
//! counters are plain integers updated on the step path and copied out
//! through [`EngineMetrics::snapshot`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters accumulated by one engine since construction or the last reset.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    steps: u64,
    total_writes: u64,
    total_reads: u64,
    controller_ns: u64,
    memory_ns: u64,
    total_ns: u64,
    last_step_ns: u64,
}

impl EngineMetrics {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            steps: 0,
            total_writes: 0,
            total_reads: 0,
            controller_ns: 0,
            memory_ns: 0,
            total_ns: 0,
            last_step_ns: 0,
        }
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Account for one completed step.
    pub fn record_step(&mut self, reads: usize, controller: Duration, memory: Duration) {
        let controller_ns = saturating_nanos(controller);
        let memory_ns = saturating_nanos(memory);
        let step_ns = controller_ns.saturating_add(memory_ns);

        self.steps += 1;
        self.total_writes += 1;
        self.total_reads += reads as u64;
        self.controller_ns = self.controller_ns.saturating_add(controller_ns);
        self.memory_ns = self.memory_ns.saturating_add(memory_ns);
        self.total_ns = self.total_ns.saturating_add(step_ns);
        self.last_step_ns = step_ns;
    }

    /// Copy the counters out.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            steps: self.steps,
            total_writes: self.total_writes,
            total_reads: self.total_reads,
            controller_ns: self.controller_ns,
            memory_ns: self.memory_ns,
            total_ns: self.total_ns,
            last_step_ns: self.last_step_ns,
        }
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Steps completed.
    pub steps: u64,
    /// Write operations performed (one per step).
    pub total_writes: u64,
    /// Read operations performed (one per head per step).
    pub total_reads: u64,
    /// Time spent inside the controller.
    pub controller_ns: u64,
    /// Time spent in addressing, writes and reads.
    pub memory_ns: u64,
    /// Controller plus memory time.
    pub total_ns: u64,
    /// Duration of the most recent step.
    pub last_step_ns: u64,
}

impl MetricsSnapshot {
    /// Mean step duration in nanoseconds, or 0 before the first step.
    #[must_use]
    pub fn mean_step_ns(&self) -> u64 {
        if self.steps == 0 { 0 } else { self.total_ns / self.steps }
    }

    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP dnc_steps_total Steps completed\n\
             # TYPE dnc_steps_total counter\n\
             dnc_steps_total {}\n\
             # HELP dnc_writes_total Memory write operations\n\
             # TYPE dnc_writes_total counter\n\
             dnc_writes_total {}\n\
             # HELP dnc_reads_total Memory read operations\n\
             # TYPE dnc_reads_total counter\n\
             dnc_reads_total {}\n\
             # HELP dnc_time_ns_total Time spent stepping, by phase\n\
             # TYPE dnc_time_ns_total counter\n\
             dnc_time_ns_total{{phase=\"controller\"}} {}\n\
             dnc_time_ns_total{{phase=\"memory\"}} {}\n\
             # HELP dnc_last_step_ns Duration of the most recent step\n\
             # TYPE dnc_last_step_ns gauge\n\
             dnc_last_step_ns {}\n",
            self.steps,
            self.total_writes,
            self.total_reads,
            self.controller_ns,
            self.memory_ns,
            self.last_step_ns,
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing span names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::span!` around the step phases.
pub mod spans {
    /// One full step.
    pub const STEP: &str = "dnc::step";
    /// Controller forward pass.
    pub const CONTROLLER: &str = "dnc::controller";
    /// Write addressing and erase-write.
    pub const WRITE: &str = "dnc::write";
    /// Read addressing and reads.
    pub const READ: &str = "dnc::read";
    /// Memory analysis.
    pub const ANALYZE: &str = "dnc::analyze";
}
