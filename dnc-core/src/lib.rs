//! # DNC Core Library
//!
//! The external memory engine of a Differentiable Neural Computer: a
//! fixed-capacity matrix of `N` vectors, read by `R` attention heads and
//! written by one, driven once per timestep by a recurrent controller.
//!
//! - **Content addressing**: cosine similarity against every location
//! - **Allocation addressing**: least-used-first slot preference
//! - **Temporal linkage**: precedence plus a bounded write-order history
//!
//! ```
//! use dnc_core::{Dnc, DncConfig};
//!
//! let config = DncConfig::with_dimensions(8, 16, 2, 32, 8);
//! let mut dnc = Dnc::with_lstm(config).expect("valid config");
//! dnc.step(&[0.0; 8]).expect("input is 8 wide");
//! assert_eq!(dnc.output().len(), 16 + 2 * 8);
//! assert_eq!(dnc.metrics().total_writes, 1);
//! ```
//!
//! ## Resource Contract
//!
//! Every buffer is allocated once in the constructor. A steady-state
//! [`Dnc::step`] performs no heap allocation, no I/O and never blocks.
//! An instance assumes a single owner; callers sharing one across threads
//! provide their own mutual exclusion.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod addressing;
pub mod analysis;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod heads;
pub mod interface;
pub mod linkage;
pub mod memory;
pub mod metrics;
pub mod snapshot;
pub mod usage;

pub use addressing::{DefaultKernel, LaneKernel, ScalarKernel, SimilarityKernel};
pub use analysis::MemoryAnalysis;
pub use config::{DncConfig, RetentionMode};
pub use controller::{Controller, FixedController, LstmController};
pub use engine::{Dnc, EngineState};
pub use error::{DncError, Result};
pub use interface::{InterfaceBuilder, InterfaceLayout, InterfaceView};
pub use metrics::MetricsSnapshot;
pub use snapshot::MemorySnapshot;
