//! Error types for the DNC memory engine.
//!
//! Only configuration and buffer-shape problems are errors. Numeric
//! degeneracies inside a step (zero-norm rows, saturated gates) resolve
//! to defined values and are never surfaced here.

use thiserror::Error;

/// Top-level error type for all engine operations.
#[derive(Error, Debug)]
pub enum DncError {
    /// More read heads were requested than the engine supports.
    #[error("Read head count exceeded: requested {requested}, max {max}")]
    ReadHeadsExceeded {
        /// Requested head count.
        requested: usize,
        /// Static maximum.
        max: usize,
    },

    /// More memory locations were requested than the engine supports.
    #[error("Memory location count exceeded: requested {requested}, max {max}")]
    LocationsExceeded {
        /// Requested location count.
        requested: usize,
        /// Static maximum.
        max: usize,
    },

    /// At least one read head is required to define the output layout.
    #[error("At least one read head is required")]
    NoReadHeads,

    /// A dimension that must be non-zero was zero.
    #[error("Dimension `{0}` must be non-zero")]
    EmptyDimension(&'static str),

    /// The controller's input/output sizes do not match the engine layout.
    #[error(
        "Controller shape mismatch: input {actual_input} (expected {expected_input}), \
         output {actual_output} (expected {expected_output})"
    )]
    ControllerShape {
        /// Input size the engine will feed.
        expected_input: usize,
        /// Input size the controller accepts.
        actual_input: usize,
        /// Output size the engine needs (hidden + interface).
        expected_output: usize,
        /// Output size the controller produces.
        actual_output: usize,
    },

    /// The external input passed to a step had the wrong length.
    #[error("Input length mismatch: expected {expected}, got {actual}")]
    InputLength {
        /// Configured input size.
        expected: usize,
        /// Length of the slice passed in.
        actual: usize,
    },

    /// The output buffer passed to `forward` had the wrong length.
    #[error("Output length mismatch: expected {expected}, got {actual}")]
    OutputLength {
        /// Engine output size.
        expected: usize,
        /// Length of the slice passed in.
        actual: usize,
    },

    /// A snapshot does not fit this engine's dimensions.
    #[error("Snapshot shape mismatch: {0}")]
    SnapshotShape(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, DncError>;
