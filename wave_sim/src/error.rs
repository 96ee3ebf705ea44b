//! Error types for the wave engine

/// Failures surfaced by the engine.
///
/// `NoComputeDevice` and `KernelUnavailable` are raised while building a
/// backend and mean the build is unusable. The remaining variants are
/// recoverable: callers log them and keep the previous frame.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No adapter/device could back the requested compute path
    #[error("no compute device: {0}")]
    NoComputeDevice(String),

    /// The compute kernel failed to compile or lacks its entry point
    #[error("compute kernel `{entry_point}` unavailable: {reason}")]
    KernelUnavailable { entry_point: String, reason: String },

    /// Simulation parameters outside their valid ranges
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Engine configuration outside its valid ranges
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Vertex storage could not grow to the requested size
    #[error("could not allocate {vertices} mesh vertices")]
    MeshAllocation { vertices: usize },

    /// A launched field computation failed before producing data
    #[error("field computation failed: {0}")]
    ComputeFailed(String),
}

impl From<common::GraphicsError> for EngineError {
    fn from(err: common::GraphicsError) -> Self {
        EngineError::NoComputeDevice(err.to_string())
    }
}
