//! Error types for `quarry-argon2-gpu`.

use thiserror::Error;

/// Errors produced by the Argon2 evaluation core.
///
/// Every OpenCL call in the pipeline is wrapped so that a non-success status
/// surfaces as [`EngineError::Device`] with a note on which transfer or launch
/// failed. The autotune sweep is the one place device errors are swallowed:
/// it truncates the sweep and keeps the best geometry measured so far.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Encoded hash failed to parse (variant tag, cost fields, base64).
    #[error("malformed argon2 hash: {0}")]
    Decode(String),

    /// Encoded hash parsed but asks for something the engine does not
    /// evaluate (version 0x10, tags shorter than 8 bytes).
    #[error("unsupported argon2 hash: {0}")]
    Unsupported(String),

    /// The engine was driven outside its planned configuration: an invalid
    /// work-group geometry, a salt outside the surveyed target set, a batch
    /// beyond capacity. These are assertions against the caller and the
    /// autotuner, not against user input.
    #[error("configuration error: {0}")]
    Config(String),

    /// A device call returned a non-success status.
    #[error("device error: {0}")]
    Device(String),

    /// The memory planner halved the batch down to nothing and still could
    /// not allocate the scratch buffer.
    #[error("device memory plan failed: {0}")]
    OutOfMemory(String),
}
