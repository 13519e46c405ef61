//! Error types shared by all CAD operations

use thiserror::Error;

use crate::registry::Handle;

/// Errors surfaced by the registry, builders and mesh bridge.
///
/// The variants split along who can fix the problem: `NotFound` and
/// `InvalidParameter` are caller mistakes caught before any kernel
/// call, `Geometry` is a construction the kernel rejected, `Io` is a
/// filesystem failure during export.
#[derive(Debug, Error)]
pub enum CadError {
    #[error("no shape registered under handle {0}")]
    NotFound(Handle),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("geometry construction failed: {0}")]
    Geometry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CAD operations
pub type CadResult<T> = Result<T, CadError>;
