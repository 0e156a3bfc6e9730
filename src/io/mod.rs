//! Reading and writing shapes: STL in both directions, STEP out.

pub mod step;
pub mod stl;

pub use step::StepWriter;

/// Generic I/O and format‑conversion errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("std::io::Error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("Input is malformed: {0}")]
    MalformedInput(String),

    /// The input parsed but produced no usable face
    #[error("{0} yields a null shape")]
    NullShape(String),

    #[error("STEP export failed: {0}")]
    Step(String),
}
