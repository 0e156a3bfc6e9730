//! Geometry validation errors and the pipeline error type

use crate::float_types::Real;
use crate::io::IoError;
use crate::surface::SurfaceError;
use nalgebra::Point3;

/// Problems detected while building or measuring a shape
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A primitive was asked for a zero, negative or non-finite dimension
    #[error("(InvalidDimension) {name} must be positive and finite, got {value}")]
    InvalidDimension { name: &'static str, value: Real },
    /// A ring or tessellation has fewer than the minimal number of points
    #[error("(TooFewPoints) expected at least {expected}, got {got}")]
    TooFewPoints { expected: usize, got: usize },
    /// The coordinate has a NaN or infinite
    #[error("(InvalidCoordinate) The coordinate ({0}) has a NaN or infinite")]
    InvalidCoordinate(Point3<Real>),
    /// A transform matrix could not be inverted
    #[error("(SingularTransform) the transform matrix is not invertible")]
    SingularTransform,
    /// The operation needs at least one face
    #[error("(NullShape) the shape has no faces")]
    NullShape,
    /// A shape was asked to be cut into zero slices
    #[error("(NoSlices) at least one slice is required")]
    NoSlices,
    /// A splitting tool does not cover the shape it should split
    #[error("(ToolTooSmall) {0}")]
    ToolTooSmall(String),
    /// Indicates an inconsistency while building a triangle mesh
    #[error(transparent)]
    TriMesh(#[from] crate::float_types::parry3d::shape::TriMeshBuilderError),
    /// In general, anything else
    #[error("{0}")]
    Other(String),
}

/// Failures that abort the BIM2SE pipeline.
///
/// Geometric failures are normally handled by the driver's fallback branches;
/// only those that leave nothing to export end up here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("geometry: {0}")]
    Geometry(#[from] ValidationError),
    #[error("surface: {0}")]
    Surface(#[from] SurfaceError),
    #[error("io: {0}")]
    Io(#[from] IoError),
}
