//! Free-form surfaces: scattered points on a grid, fitted with a B-spline.
//!
//! ```
//! use bim2se::surface::{PointGrid, SurfaceApproximation};
//! use nalgebra::Point3;
//!
//! let mut grid = PointGrid::new(2, 2);
//! grid.set(0, 0, Point3::new(0.0, 0.0, 0.0));
//! grid.set(0, 1, Point3::new(0.0, 1.0, 0.0));
//! grid.set(1, 0, Point3::new(1.0, 0.0, 0.0));
//! grid.set(1, 1, Point3::new(1.0, 1.0, 1.0));
//!
//! let surface = SurfaceApproximation::default().approximate(&grid).unwrap();
//! assert_eq!(surface.degree_u(), 1);
//! ```

mod approximation;
mod bspline;

pub use approximation::SurfaceApproximation;
pub use bspline::{BSplineCurve, BSplineSurface};

use crate::float_types::Real;
use nalgebra::Point3;

/// Why a surface could not be built
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error("a surface needs at least 2x2 points, got {rows}x{cols}")]
    TooFewPoints { rows: usize, cols: usize },
    #[error("point ({row}, {col}) was never set")]
    MissingPoint { row: usize, col: usize },
    #[error("points are coincident in one parametric direction")]
    DegeneratePoints,
    #[error("degree range {min}..={max} is empty")]
    InvalidDegree { min: usize, max: usize },
    #[error("the fitting system is singular")]
    SingularSystem,
    #[error("best fit deviates {deviation:.3e} from the points, tolerance is {tolerance:.3e}")]
    ToleranceNotReached { deviation: Real, tolerance: Real },
}

/// A rectangular array of points; `(i, j)` runs along U then V.
#[derive(Debug, Clone, PartialEq)]
pub struct PointGrid {
    rows: usize,
    cols: usize,
    points: Vec<Option<Point3<Real>>>,
}

impl PointGrid {
    /// Empty grid with `rows` points along U and `cols` along V
    pub fn new(rows: usize, cols: usize) -> Self {
        PointGrid {
            rows,
            cols,
            points: vec![None; rows * cols],
        }
    }

    /// Grid filled row by row; rows must all have the same length.
    pub fn from_rows(rows: &[Vec<Point3<Real>>]) -> Option<Self> {
        let cols = rows.first()?.len();
        if rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        let mut grid = PointGrid::new(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            for (j, p) in row.iter().enumerate() {
                grid.set(i, j, *p);
            }
        }
        Some(grid)
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Set point `(i, j)`; out-of-range indices are ignored and return `false`.
    pub fn set(&mut self, i: usize, j: usize, point: Point3<Real>) -> bool {
        if i >= self.rows || j >= self.cols {
            return false;
        }
        self.points[i * self.cols + j] = Some(point);
        true
    }

    pub fn get(&self, i: usize, j: usize) -> Option<Point3<Real>> {
        if i >= self.rows || j >= self.cols {
            return None;
        }
        self.points[i * self.cols + j]
    }

    /// All points as a dense `rows × cols` array, or the first missing index
    pub(crate) fn dense(&self) -> Result<Vec<Vec<Point3<Real>>>, SurfaceError> {
        if self.rows < 2 || self.cols < 2 {
            return Err(SurfaceError::TooFewPoints {
                rows: self.rows,
                cols: self.cols,
            });
        }
        (0..self.rows)
            .map(|i| {
                (0..self.cols)
                    .map(|j| {
                        self.get(i, j)
                            .ok_or(SurfaceError::MissingPoint { row: i, col: j })
                    })
                    .collect()
            })
            .collect()
    }
}
