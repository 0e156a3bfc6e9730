//! Fitting a B-spline surface through a grid of points.

use super::bspline::{BSplineSurface, basis};
use super::{PointGrid, SurfaceError};
use crate::float_types::{EPSILON, Real};
use nalgebra::{DMatrix, Point3};

/// Builder for [`BSplineSurface`]s passing through (or near) a [`PointGrid`].
///
/// With the default settings every point becomes a control point and the
/// surface interpolates the grid. Asking for fewer control points with
/// [`with_poles`](Self::with_poles) turns the fit into a least-squares
/// approximation, for which the degree is raised from `degree_min` towards
/// `degree_max` until the surface is within `tolerance` of every point.
///
/// Degrees are capped at one less than the number of control points in each
/// direction, so a 2×2 grid always yields a bilinear patch.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceApproximation {
    pub degree_min: usize,
    pub degree_max: usize,
    /// Largest accepted distance between the surface and a grid point
    pub tolerance: Real,
    /// Control points along U and V; `None` means one per grid point
    pub poles: Option<(usize, usize)>,
}

impl Default for SurfaceApproximation {
    fn default() -> Self {
        SurfaceApproximation {
            degree_min: 3,
            degree_max: 8,
            tolerance: 1e-3,
            poles: None,
        }
    }
}

impl SurfaceApproximation {
    pub fn with_degrees(mut self, min: usize, max: usize) -> Self {
        self.degree_min = min;
        self.degree_max = max;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_poles(mut self, along_u: usize, along_v: usize) -> Self {
        self.poles = Some((along_u, along_v));
        self
    }

    /// Fit a surface to `grid`.
    ///
    /// ## Errors
    /// * `TooFewPoints` / `MissingPoint` for an incomplete grid
    /// * `InvalidDegree` when `degree_min > degree_max`
    /// * `DegeneratePoints` when every row or column collapses to a point
    /// * `SingularSystem` when the fitting equations have no solution
    /// * `ToleranceNotReached` when even the best degree misses the points
    ///   by more than ten times the tolerance
    pub fn approximate(&self, grid: &PointGrid) -> Result<BSplineSurface, SurfaceError> {
        let points = grid.dense()?;
        if self.degree_min > self.degree_max {
            return Err(SurfaceError::InvalidDegree {
                min: self.degree_min,
                max: self.degree_max,
            });
        }

        let (rows, cols) = (grid.rows(), grid.cols());
        let (poles_u, poles_v) = match self.poles {
            Some((u, v)) => (u.clamp(2, rows), v.clamp(2, cols)),
            None => (rows, cols),
        };

        let columns: Vec<Vec<Point3<Real>>> = (0..cols)
            .map(|j| points.iter().map(|row| row[j]).collect())
            .collect();
        let params_u = averaged_chord_parameters(&columns)?;
        let params_v = averaged_chord_parameters(&points)?;

        let mut best: Option<(BSplineSurface, Real)> = None;
        let mut last_degrees = None;
        for degree in self.degree_min..=self.degree_max {
            let degree_u = degree.clamp(1, poles_u - 1);
            let degree_v = degree.clamp(1, poles_v - 1);
            if last_degrees == Some((degree_u, degree_v)) {
                break;
            }
            last_degrees = Some((degree_u, degree_v));

            let knots_u = knot_vector(&params_u, degree_u, poles_u);
            let knots_v = knot_vector(&params_v, degree_v, poles_v);

            // fit along U for every grid column, then along V for every U pole
            let mut intermediate = Vec::with_capacity(cols);
            for column in &columns {
                intermediate.push(fit_curve(&params_u, &knots_u, degree_u, poles_u, column)?);
            }
            let mut control_points = Vec::with_capacity(poles_u);
            for k in 0..poles_u {
                let row: Vec<Point3<Real>> = intermediate.iter().map(|c| c[k]).collect();
                control_points.push(fit_curve(&params_v, &knots_v, degree_v, poles_v, &row)?);
            }

            let surface =
                BSplineSurface::new(degree_u, degree_v, knots_u, knots_v, control_points);
            let deviation = max_deviation(&surface, &points, &params_u, &params_v);
            tracing::debug!(degree_u, degree_v, deviation, "surface fit");

            if deviation <= self.tolerance {
                return Ok(surface);
            }
            if best.as_ref().is_none_or(|(_, d)| deviation < *d) {
                best = Some((surface, deviation));
            }
        }

        match best {
            Some((surface, deviation)) if deviation <= 10.0 * self.tolerance => {
                tracing::warn!(
                    deviation,
                    tolerance = self.tolerance,
                    "surface accepted outside tolerance"
                );
                Ok(surface)
            },
            Some((_, deviation)) => Err(SurfaceError::ToleranceNotReached {
                deviation,
                tolerance: self.tolerance,
            }),
            None => Err(SurfaceError::InvalidDegree {
                min: self.degree_min,
                max: self.degree_max,
            }),
        }
    }
}

/// Chord-length parameters in `[0, 1]`, averaged over several point rows.
///
/// Rows whose points all coincide do not contribute.
fn averaged_chord_parameters(rows: &[Vec<Point3<Real>>]) -> Result<Vec<Real>, SurfaceError> {
    let count = rows.first().map_or(0, Vec::len);
    let mut sum = vec![0.0; count];
    let mut used = 0usize;

    for row in rows {
        let chords: Vec<Real> = row.windows(2).map(|w| (w[1] - w[0]).norm()).collect();
        let total: Real = chords.iter().sum();
        if total < EPSILON {
            continue;
        }
        let mut acc = 0.0;
        for (k, chord) in chords.iter().enumerate() {
            acc += chord;
            sum[k + 1] += acc / total;
        }
        used += 1;
    }

    if used == 0 {
        return Err(SurfaceError::DegeneratePoints);
    }
    let params: Vec<Real> = sum.iter().map(|s| s / used as Real).collect();
    if params.windows(2).any(|w| w[1] - w[0] < EPSILON) {
        return Err(SurfaceError::DegeneratePoints);
    }
    Ok(params)
}

/// Clamped knot vector for `poles` control points over the data `params`.
///
/// Interpolation averages the parameters; least squares spreads the knots so
/// that every span holds data.
fn knot_vector(params: &[Real], degree: usize, poles: usize) -> Vec<Real> {
    let mut knots = vec![0.0; degree + 1];
    let interior = poles - 1 - degree;

    if poles == params.len() {
        for j in 1..=interior {
            let mean = params[j..j + degree].iter().sum::<Real>() / degree as Real;
            knots.push(mean);
        }
    } else {
        let d = params.len() as Real / (poles - degree) as Real;
        for j in 1..=interior {
            let i = (j as Real * d).floor() as usize;
            let alpha = j as Real * d - i as Real;
            knots.push((1.0 - alpha) * params[i - 1] + alpha * params[i]);
        }
    }

    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

/// Control points of the curve through (or nearest to) `data` at `params`
fn fit_curve(
    params: &[Real],
    knots: &[Real],
    degree: usize,
    poles: usize,
    data: &[Point3<Real>],
) -> Result<Vec<Point3<Real>>, SurfaceError> {
    let n = DMatrix::from_fn(params.len(), poles, |row, col| {
        basis(col, degree, params[row], knots)
    });
    let q = DMatrix::from_fn(data.len(), 3, |row, c| data[row][c]);

    let solution = if params.len() == poles {
        n.lu().solve(&q)
    } else {
        let nt = n.transpose();
        (&nt * &n).lu().solve(&(&nt * &q))
    }
    .ok_or(SurfaceError::SingularSystem)?;

    Ok((0..poles)
        .map(|k| Point3::new(solution[(k, 0)], solution[(k, 1)], solution[(k, 2)]))
        .collect())
}

fn max_deviation(
    surface: &BSplineSurface,
    points: &[Vec<Point3<Real>>],
    params_u: &[Real],
    params_v: &[Real],
) -> Real {
    points
        .iter()
        .zip(params_u)
        .flat_map(|(row, &u)| {
            row.iter()
                .zip(params_v)
                .map(move |(p, &v)| (surface.evaluate(u, v) - p).norm())
        })
        .fold(0.0, Real::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wavy_grid(n: usize) -> PointGrid {
        let rows: Vec<Vec<Point3<Real>>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let (x, y) = (i as Real, j as Real);
                        Point3::new(x, y, (x * 0.7).sin() + (y * 0.5).cos())
                    })
                    .collect()
            })
            .collect();
        PointGrid::from_rows(&rows).unwrap()
    }

    #[test]
    fn interpolation_passes_through_every_point() {
        let grid = wavy_grid(6);
        let surface = SurfaceApproximation::default().approximate(&grid).unwrap();
        assert_eq!(surface.degree_u(), 3);
        assert_eq!(surface.pole_counts(), (6, 6));
        // corners sit exactly on the clamped ends of the domain
        assert_relative_eq!(surface.evaluate(0.0, 0.0), grid.get(0, 0).unwrap(), epsilon = 1e-9);
        assert_relative_eq!(surface.evaluate(1.0, 1.0), grid.get(5, 5).unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn degrees_are_capped_by_the_grid() {
        let grid = wavy_grid(3);
        let surface = SurfaceApproximation::default().approximate(&grid).unwrap();
        assert_eq!((surface.degree_u(), surface.degree_v()), (2, 2));
    }

    #[test]
    fn least_squares_on_a_plane_is_exact() {
        let rows: Vec<Vec<Point3<Real>>> = (0..8)
            .map(|i| {
                (0..8)
                    .map(|j| Point3::new(i as Real, j as Real, 0.5 * i as Real - 0.25 * j as Real))
                    .collect()
            })
            .collect();
        let grid = PointGrid::from_rows(&rows).unwrap();
        let surface = SurfaceApproximation::default()
            .with_poles(4, 4)
            .approximate(&grid)
            .unwrap();
        assert_eq!(surface.pole_counts(), (4, 4));
        let p = surface.evaluate(0.5, 0.5);
        assert_relative_eq!(p.z, 0.5 * p.x - 0.25 * p.y, epsilon = 1e-9);
    }

    #[test]
    fn knot_vectors_are_clamped() {
        let params = [0.0, 0.2, 0.5, 0.7, 1.0];
        let knots = knot_vector(&params, 2, 5);
        assert_eq!(knots.len(), 5 + 2 + 1);
        assert_eq!(&knots[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&knots[5..], &[1.0, 1.0, 1.0]);
        assert_relative_eq!(knots[3], 0.35, epsilon = 1e-12);
        assert_relative_eq!(knots[4], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn inverted_degree_range_is_rejected() {
        let grid = wavy_grid(4);
        let err = SurfaceApproximation::default()
            .with_degrees(5, 2)
            .approximate(&grid)
            .unwrap_err();
        assert_eq!(err, SurfaceError::InvalidDegree { min: 5, max: 2 });
    }
}
