//! Non-rational B-spline curves and tensor-product surfaces.

use crate::errors::ValidationError;
use crate::float_types::{EPSILON, Real};
use crate::mesh::Mesh;
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use geo::{Coord, LineString, Polygon as GeoPolygon};
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;

/// Finest tessellation `to_mesh_with_deflection` will go to, per direction
pub const MAX_SEGMENTS: usize = 256;

/// Cox-de Boor basis function `N_{i,p}(u)`.
///
/// The last non-empty knot span is closed on the right so that `u` equal to
/// the end of the domain evaluates to the last control point.
pub(crate) fn basis(i: usize, p: usize, u: Real, knots: &[Real]) -> Real {
    if p == 0 {
        let end = knots[knots.len() - 1];
        let in_span = u >= knots[i] && u < knots[i + 1];
        let at_end = u >= end && knots[i + 1] >= end && knots[i] < knots[i + 1];
        return if in_span || at_end { 1.0 } else { 0.0 };
    }
    let denom1 = knots[i + p] - knots[i];
    let denom2 = knots[i + p + 1] - knots[i + 1];
    let term1 = if denom1.abs() < EPSILON {
        0.0
    } else {
        (u - knots[i]) / denom1 * basis(i, p - 1, u, knots)
    };
    let term2 = if denom2.abs() < EPSILON {
        0.0
    } else {
        (knots[i + p + 1] - u) / denom2 * basis(i + 1, p - 1, u, knots)
    };
    term1 + term2
}

/// All `count` basis functions of degree `p` at `u`
pub(crate) fn basis_row(p: usize, u: Real, knots: &[Real], count: usize) -> Vec<Real> {
    (0..count).map(|i| basis(i, p, u, knots)).collect()
}

fn clamp_to(knots: &[Real], t: Real) -> Real {
    t.clamp(knots[0], knots[knots.len() - 1])
}

/// A B-spline curve in 3D
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    degree: usize,
    knots: Vec<Real>,
    control_points: Vec<Point3<Real>>,
}

impl BSplineCurve {
    /// `knots` must hold `control_points.len() + degree + 1` non-decreasing values.
    pub(crate) fn new(degree: usize, knots: Vec<Real>, control_points: Vec<Point3<Real>>) -> Self {
        debug_assert_eq!(knots.len(), control_points.len() + degree + 1);
        BSplineCurve {
            degree,
            knots,
            control_points,
        }
    }

    pub const fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[Real] {
        &self.knots
    }

    pub fn control_points(&self) -> &[Point3<Real>] {
        &self.control_points
    }

    pub fn domain(&self) -> (Real, Real) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Point at parameter `t`, clamped to the domain
    pub fn evaluate(&self, t: Real) -> Point3<Real> {
        let t = clamp_to(&self.knots, t);
        let weights = basis_row(self.degree, t, &self.knots, self.control_points.len());
        let coords = self
            .control_points
            .iter()
            .zip(weights)
            .fold(Vector3::zeros(), |acc, (p, w)| acc + p.coords * w);
        Point3::from(coords)
    }
}

/// A tensor-product B-spline surface.
///
/// Control points are indexed `[i][j]` with `i` along U and `j` along V.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSurface {
    degree_u: usize,
    degree_v: usize,
    knots_u: Vec<Real>,
    knots_v: Vec<Real>,
    control_points: Vec<Vec<Point3<Real>>>,
}

impl BSplineSurface {
    pub(crate) fn new(
        degree_u: usize,
        degree_v: usize,
        knots_u: Vec<Real>,
        knots_v: Vec<Real>,
        control_points: Vec<Vec<Point3<Real>>>,
    ) -> Self {
        debug_assert_eq!(knots_u.len(), control_points.len() + degree_u + 1);
        debug_assert!(
            control_points
                .iter()
                .all(|row| knots_v.len() == row.len() + degree_v + 1)
        );
        BSplineSurface {
            degree_u,
            degree_v,
            knots_u,
            knots_v,
            control_points,
        }
    }

    pub const fn degree_u(&self) -> usize {
        self.degree_u
    }

    pub const fn degree_v(&self) -> usize {
        self.degree_v
    }

    pub fn knots_u(&self) -> &[Real] {
        &self.knots_u
    }

    pub fn knots_v(&self) -> &[Real] {
        &self.knots_v
    }

    pub fn control_points(&self) -> &[Vec<Point3<Real>>] {
        &self.control_points
    }

    /// Number of control points along U and V
    pub fn pole_counts(&self) -> (usize, usize) {
        (
            self.control_points.len(),
            self.control_points.first().map_or(0, Vec::len),
        )
    }

    /// Parameter ranges `((u0, u1), (v0, v1))`
    pub fn domain(&self) -> ((Real, Real), (Real, Real)) {
        (
            (self.knots_u[0], self.knots_u[self.knots_u.len() - 1]),
            (self.knots_v[0], self.knots_v[self.knots_v.len() - 1]),
        )
    }

    /// Point at `(u, v)`; parameters are clamped to the domain.
    pub fn evaluate(&self, u: Real, v: Real) -> Point3<Real> {
        let u = clamp_to(&self.knots_u, u);
        let v = clamp_to(&self.knots_v, v);
        let (nu, nv) = self.pole_counts();
        let bu = basis_row(self.degree_u, u, &self.knots_u, nu);
        let bv = basis_row(self.degree_v, v, &self.knots_v, nv);

        let mut coords = Vector3::zeros();
        for (row, wu) in self.control_points.iter().zip(&bu) {
            if *wu == 0.0 {
                continue;
            }
            for (p, wv) in row.iter().zip(&bv) {
                coords += p.coords * (wu * wv);
            }
        }
        Point3::from(coords)
    }

    /// The four boundary curves: `u = u0`, `u = u1` (both running along V),
    /// then `v = v0`, `v = v1` (both running along U).
    ///
    /// Clamped knot vectors make the boundary control rows the curves' own.
    pub fn boundary_curves(&self) -> [BSplineCurve; 4] {
        let (nu, _) = self.pole_counts();
        let column = |j: usize| -> Vec<Point3<Real>> {
            self.control_points.iter().map(|row| row[j]).collect()
        };
        let last_v = self.control_points.first().map_or(0, |r| r.len().saturating_sub(1));
        [
            BSplineCurve::new(
                self.degree_v,
                self.knots_v.clone(),
                self.control_points[0].clone(),
            ),
            BSplineCurve::new(
                self.degree_v,
                self.knots_v.clone(),
                self.control_points[nu - 1].clone(),
            ),
            BSplineCurve::new(self.degree_u, self.knots_u.clone(), column(0)),
            BSplineCurve::new(self.degree_u, self.knots_u.clone(), column(last_v)),
        ]
    }

    /// Points at `(seg_u + 1) × (seg_v + 1)` evenly spaced parameters
    pub fn sample_grid(&self, seg_u: usize, seg_v: usize) -> Vec<Vec<Point3<Real>>> {
        let ((u0, u1), (v0, v1)) = self.domain();
        (0..=seg_u)
            .map(|i| {
                let u = u0 + (u1 - u0) * i as Real / seg_u as Real;
                (0..=seg_v)
                    .map(|j| self.evaluate(u, v0 + (v1 - v0) * j as Real / seg_v as Real))
                    .collect()
            })
            .collect()
    }

    /// Largest distance between the surface and its `seg_u × seg_v` triangulation,
    /// measured at cell centres and edge midpoints.
    fn chordal_deviation(&self, seg_u: usize, seg_v: usize) -> Real {
        let ((u0, u1), (v0, v1)) = self.domain();
        let du = (u1 - u0) / seg_u as Real;
        let dv = (v1 - v0) / seg_v as Real;
        let grid = self.sample_grid(seg_u, seg_v);

        let mut worst: Real = 0.0;
        for i in 0..seg_u {
            for j in 0..seg_v {
                let u = u0 + du * i as Real;
                let v = v0 + dv * j as Real;
                let diagonal = Point3::from((grid[i][j].coords + grid[i + 1][j + 1].coords) * 0.5);
                let along_u = Point3::from((grid[i][j].coords + grid[i + 1][j].coords) * 0.5);
                let along_v = Point3::from((grid[i][j].coords + grid[i][j + 1].coords) * 0.5);
                worst = worst
                    .max((self.evaluate(u + du * 0.5, v + dv * 0.5) - diagonal).norm())
                    .max((self.evaluate(u + du * 0.5, v) - along_u).norm())
                    .max((self.evaluate(u, v + dv * 0.5) - along_v).norm());
            }
        }
        worst
    }

    /// Segment counts whose triangulation stays within `deflection` of the surface.
    ///
    /// Counts double until the deviation is small enough or [`MAX_SEGMENTS`] is
    /// reached.
    pub fn segments_for_deflection(&self, deflection: Real) -> (usize, usize) {
        let deflection = deflection.abs().max(EPSILON);
        let mut seg_u = self.degree_u.max(1);
        let mut seg_v = self.degree_v.max(1);
        while self.chordal_deviation(seg_u, seg_v) > deflection
            && (seg_u < MAX_SEGMENTS || seg_v < MAX_SEGMENTS)
        {
            seg_u = (seg_u * 2).min(MAX_SEGMENTS);
            seg_v = (seg_v * 2).min(MAX_SEGMENTS);
        }
        tracing::debug!(deflection, seg_u, seg_v, "surface tessellation");
        (seg_u, seg_v)
    }

    /// Triangulate on a `seg_u × seg_v` parameter grid.
    ///
    /// Faces follow the parameterization: their normals point along `S_u × S_v`.
    /// Degenerate triangles (collapsed surface edges) are skipped.
    pub fn to_mesh<S: Clone + Send + Sync + Debug>(
        &self,
        seg_u: usize,
        seg_v: usize,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        if seg_u == 0 || seg_v == 0 {
            return Err(ValidationError::TooFewPoints {
                expected: 1,
                got: seg_u.min(seg_v),
            });
        }
        let grid = self.sample_grid(seg_u, seg_v);
        let polygons = grid_triangles(&grid, false, &metadata);
        Ok(Mesh::from_polygons(&polygons, metadata))
    }

    /// Triangulate finely enough that no point of the mesh is farther than
    /// `deflection` from the surface.
    pub fn to_mesh_with_deflection<S: Clone + Send + Sync + Debug>(
        &self,
        deflection: Real,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        let (seg_u, seg_v) = self.segments_for_deflection(deflection);
        self.to_mesh(seg_u, seg_v, metadata)
    }

    /// Closed boundary of the tessellated surface, walked in parameter order
    /// `(u0,v0) → (u1,v0) → (u1,v1) → (u0,v1)`.
    fn boundary_loop(grid: &[Vec<Point3<Real>>]) -> Vec<Point3<Real>> {
        let nu = grid.len() - 1;
        let nv = grid[0].len() - 1;
        let mut ring = Vec::with_capacity(2 * (nu + nv));
        ring.extend((0..nu).map(|i| grid[i][0]));
        ring.extend((0..nv).map(|j| grid[nu][j]));
        ring.extend((1..=nu).rev().map(|i| grid[i][nv]));
        ring.extend((1..=nv).rev().map(|j| grid[0][j]));
        ring
    }

    /// Outline of the surface projected onto the XY plane.
    pub fn footprint(&self, deflection: Real) -> GeoPolygon<Real> {
        let (seg_u, seg_v) = self.segments_for_deflection(deflection);
        let grid = self.sample_grid(seg_u, seg_v);
        let coords: Vec<Coord<Real>> = Self::boundary_loop(&grid)
            .iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect();
        GeoPolygon::new(LineString::new(coords), vec![])
    }

    /// The solid between the surface and the horizontal plane `z = floor_z`.
    ///
    /// The surface is treated as a height field: the tessellated surface forms
    /// the top, vertical walls drop from its boundary, and the boundary
    /// projected onto the floor closes the bottom.
    ///
    /// ## Errors
    /// * `Other` when the surface has no area seen from above
    /// * `Other` when some of the surface lies at or below `floor_z`
    pub fn solid_below<S: Clone + Send + Sync + Debug>(
        &self,
        floor_z: Real,
        deflection: Real,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        let (seg_u, seg_v) = self.segments_for_deflection(deflection);
        let grid = self.sample_grid(seg_u, seg_v);

        let lowest = grid
            .iter()
            .flatten()
            .map(|p| p.z)
            .fold(Real::INFINITY, Real::min);
        if lowest <= floor_z {
            return Err(ValidationError::Other(format!(
                "surface reaches z = {lowest}, at or below the floor at z = {floor_z}"
            )));
        }

        let mut ring = Self::boundary_loop(&grid);
        let shoelace: Real = ring
            .iter()
            .zip(ring.iter().cycle().skip(1))
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<Real>()
            * 0.5;
        if shoelace.abs() < EPSILON {
            return Err(ValidationError::Other(
                "surface has no footprint in the XY plane".into(),
            ));
        }
        // top faces must point up and the ring must run counter-clockwise
        let flip = shoelace < 0.0;
        if flip {
            ring.reverse();
        }

        let mut polygons = grid_triangles(&grid, flip, &metadata);

        let drop = |p: &Point3<Real>| Point3::new(p.x, p.y, floor_z);
        for (k, top) in ring.iter().enumerate() {
            let next = &ring[(k + 1) % ring.len()];
            let quad = [drop(top), drop(next), *next, *top];
            let wall = Polygon::new(
                quad.iter().map(|&p| Vertex::new(p, Vector3::zeros())).collect(),
                metadata.clone(),
            );
            if wall.is_degenerate() {
                continue;
            }
            let normal = wall.plane.normal;
            let mut wall = wall;
            wall.vertices.iter_mut().for_each(|v| v.normal = normal);
            polygons.push(wall);
        }

        let down = -Vector3::z();
        let floor = Polygon::new(
            ring.iter().rev().map(|p| Vertex::new(drop(p), down)).collect(),
            metadata.clone(),
        );
        if floor.is_convex() {
            polygons.push(floor);
        } else {
            polygons.extend(floor.triangulate().into_iter().map(|tri| {
                Polygon::with_plane(tri.to_vec(), floor.plane.clone(), metadata.clone())
            }));
        }

        Ok(Mesh::from_polygons(&polygons, metadata))
    }
}

/// Two triangles per grid cell, wound along `S_u × S_v` unless `flip`
fn grid_triangles<S: Clone>(
    grid: &[Vec<Point3<Real>>],
    flip: bool,
    metadata: &Option<S>,
) -> Vec<Polygon<S>> {
    let mut polygons = Vec::new();
    for i in 0..grid.len().saturating_sub(1) {
        for j in 0..grid[i].len().saturating_sub(1) {
            let (a, b, c, d) = (grid[i][j], grid[i + 1][j], grid[i + 1][j + 1], grid[i][j + 1]);
            for [p, q, r] in [[a, b, c], [a, c, d]] {
                let tri = if flip {
                    Polygon::triangle(p, r, q, metadata.clone())
                } else {
                    Polygon::triangle(p, q, r, metadata.clone())
                };
                polygons.extend(tri);
            }
        }
    }
    polygons
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bilinear() -> BSplineSurface {
        BSplineSurface::new(
            1,
            1,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![
                vec![Point3::new(0.0, 0.0, 1.0), Point3::new(0.0, 2.0, 1.0)],
                vec![Point3::new(2.0, 0.0, 1.0), Point3::new(2.0, 2.0, 3.0)],
            ],
        )
    }

    #[test]
    fn basis_is_a_partition_of_unity() {
        let knots = [0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0];
        for k in 0..=10 {
            let u = k as Real / 10.0;
            let sum: Real = basis_row(3, u, &knots, 5).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn corners_interpolate_control_points() {
        let s = bilinear();
        assert_relative_eq!(s.evaluate(0.0, 0.0), Point3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(s.evaluate(1.0, 1.0), Point3::new(2.0, 2.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(s.evaluate(0.5, 0.5), Point3::new(1.0, 1.0, 1.5), epsilon = 1e-12);
    }

    #[test]
    fn boundary_curves_match_the_surface_edges() {
        let s = bilinear();
        let [u_min, u_max, v_min, v_max] = s.boundary_curves();
        for t in [0.0, 0.3, 1.0] {
            assert_relative_eq!(u_min.evaluate(t), s.evaluate(0.0, t), epsilon = 1e-12);
            assert_relative_eq!(u_max.evaluate(t), s.evaluate(1.0, t), epsilon = 1e-12);
            assert_relative_eq!(v_min.evaluate(t), s.evaluate(t, 0.0), epsilon = 1e-12);
            assert_relative_eq!(v_max.evaluate(t), s.evaluate(t, 1.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn finer_deflection_gives_more_triangles() {
        let s = bilinear();
        let coarse: Mesh<()> = s.to_mesh_with_deflection(0.5, None).unwrap();
        let fine: Mesh<()> = s.to_mesh_with_deflection(0.01, None).unwrap();
        assert!(fine.polygons.len() > coarse.polygons.len());
    }

    #[test]
    fn solid_below_is_closed_with_expected_volume() {
        let s = bilinear();
        let solid: Mesh<()> = s.solid_below(0.0, 1e-3, None).unwrap();
        assert!(solid.is_closed());
        // mean height of the bilinear patch is 1.5 over a 2x2 footprint;
        // flat triangles lose twist / 12 per cell
        assert_relative_eq!(solid.signed_volume(), 6.0, epsilon = 1e-3);
    }

    #[test]
    fn solid_below_rejects_high_floor() {
        let s = bilinear();
        assert!(s.solid_below::<()>(1.0, 0.1, None).is_err());
    }
}
