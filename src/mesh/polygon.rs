//! Planar polygons, the faces every `Mesh` is made of.

use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::float_types::{EPSILON, Real};
use crate::mesh::plane::Plane;
use crate::mesh::vertex::Vertex;
use geo::{Coord, LineString, Polygon as GeoPolygon, TriangulateEarcut};
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;

/// A planar polygon with optional metadata.
#[derive(Debug, Clone)]
pub struct Polygon<S: Clone> {
    /// Vertices in counter-clockwise order seen from the front side
    pub vertices: Vec<Vertex>,

    /// The polygon's supporting plane
    pub plane: Plane,

    /// Lazily calculated AABB that spans `vertices`
    pub bounding_box: OnceLock<Aabb>,

    /// Generic metadata associated with the polygon
    pub metadata: Option<S>,
}

impl<S: Clone + PartialEq> PartialEq for Polygon<S> {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
            && self.plane == other.plane
            && self.metadata == other.metadata
    }
}

impl<S: Clone> Polygon<S> {
    /// Create a polygon from vertices; the plane is fitted to them.
    pub fn new(vertices: Vec<Vertex>, metadata: Option<S>) -> Self {
        let plane = Plane::from_vertices(&vertices);
        Polygon {
            vertices,
            plane,
            bounding_box: OnceLock::new(),
            metadata,
        }
    }

    /// Create a polygon whose plane is already known (e.g. a split fragment)
    pub const fn with_plane(vertices: Vec<Vertex>, plane: Plane, metadata: Option<S>) -> Self {
        Polygon {
            vertices,
            plane,
            bounding_box: OnceLock::new(),
            metadata,
        }
    }

    /// Build a triangle face with a normal taken from the winding.
    /// Returns `None` when the three points are collinear.
    pub fn triangle(
        a: Point3<Real>,
        b: Point3<Real>,
        c: Point3<Real>,
        metadata: Option<S>,
    ) -> Option<Self> {
        let plane = Plane::from_points(a, b, c)?;
        let n = plane.normal;
        Some(Polygon::with_plane(
            vec![Vertex::new(a, n), Vertex::new(b, n), Vertex::new(c, n)],
            plane,
            metadata,
        ))
    }

    /// Axis aligned bounding box of this polygon
    pub fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
            let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
            for v in &self.vertices {
                mins = mins.inf(&v.pos);
                maxs = maxs.sup(&v.pos);
            }
            if mins.x > maxs.x {
                return Aabb::new(Point3::origin(), Point3::origin());
            }
            Aabb::new(mins, maxs)
        })
    }

    /// Reverse winding order, flip vertex normals and the plane
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.flip();
        }
        self.plane.flip();
    }

    /// Recompute the plane from the vertices and assign its normal to all of them
    pub fn set_new_normal(&mut self) {
        self.plane = Plane::from_vertices(&self.vertices);
        let n = self.plane.normal();
        for v in &mut self.vertices {
            v.normal = n;
        }
    }

    /// Area computed from the cross-product sum (Newell)
    pub fn area(&self) -> Real {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let sum = (0..n).fold(Vector3::zeros(), |acc, i| {
            let a = self.vertices[i].pos.coords;
            let b = self.vertices[(i + 1) % n].pos.coords;
            acc + a.cross(&b)
        });
        0.5 * sum.dot(&self.plane.normal).abs()
    }

    /// `true` when the polygon has fewer than three vertices or no area
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3 || self.area() < EPSILON
    }

    /// Triangulate this polygon into a list of triangles, each triangle is [v0, v1, v2].
    ///
    /// Triangles pass through untouched; other polygons are projected into
    /// the plane's 2D frame and ear-clipped.
    pub fn triangulate(&self) -> Vec<[Vertex; 3]> {
        if self.vertices.len() < 3 {
            return Vec::new();
        }
        if self.vertices.len() == 3 {
            return vec![[
                self.vertices[0].clone(),
                self.vertices[1].clone(),
                self.vertices[2].clone(),
            ]];
        }

        if self.is_convex() {
            return (1..self.vertices.len() - 1)
                .map(|i| {
                    [
                        self.vertices[0].clone(),
                        self.vertices[i].clone(),
                        self.vertices[i + 1].clone(),
                    ]
                })
                .collect();
        }

        let outer: Vec<Coord<Real>> = self
            .vertices
            .iter()
            .map(|v| {
                let [x, y] = self.plane.to_2d(&v.pos);
                Coord { x, y }
            })
            .collect();
        let polygon_2d = GeoPolygon::new(LineString::new(outer), vec![]);
        let triangulation = polygon_2d.earcut_triangles_raw();

        // the ring is closed, so an index past the end is the first vertex again
        let n = self.vertices.len();
        triangulation
            .triangle_indices
            .chunks_exact(3)
            .map(|tri| {
                let mut t = [
                    self.vertices[tri[0] % n].clone(),
                    self.vertices[tri[1] % n].clone(),
                    self.vertices[tri[2] % n].clone(),
                ];
                // keep the triangle wound like the polygon
                let n = (t[1].pos - t[0].pos).cross(&(t[2].pos - t[0].pos));
                if n.dot(&self.plane.normal) < 0.0 {
                    t.swap(1, 2);
                }
                t
            })
            .collect()
    }

    /// `true` when every corner turns the same way around the plane normal
    pub fn is_convex(&self) -> bool {
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i].pos;
            let b = self.vertices[(i + 1) % n].pos;
            let c = self.vertices[(i + 2) % n].pos;
            (b - a).cross(&(c - b)).dot(&self.plane.normal) >= -EPSILON
        })
    }

    /// Edges as consecutive vertex pairs, closing back to the first vertex
    pub fn edges(&self) -> impl Iterator<Item = (&Vertex, &Vertex)> {
        self.vertices
            .iter()
            .zip(self.vertices.iter().cycle().skip(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon<()> {
        let n = Vector3::z();
        Polygon::new(
            vec![
                Vertex::new(Point3::new(0.0, 0.0, 0.0), n),
                Vertex::new(Point3::new(2.0, 0.0, 0.0), n),
                Vertex::new(Point3::new(2.0, 2.0, 0.0), n),
                Vertex::new(Point3::new(0.0, 2.0, 0.0), n),
            ],
            None,
        )
    }

    #[test]
    fn square_area_and_triangles() {
        let sq = square();
        assert!((sq.area() - 4.0).abs() < 1e-12);
        let tris = sq.triangulate();
        assert_eq!(tris.len(), 2);
        for t in &tris {
            let n = (t[1].pos - t[0].pos).cross(&(t[2].pos - t[0].pos));
            assert!(n.z > 0.0);
        }
    }

    #[test]
    fn concave_polygon_is_ear_clipped() {
        let n = Vector3::z();
        let l_shape: Polygon<()> = Polygon::new(
            [[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 2.0], [0.0, 2.0]]
                .iter()
                .map(|&[x, y]| Vertex::new(Point3::new(x, y, 0.0), n))
                .collect(),
            None,
        );
        assert!(!l_shape.is_convex());
        let tris = l_shape.triangulate();
        assert_eq!(tris.len(), 4);
        let total: Real = tris
            .iter()
            .map(|t| 0.5 * (t[1].pos - t[0].pos).cross(&(t[2].pos - t[0].pos)).z)
            .sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn flip_reverses_plane() {
        let mut sq = square();
        sq.flip();
        assert!((sq.plane.normal - (-Vector3::z())).norm() < 1e-12);
        assert!((sq.area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_triangle_is_rejected() {
        let t = Polygon::<()>::triangle(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            None,
        );
        assert!(t.is_none());
    }
}
