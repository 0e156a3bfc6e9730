//! Oriented planes and the polygon splitting that the BSP tree is built on.

use crate::float_types::{EPSILON, Real, tolerance};
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;

// Plane classification constants, combined as bit flags
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane `normal · p = w` with unit `normal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and the offset
    /// measured along the *normalized* normal.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        Plane {
            normal: normal.normalize(),
            w,
        }
    }

    /// Plane through `point` with the given normal
    pub fn from_point_normal(point: Point3<Real>, normal: Vector3<Real>) -> Self {
        let normal = normal.normalize();
        Plane {
            w: normal.dot(&point.coords),
            normal,
        }
    }

    /// Create a plane from three points.
    /// The normal direction follows the right-hand rule: (p2-p1) × (p3-p1).
    /// Returns `None` for collinear points.
    pub fn from_points(p1: Point3<Real>, p2: Point3<Real>, p3: Point3<Real>) -> Option<Self> {
        let normal = (p2 - p1).cross(&(p3 - p1));
        if normal.norm_squared() < EPSILON * EPSILON {
            return None;
        }
        let normal = normal.normalize();
        Some(Plane {
            w: normal.dot(&p1.coords),
            normal,
        })
    }

    /// Fit a plane through a polygon's vertices.
    ///
    /// Uses the longest chord plus the vertex farthest from it, which stays
    /// stable for long thin faces, then orients the result to agree with the
    /// Newell normal of the vertex winding.
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        let n = vertices.len();
        let fallback = Plane {
            normal: Vector3::z(),
            w: 0.0,
        };
        if n < 3 {
            return fallback;
        }

        let newell = vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .fold(Vector3::zeros(), |acc, (curr, next)| {
                acc + curr.pos.coords.cross(&next.pos.coords)
            });

        if n == 3 {
            return Self::from_points(vertices[0].pos, vertices[1].pos, vertices[2].pos)
                .unwrap_or(fallback);
        }

        let Some((i0, i1, _)) = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| (i, j, (vertices[i].pos - vertices[j].pos).norm_squared()))
            .max_by(|a, b| a.2.total_cmp(&b.2))
        else {
            return fallback;
        };

        let p0 = vertices[i0].pos;
        let dir = vertices[i1].pos - p0;
        let Some((i2, area2)) = vertices
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != i0 && *idx != i1)
            .map(|(idx, v)| (idx, (v.pos - p0).cross(&dir).norm_squared()))
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return fallback;
        };
        if area2 < EPSILON * EPSILON {
            return fallback; // all vertices collinear
        }

        let Some(mut plane) = Self::from_points(p0, vertices[i1].pos, vertices[i2].pos) else {
            return fallback;
        };
        if plane.normal.dot(&newell) < 0.0 {
            plane.flip();
        }
        plane
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    /// Flip the plane (reverse normal and offset)
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Signed distance from `point` to the plane, positive on the front side
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify a point as `FRONT`, `BACK` or `COPLANAR` within the global tolerance
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let distance = self.signed_distance(point);
        let tol = tolerance();
        if distance > tol {
            FRONT
        } else if distance < -tol {
            BACK
        } else {
            COPLANAR
        }
    }

    /// Orientation of another plane's normal relative to this one
    pub fn orient_plane(&self, other: &Plane) -> i8 {
        if self.normal.dot(&other.normal) > 0.0 {
            FRONT
        } else {
            BACK
        }
    }

    /// Classify a polygon: bitwise OR of its vertex classifications
    pub fn classify_polygon<S: Clone>(&self, polygon: &Polygon<S>) -> i8 {
        polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, v| acc | self.orient_point(&v.pos))
    }

    /// Splits a polygon by this plane, returning four buckets:
    /// `(coplanar_front, coplanar_back, front, back)`.
    #[allow(clippy::type_complexity)]
    pub fn split_polygon<S: Clone + Send + Sync + Debug>(
        &self,
        polygon: &Polygon<S>,
    ) -> (Vec<Polygon<S>>, Vec<Polygon<S>>, Vec<Polygon<S>>, Vec<Polygon<S>>) {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| self.orient_point(&v.pos))
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, &t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.orient_plane(&polygon.plane) == FRONT {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            },
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let mut split_front = Vec::<Vertex>::new();
                let mut split_back = Vec::<Vertex>::new();
                let count = polygon.vertices.len();

                for i in 0..count {
                    let j = (i + 1) % count;
                    let (type_i, type_j) = (types[i], types[j]);
                    let vertex_i = &polygon.vertices[i];
                    let vertex_j = &polygon.vertices[j];

                    if type_i != BACK {
                        split_front.push(vertex_i.clone());
                    }
                    if type_i != FRONT {
                        split_back.push(vertex_i.clone());
                    }

                    if (type_i | type_j) == SPANNING {
                        let denom = self.normal.dot(&(vertex_j.pos - vertex_i.pos));
                        if denom.abs() > EPSILON {
                            let t = (self.w - self.normal.dot(&vertex_i.pos.coords)) / denom;
                            let vertex_new = vertex_i.interpolate(vertex_j, t);
                            split_front.push(vertex_new.clone());
                            split_back.push(vertex_new);
                        }
                    }
                }

                // Split pieces keep the parent's plane so the BSP stays consistent
                if split_front.len() >= 3 {
                    front.push(Polygon::with_plane(
                        split_front,
                        polygon.plane.clone(),
                        polygon.metadata.clone(),
                    ));
                }
                if split_back.len() >= 3 {
                    back.push(Polygon::with_plane(
                        split_back,
                        polygon.plane.clone(),
                        polygon.metadata.clone(),
                    ));
                }
            },
        }

        (coplanar_front, coplanar_back, front, back)
    }

    /// Orthonormal basis `(u, v)` spanning the plane, with `u × v = normal`
    pub fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let helper = if self.normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = helper.cross(&self.normal).normalize();
        let v = self.normal.cross(&u);
        (u, v)
    }

    /// Project a point into the plane's 2D frame
    pub fn to_2d(&self, point: &Point3<Real>) -> [Real; 2] {
        let (u, v) = self.basis();
        [u.dot(&point.coords), v.dot(&point.coords)]
    }
}
