//! `Mesh` struct and implementations of the `CSGOps` trait for `Mesh`

use crate::float_types::{
    Real, tolerance,
    parry3d::{
        bounding_volume::{Aabb, BoundingVolume},
        shape::TriMesh,
    },
};
use crate::errors::ValidationError;
use crate::traits::CSGOps;
use bsp::Node;
use hashbrown::HashMap;
use nalgebra::{Matrix4, Point3, Vector3};
use plane::Plane;
use polygon::Polygon;
use std::{fmt::Debug, sync::OnceLock};
use vertex::Vertex;

pub mod bsp;
pub mod plane;
pub mod polygon;
pub mod properties;
pub mod section;
pub mod shapes;
pub mod split;
pub mod vertex;

/// A polygonal boundary representation: the shape every pipeline step
/// consumes and produces.
///
/// Closed meshes describe solids; open meshes (terrain, surfaces) describe
/// shells. A mesh without polygons is the null shape.
#[derive(Clone, Debug)]
pub struct Mesh<S: Clone + Send + Sync + Debug> {
    /// 3D polygons for volumetric shapes
    pub polygons: Vec<Polygon<S>>,

    /// Lazily calculated AABB that spans `polygons`.
    pub bounding_box: OnceLock<Aabb>,

    /// Metadata
    pub metadata: Option<S>,
}

impl<S: Clone + Send + Sync + Debug> Mesh<S> {
    /// Build a Mesh from an existing polygon list
    pub fn from_polygons(polygons: &[Polygon<S>], metadata: Option<S>) -> Self {
        Mesh {
            polygons: polygons.to_vec(),
            bounding_box: OnceLock::new(),
            metadata,
        }
    }

    /// Group several shapes into one without evaluating a boolean.
    ///
    /// Faces are kept as they are, overlaps included; each polygon keeps its own
    /// metadata so the parts stay distinguishable.
    pub fn compound(parts: &[Mesh<S>], metadata: Option<S>) -> Self {
        let polygons = parts
            .iter()
            .flat_map(|part| {
                part.polygons.iter().map(|p| {
                    let mut p = p.clone();
                    if p.metadata.is_none() {
                        p.metadata = part.metadata.clone();
                    }
                    p
                })
            })
            .collect();
        Mesh {
            polygons,
            bounding_box: OnceLock::new(),
            metadata,
        }
    }

    /// `true` for a shape without faces
    pub fn is_null(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Split polygons into (may_touch, cannot_touch) using bounding‑box tests
    fn partition_polys(
        polys: &[Polygon<S>],
        other_bb: &Aabb,
    ) -> (Vec<Polygon<S>>, Vec<Polygon<S>>) {
        polys
            .iter()
            .cloned()
            .partition(|p| p.bounding_box().intersects(other_bb))
    }

    /// Helper to collect all vertices from the mesh.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.polygons
            .iter()
            .flat_map(|p| p.vertices.clone())
            .collect()
    }

    /// Triangulate each polygon, returning a Mesh containing only triangles
    pub fn triangulate(&self) -> Mesh<S> {
        let triangles = self
            .polygons
            .iter()
            .flat_map(|poly| {
                poly.triangulate().into_iter().map(move |triangle| {
                    Polygon::with_plane(
                        triangle.to_vec(),
                        poly.plane.clone(),
                        poly.metadata.clone(),
                    )
                })
            })
            .collect::<Vec<_>>();

        Mesh::from_polygons(&triangles, self.metadata.clone())
    }

    /// Vertices and indices of the triangulated polygons; vertices are not shared.
    pub(crate) fn get_vertices_and_indices(&self) -> (Vec<Point3<Real>>, Vec<[u32; 3]>) {
        let tri_mesh = self.triangulate();
        let vertices = tri_mesh
            .polygons
            .iter()
            .flat_map(|p| [p.vertices[0].pos, p.vertices[1].pos, p.vertices[2].pos])
            .collect();

        let indices = (0..tri_mesh.polygons.len())
            .map(|i| {
                let offset = i as u32 * 3;
                [offset, offset + 1, offset + 2]
            })
            .collect();

        (vertices, indices)
    }

    /// Convert the polygons to a Parry `TriMesh`.
    ///
    /// ## Errors
    /// `NullShape` for a mesh without faces, or whatever Parry's builder reports
    pub fn to_trimesh(&self) -> Result<TriMesh, ValidationError> {
        if self.is_null() {
            return Err(ValidationError::NullShape);
        }
        let (vertices, indices) = self.get_vertices_and_indices();
        Ok(TriMesh::new(vertices, indices)?)
    }

    /// `true` when the faces enclose a volume.
    ///
    /// Every edge must be matched by an edge running the other way. Edges
    /// left over are cut at the vertices lying on them, so the T-junctions
    /// boolean results contain still pair up.
    pub fn is_closed(&self) -> bool {
        // oriented face areas of a closed surface cancel out
        let (vector_area, total_area) = self.polygons.iter().fold(
            (Vector3::zeros(), 0.0),
            |(sum, total): (Vector3<Real>, Real), p| {
                let area = p.area();
                (sum + p.plane.normal * area, total + area)
            },
        );
        if total_area <= 0.0 || vector_area.norm() > 1e-6 * total_area {
            return false;
        }

        let edges = self
            .polygons
            .iter()
            .flat_map(|p| p.edges().map(|(a, b)| (a.pos, b.pos)));
        let unmatched = unmatched_edges(edges);
        if unmatched.is_empty() {
            return true;
        }

        let mut junctions: HashMap<PointKey, Point3<Real>> = HashMap::new();
        for (a, b) in &unmatched {
            junctions.insert(point_key(a), *a);
            junctions.insert(point_key(b), *b);
        }
        let reach = tolerance() * 10.0;
        let pieces = unmatched.iter().flat_map(|&(a, b)| {
            let d = b - a;
            let len2 = d.norm_squared();
            let mut cuts: Vec<(Real, Point3<Real>)> = junctions
                .values()
                .filter_map(|p| {
                    let t = (p - a).dot(&d) / len2;
                    let on_edge = t > 0.0 && t < 1.0 && (a + d * t - p).norm() <= reach;
                    on_edge.then_some((t, *p))
                })
                .collect();
            cuts.sort_by(|x, y| x.0.total_cmp(&y.0));

            let mut chain = vec![a];
            chain.extend(cuts.into_iter().map(|(_, p)| p));
            chain.push(b);
            chain.windows(2).map(|w| (w[0], w[1])).collect::<Vec<_>>()
        });
        unmatched_edges(pieces).is_empty()
    }
}

/// Key under which coincident points (within ten times the tolerance) meet
pub(crate) type PointKey = (i64, i64, i64);

pub(crate) fn point_key(p: &Point3<Real>) -> PointKey {
    let scale = 1.0 / (tolerance() * 10.0);
    (
        (p.x * scale).round() as i64,
        (p.y * scale).round() as i64,
        (p.z * scale).round() as i64,
    )
}

/// Directed edges not cancelled by an edge between the same points running
/// the other way, repeated by how many are missing their partner.
fn unmatched_edges(
    edges: impl Iterator<Item = (Point3<Real>, Point3<Real>)>,
) -> Vec<(Point3<Real>, Point3<Real>)> {
    // net count per undirected edge, positive when running from the lower key
    let mut net: HashMap<(PointKey, PointKey), (i64, Point3<Real>, Point3<Real>)> =
        HashMap::new();
    for (a, b) in edges {
        let (ka, kb) = (point_key(&a), point_key(&b));
        if ka == kb {
            continue;
        }
        let (key, lo, hi, step) = if ka < kb { ((ka, kb), a, b, 1) } else { ((kb, ka), b, a, -1) };
        net.entry(key).or_insert((0, lo, hi)).0 += step;
    }

    net.into_values()
        .filter(|(count, _, _)| *count != 0)
        .flat_map(|(count, lo, hi)| {
            let edge = if count > 0 { (lo, hi) } else { (hi, lo) };
            std::iter::repeat(edge).take(count.unsigned_abs() as usize)
        })
        .collect()
}

impl<S: Clone + Send + Sync + Debug> CSGOps for Mesh<S> {
    /// Returns a new empty Mesh
    fn new() -> Self {
        Mesh {
            polygons: Vec::new(),
            bounding_box: OnceLock::new(),
            metadata: None,
        }
    }

    /// Return a new Mesh representing union of the two Meshes.
    ///
    /// ```text
    /// let c = a.union(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |       +----+
    ///     +----+--+    |       +----+       |
    ///          |   b   |            |   c   |
    ///          |       |            |       |
    ///          +-------+            +-------+
    /// ```
    fn union(&self, other: &Mesh<S>) -> Mesh<S> {
        let (a_clip, a_passthru) = Self::partition_polys(&self.polygons, &other.bounding_box());
        let (b_clip, b_passthru) = Self::partition_polys(&other.polygons, &self.bounding_box());

        let mut a = Node::from_polygons(&a_clip);
        let mut b = Node::from_polygons(&b_clip);

        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());

        let mut final_polys = a.all_polygons();
        final_polys.extend(a_passthru);
        final_polys.extend(b_passthru);

        Mesh::from_polygons(&final_polys, self.metadata.clone())
    }

    /// Return a new Mesh representing the difference of the two Meshes.
    ///
    /// ```text
    /// let c = a.difference(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |    +--+
    ///     +----+--+    |       +----+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    fn difference(&self, other: &Mesh<S>) -> Mesh<S> {
        let (a_clip, a_passthru) = Self::partition_polys(&self.polygons, &other.bounding_box());
        let (b_clip, _b_passthru) = Self::partition_polys(&other.polygons, &self.bounding_box());

        let mut a = Node::from_polygons(&a_clip);
        let mut b = Node::from_polygons(&b_clip);

        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());
        a.invert();

        let mut final_polys = a.all_polygons();
        final_polys.extend(a_passthru);

        Mesh::from_polygons(&final_polys, self.metadata.clone())
    }

    /// Return a new Mesh representing the intersection of the two Meshes.
    ///
    /// ```text
    /// let c = a.intersection(b);
    ///     +-------+
    ///     |       |
    ///     |   a   |
    ///     |    +--+----+   =   +--+
    ///     +----+--+    |       +--+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    fn intersection(&self, other: &Mesh<S>) -> Mesh<S> {
        if self.is_null() || other.is_null() {
            return Mesh::from_polygons(&[], self.metadata.clone());
        }
        let mut a = Node::from_polygons(&self.polygons);
        let mut b = Node::from_polygons(&other.polygons);

        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(&b.all_polygons());
        a.invert();

        Mesh::from_polygons(&a.all_polygons(), self.metadata.clone())
    }

    /// Space in exactly one of the two shapes
    fn xor(&self, other: &Mesh<S>) -> Mesh<S> {
        let a_sub_b = self.difference(other);
        let b_sub_a = other.difference(self);
        a_sub_b.union(&b_sub_a)
    }

    /// Apply an arbitrary 3D transform (as a 4x4 matrix) to the mesh.
    ///
    /// Normals go through the inverse transpose; when the matrix is singular
    /// they are rebuilt from the transformed faces instead. Mirroring
    /// matrices reverse the winding so faces keep pointing outwards.
    fn transform(&self, mat: &Matrix4<Real>) -> Mesh<S> {
        let mat_inv_transpose = mat.try_inverse().map(|inv| inv.transpose());
        let mirrors = mat.fixed_view::<3, 3>(0, 0).determinant() < 0.0;
        let mut mesh = self.clone();

        for poly in &mut mesh.polygons {
            for vert in &mut poly.vertices {
                vert.pos = mat.transform_point(&vert.pos);
                if let Some(inv_t) = &mat_inv_transpose {
                    vert.normal = inv_t.transform_vector(&vert.normal).normalize();
                }
            }
            if mirrors {
                poly.vertices.reverse();
            }

            poly.plane = Plane::from_vertices(&poly.vertices);
            poly.bounding_box = OnceLock::new();
            if mat_inv_transpose.is_none() {
                poly.set_new_normal();
            }
        }

        mesh.bounding_box = OnceLock::new();
        mesh
    }

    /// Returns a [`parry3d::bounding_volume::Aabb`] spanning all `polygons`.
    fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
            let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);

            for poly in &self.polygons {
                for v in &poly.vertices {
                    mins = mins.inf(&v.pos);
                    maxs = maxs.sup(&v.pos);
                }
            }

            // no polygons: a trivial AABB at the origin
            if mins.x > maxs.x {
                return Aabb::new(Point3::origin(), Point3::origin());
            }
            Aabb::new(mins, maxs)
        })
    }

    fn invalidate_bounding_box(&mut self) {
        self.bounding_box = OnceLock::new();
    }

    fn inverse(&self) -> Mesh<S> {
        let mut mesh = self.clone();
        for p in &mut mesh.polygons {
            p.flip();
        }
        mesh
    }
}
