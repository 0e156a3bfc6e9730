//! Sections: the curves where a shape meets a plane or another shape.

use crate::float_types::parry3d::bounding_volume::BoundingVolume;
use crate::float_types::{EPSILON, Real, tolerance};
use crate::mesh::{Mesh, PointKey, point_key};
use crate::mesh::bsp::Node;
use crate::mesh::plane::{BACK, COPLANAR, FRONT, Plane};
use geo::{Area, Contains, Coord, LineString, Point as GeoPoint, Polygon as GeoPolygon};
use hashbrown::HashMap;
use nalgebra::Point3;
use std::fmt::Debug;

/// A chain of points; `closed` chains implicitly join the last point to the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point3<Real>>,
    pub closed: bool,
}

impl Polyline {
    pub fn length(&self) -> Real {
        let open: Real = self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
        match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(first), Some(last)) => open + (first - last).norm(),
            _ => open,
        }
    }
}

/// Result of a section: unordered intersection segments.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub segments: Vec<[Point3<Real>; 2]>,
    /// Faces lying in the section plane (plane sections only)
    pub coplanar_faces: usize,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn total_length(&self) -> Real {
        self.segments.iter().map(|[a, b]| (b - a).norm()).sum()
    }

    /// Chain the segments into polylines.
    ///
    /// Segments are joined where their end points coincide within tolerance.
    /// A chain that returns to its start is closed; branching points end a chain.
    pub fn loops(&self) -> Vec<Polyline> {
        let mut by_point: HashMap<PointKey, Vec<usize>> = HashMap::new();
        for (i, [a, b]) in self.segments.iter().enumerate() {
            by_point.entry(point_key(a)).or_default().push(i);
            by_point.entry(point_key(b)).or_default().push(i);
        }

        let mut used = vec![false; self.segments.len()];
        let mut chains = Vec::new();

        // walk from `tip` through unused segments, appending the far end of each
        let extend = |tip: Point3<Real>, used: &mut Vec<bool>, out: &mut Vec<Point3<Real>>| {
            let mut tip = tip;
            loop {
                let key = point_key(&tip);
                let Some(next) = by_point
                    .get(&key)
                    .and_then(|ids| ids.iter().copied().find(|&id| !used[id]))
                else {
                    break;
                };
                used[next] = true;
                let [a, b] = self.segments[next];
                tip = if point_key(&a) == key { b } else { a };
                out.push(tip);
            }
        };

        for start in 0..self.segments.len() {
            if used[start] {
                continue;
            }
            used[start] = true;
            let [a, b] = self.segments[start];

            let mut forward = vec![a, b];
            extend(b, &mut used, &mut forward);

            let closed = forward.len() > 3
                && point_key(&forward[0]) == point_key(&forward[forward.len() - 1]);
            if closed {
                forward.pop();
                chains.push(Polyline {
                    points: forward,
                    closed: true,
                });
                continue;
            }

            let mut backward = Vec::new();
            extend(a, &mut used, &mut backward);
            backward.reverse();
            backward.extend(forward);
            chains.push(Polyline {
                points: backward,
                closed: false,
            });
        }

        chains
    }

    /// Area enclosed by the closed loops, measured in `plane`.
    ///
    /// Loops nested an odd number of times inside other loops are holes.
    pub fn area_on(&self, plane: &Plane) -> Real {
        let polygons: Vec<GeoPolygon<Real>> = self
            .loops()
            .into_iter()
            .filter(|l| l.closed && l.points.len() >= 3)
            .map(|l| {
                let coords: Vec<Coord<Real>> = l
                    .points
                    .iter()
                    .map(|p| {
                        let [x, y] = plane.to_2d(p);
                        Coord { x, y }
                    })
                    .collect();
                GeoPolygon::new(LineString::new(coords), vec![])
            })
            .collect();

        polygons
            .iter()
            .enumerate()
            .map(|(i, poly)| {
                let inner = GeoPoint::from(poly.exterior().0[0]);
                let depth = polygons
                    .iter()
                    .enumerate()
                    .filter(|(j, other)| *j != i && other.contains(&inner))
                    .count();
                let area = poly.unsigned_area();
                if depth % 2 == 0 { area } else { -area }
            })
            .sum()
    }
}

/// Segment where two triangles intersect, if any.
///
/// Coplanar pairs and pairs meeting in a single point yield `None`.
pub fn triangle_intersection(
    t1: &[Point3<Real>; 3],
    t2: &[Point3<Real>; 3],
) -> Option<[Point3<Real>; 2]> {
    let plane1 = Plane::from_points(t1[0], t1[1], t1[2])?;
    let plane2 = Plane::from_points(t2[0], t2[1], t2[2])?;

    let seg1 = crossing_segment(t1, &plane2)?;
    let seg2 = crossing_segment(t2, &plane1)?;

    let direction = plane1.normal.cross(&plane2.normal);
    if direction.norm_squared() < EPSILON * EPSILON {
        return None;
    }

    let param = |p: &Point3<Real>| direction.dot(&p.coords);
    let (s1, e1) = (param(&seg1[0]), param(&seg1[1]));
    let (s2, e2) = (param(&seg2[0]), param(&seg2[1]));

    let lo = s1.min(e1).max(s2.min(e2));
    let hi = s1.max(e1).min(s2.max(e2));
    if hi - lo <= tolerance() * direction.norm() {
        return None;
    }

    let span = e1 - s1;
    let at = |t: Real| seg1[0] + (seg1[1] - seg1[0]) * ((t - s1) / span);
    Some([at(lo), at(hi)])
}

/// Segment where a triangle crosses a plane
fn crossing_segment(tri: &[Point3<Real>; 3], plane: &Plane) -> Option<[Point3<Real>; 2]> {
    let types = tri.map(|p| plane.orient_point(&p));
    let combined = types.iter().fold(COPLANAR, |acc, &t| acc | t);
    if combined == COPLANAR || combined == FRONT || combined == BACK {
        return None;
    }

    let mut points = Vec::with_capacity(3);
    for i in 0..3 {
        let j = (i + 1) % 3;
        if types[i] == COPLANAR {
            points.push(tri[i]);
        } else if types[j] != COPLANAR && types[i] != types[j] {
            let di = plane.signed_distance(&tri[i]);
            let dj = plane.signed_distance(&tri[j]);
            points.push(tri[i] + (tri[j] - tri[i]) * (di / (di - dj)));
        }
    }

    match points.as_slice() {
        [a, b] if (b - a).norm() > EPSILON => Some([*a, *b]),
        _ => None,
    }
}

impl<S: Clone + Send + Sync + Debug> Mesh<S> {
    /// Section by a plane: the segments where faces cross it.
    pub fn section_plane(&self, plane: &Plane) -> Section {
        let node = Node::from_polygons(&self.polygons);
        let (coplanar, edges) = node.slice(plane);
        Section {
            segments: edges.into_iter().map(|[a, b]| [a.pos, b.pos]).collect(),
            coplanar_faces: coplanar.len(),
        }
    }

    /// Section against another shape, typically a tessellated free-form surface.
    ///
    /// Every pair of triangles with overlapping bounding boxes is intersected;
    /// the segments are returned unordered, use [`Section::loops`] to chain them.
    pub fn section_mesh<T: Clone + Send + Sync + Debug>(&self, other: &Mesh<T>) -> Section {
        let ours: Vec<_> = self
            .triangulate()
            .polygons
            .into_iter()
            .map(|p| (p.bounding_box(), [p.vertices[0].pos, p.vertices[1].pos, p.vertices[2].pos]))
            .collect();
        let theirs: Vec<_> = other
            .triangulate()
            .polygons
            .into_iter()
            .map(|p| (p.bounding_box(), [p.vertices[0].pos, p.vertices[1].pos, p.vertices[2].pos]))
            .collect();

        let margin = tolerance();
        let segments = ours
            .iter()
            .flat_map(|(bb1, t1)| {
                let bb1 = bb1.loosened(margin);
                theirs
                    .iter()
                    .filter(move |(bb2, _)| bb1.intersects(bb2))
                    .filter_map(move |(_, t2)| triangle_intersection(t1, t2))
            })
            .collect();

        Section {
            segments,
            coplanar_faces: 0,
        }
    }
}
