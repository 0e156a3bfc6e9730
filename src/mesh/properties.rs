//! Global properties of shapes: volume, centre of mass, point containment.

use crate::errors::ValidationError;
use crate::float_types::parry3d::{
    query::{Ray, RayCast},
    shape::{Shape, Triangle},
};
use crate::float_types::{EPSILON, Real};
use crate::mesh::Mesh;
use nalgebra::{Isometry3, Point3, Vector3};
use std::fmt::Debug;

/// Volume integration result for a closed shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeProperties {
    /// Enclosed volume (unit density, so this is also the mass)
    pub volume: Real,
    pub center_of_mass: Point3<Real>,
}

impl<S: Clone + Send + Sync + Debug> Mesh<S> {
    /// Volume and centre of mass, integrated by Parry over the triangulated faces.
    ///
    /// The result is only meaningful for closed shapes; open shells report the
    /// volume of the cone they span with their centroid.
    pub fn volume_properties(&self) -> Result<VolumeProperties, ValidationError> {
        let trimesh = self.to_trimesh()?;
        let mp = trimesh.mass_properties(1.0);
        Ok(VolumeProperties {
            volume: mp.mass(),
            center_of_mass: mp.local_com,
        })
    }

    /// Signed enclosed volume by the divergence theorem.
    ///
    /// Positive when the faces point outwards, negative when the shape is
    /// inside-out, zero for the null shape.
    pub fn signed_volume(&self) -> Real {
        self.polygons
            .iter()
            .flat_map(|p| p.triangulate())
            .map(|[a, b, c]| a.pos.coords.dot(&b.pos.coords.cross(&c.pos.coords)))
            .sum::<Real>()
            / 6.0
    }

    /// Total area of all faces
    pub fn surface_area(&self) -> Real {
        self.polygons.iter().map(|p| p.area()).sum()
    }

    /// Casts a ray defined by `origin` + t * `direction` against all triangles
    /// and returns a list of (intersection_point, distance), sorted by ascending
    /// distance. Hits closer together than `EPSILON` are reported once.
    pub fn ray_intersections(
        &self,
        origin: &Point3<Real>,
        direction: &Vector3<Real>,
    ) -> Vec<(Point3<Real>, Real)> {
        let ray = Ray::new(*origin, *direction);
        let iso = Isometry3::identity();

        let mut hits: Vec<(Point3<Real>, Real)> = self
            .polygons
            .iter()
            .flat_map(|poly| poly.triangulate())
            .filter_map(|[a, b, c]| {
                Triangle::new(a.pos, b.pos, c.pos)
                    .cast_ray_and_get_normal(&iso, &ray, Real::MAX, true)
                    .map(|hit| (ray.point_at(hit.time_of_impact), hit.time_of_impact))
            })
            .collect();

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.dedup_by(|a, b| (a.1 - b.1).abs() < EPSILON);
        hits
    }

    /// Point-in-solid test by ray parity.
    ///
    /// The ray direction is deliberately off-axis so it does not graze the
    /// edges of axis-aligned boxes.
    pub fn contains_point(&self, point: &Point3<Real>) -> bool {
        let direction = Vector3::new(0.5773, 0.5801, 0.5749);
        self.ray_intersections(point, &direction).len() % 2 == 1
    }
}
