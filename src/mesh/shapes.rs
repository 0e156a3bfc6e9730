//! Primitive solids: boxes and cylinders

use crate::errors::ValidationError;
use crate::float_types::{Real, TAU};
use crate::mesh::Mesh;
use crate::mesh::plane::Plane;
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use crate::traits::CSGOps;
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;

fn check_dimension(name: &'static str, value: Real) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidDimension { name, value })
    }
}

impl<S: Clone + Debug + Send + Sync> Mesh<S> {
    /// Create a right prism (a box) that spans from (0, 0, 0)
    /// to (width, length, height). All dimensions must be > 0.
    ///
    /// ```
    /// # use bim2se::mesh::Mesh;
    /// let slab: Mesh<()> = Mesh::cuboid(4.0, 2.0, 0.3, None).unwrap();
    /// assert_eq!(slab.polygons.len(), 6);
    /// ```
    pub fn cuboid(
        width: Real,
        length: Real,
        height: Real,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        check_dimension("width", width)?;
        check_dimension("length", length)?;
        check_dimension("height", height)?;

        let p000 = Point3::new(0.0, 0.0, 0.0);
        let p100 = Point3::new(width, 0.0, 0.0);
        let p110 = Point3::new(width, length, 0.0);
        let p010 = Point3::new(0.0, length, 0.0);
        let p001 = Point3::new(0.0, 0.0, height);
        let p101 = Point3::new(width, 0.0, height);
        let p111 = Point3::new(width, length, height);
        let p011 = Point3::new(0.0, length, height);

        // counter-clockwise seen from outside
        let faces = [
            ([p000, p010, p110, p100], -Vector3::z()),
            ([p001, p101, p111, p011], Vector3::z()),
            ([p000, p100, p101, p001], -Vector3::y()),
            ([p010, p011, p111, p110], Vector3::y()),
            ([p000, p001, p011, p010], -Vector3::x()),
            ([p100, p110, p111, p101], Vector3::x()),
        ];

        let polygons = faces
            .iter()
            .map(|(corners, normal)| {
                let vertices = corners.iter().map(|&p| Vertex::new(p, *normal)).collect();
                let plane = Plane::from_point_normal(corners[0], *normal);
                Polygon::with_plane(vertices, plane, metadata.clone())
            })
            .collect::<Vec<_>>();

        Ok(Mesh::from_polygons(&polygons, metadata))
    }

    /// Cube of side `width` with one corner at the origin
    pub fn cube(width: Real, metadata: Option<S>) -> Result<Mesh<S>, ValidationError> {
        Self::cuboid(width, width, width, metadata)
    }

    /// Box given by its lower-left corner and its extents along X, Y and Z
    pub fn box_from_corner(
        corner: Point3<Real>,
        dx: Real,
        dy: Real,
        dz: Real,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        if !corner.iter().all(|c| c.is_finite()) {
            return Err(ValidationError::InvalidCoordinate(corner));
        }
        Ok(Self::cuboid(dx, dy, dz, metadata)?.translate(corner.x, corner.y, corner.z))
    }

    /// Box spanning two opposite corners in any order
    pub fn box_between(
        a: Point3<Real>,
        b: Point3<Real>,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        let mins = a.inf(&b);
        let maxs = a.sup(&b);
        let size = maxs - mins;
        Self::box_from_corner(mins, size.x, size.y, size.z, metadata)
    }

    /// Cylinder standing on z = 0 around the Z axis, faceted into `segments` sides
    pub fn cylinder(
        radius: Real,
        height: Real,
        segments: usize,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        Self::frustum(radius, radius, height, segments, metadata)
    }

    /// Truncated cone from `radius1` at z = 0 to `radius2` at z = `height`.
    ///
    /// Caps are single convex polygons; sides are quads.
    pub fn frustum(
        radius1: Real,
        radius2: Real,
        height: Real,
        segments: usize,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, ValidationError> {
        check_dimension("radius1", radius1)?;
        check_dimension("radius2", radius2)?;
        check_dimension("height", height)?;
        if segments < 3 {
            return Err(ValidationError::TooFewPoints {
                expected: 3,
                got: segments,
            });
        }

        let ring = |radius: Real, z: Real| -> Vec<Point3<Real>> {
            (0..segments)
                .map(|i| {
                    let angle = TAU * i as Real / segments as Real;
                    Point3::new(radius * angle.cos(), radius * angle.sin(), z)
                })
                .collect()
        };
        let bottom = ring(radius1, 0.0);
        let top = ring(radius2, height);

        let mut polygons = Vec::with_capacity(segments + 2);

        let down = -Vector3::z();
        polygons.push(Polygon::with_plane(
            bottom.iter().rev().map(|&p| Vertex::new(p, down)).collect(),
            Plane::from_point_normal(bottom[0], down),
            metadata.clone(),
        ));
        let up = Vector3::z();
        polygons.push(Polygon::with_plane(
            top.iter().map(|&p| Vertex::new(p, up)).collect(),
            Plane::from_point_normal(top[0], up),
            metadata.clone(),
        ));

        for i in 0..segments {
            let j = (i + 1) % segments;
            let quad = [bottom[i], bottom[j], top[j], top[i]];
            let vertices = quad
                .iter()
                .map(|p| Vertex::new(*p, Vector3::new(p.x, p.y, 0.0).normalize()))
                .collect::<Vec<_>>();
            polygons.push(Polygon::new(vertices, metadata.clone()));
        }

        Ok(Mesh::from_polygons(&polygons, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_faces_point_outwards() {
        let b: Mesh<()> = Mesh::cuboid(2.0, 3.0, 4.0, None).unwrap();
        let center = Point3::new(1.0, 1.5, 2.0);
        for poly in &b.polygons {
            let to_face = poly.vertices[0].pos - center;
            assert!(poly.plane.normal.dot(&to_face) > 0.0);
        }
        assert!(b.is_closed());
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(Mesh::<()>::cuboid(0.0, 1.0, 1.0, None).is_err());
        assert!(Mesh::<()>::cylinder(1.0, Real::NAN, 8, None).is_err());
        assert!(matches!(
            Mesh::<()>::cylinder(1.0, 1.0, 2, None),
            Err(ValidationError::TooFewPoints { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn cylinder_has_caps_and_sides() {
        let c: Mesh<()> = Mesh::cylinder(25.0, 50.0, 32, None).unwrap();
        assert_eq!(c.polygons.len(), 34);
        let bb = c.bounding_box();
        assert!((bb.mins.z - 0.0).abs() < 1e-12);
        assert!((bb.maxs.z - 50.0).abs() < 1e-12);
        assert!((bb.maxs.x - 25.0).abs() < 1e-12);
        assert!(c.is_closed());
    }
}
