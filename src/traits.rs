use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};

/// Boolean operations + rigid/affine placement of a shape
pub trait CSGOps: Sized + Clone {
    /// The null shape
    fn new() -> Self;
    fn union(&self, other: &Self) -> Self;
    fn difference(&self, other: &Self) -> Self;
    fn intersection(&self, other: &Self) -> Self;
    fn xor(&self, other: &Self) -> Self;
    fn transform(&self, matrix: &Matrix4<Real>) -> Self;
    fn bounding_box(&self) -> Aabb;
    fn invalidate_bounding_box(&mut self);
    /// Flip inside and outside
    fn inverse(&self) -> Self;

    /// Returns a new Self translated by vector.
    fn translate_vector(&self, vector: Vector3<Real>) -> Self {
        self.transform(&Translation3::from(vector).to_homogeneous())
    }

    /// Returns a new Self translated by x, y, and z.
    fn translate(&self, x: Real, y: Real, z: Real) -> Self {
        self.translate_vector(Vector3::new(x, y, z))
    }

    /// Moves the shape so that its bounding-box center is at the origin.
    fn center(&self) -> Self {
        let aabb = self.bounding_box();
        let center = aabb.center();
        self.translate(-center.x, -center.y, -center.z)
    }

    /// Moves the shape so that its bounding-box minimum corner is at the origin.
    ///
    /// This is how a survey model with large georeferenced coordinates is
    /// brought into a local site frame.
    fn to_origin(&self) -> Self {
        let mins = self.bounding_box().mins;
        self.translate(-mins.x, -mins.y, -mins.z)
    }

    /// Translates the shape so its lowest point sits at z = 0.
    fn float(&self) -> Self {
        let min_z = self.bounding_box().mins.z;
        self.translate(0.0, 0.0, -min_z)
    }

    /// Rotates by x, y, z degrees, applied in that order.
    fn rotate(&self, x_deg: Real, y_deg: Real, z_deg: Real) -> Self {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), x_deg.to_radians());
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), y_deg.to_radians());
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), z_deg.to_radians());
        self.transform(&(rz * ry * rx).to_homogeneous())
    }

    /// Non-uniform scale about the origin
    fn scale(&self, sx: Real, sy: Real, sz: Real) -> Self {
        self.transform(&Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)))
    }
}
