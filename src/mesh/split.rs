//! Cutting solids apart with planes, free-form surfaces and slab stacks.
//!
//! Every split is a pair of booleans against a tool solid that covers the
//! shape on one side of the cut: `keep = shape ∩ tool`, `rest = shape − tool`.
//! The two parts together always account for the whole volume.

use crate::errors::ValidationError;
use crate::float_types::{Real, tolerance};
use crate::mesh::Mesh;
use crate::mesh::plane::Plane;
use crate::surface::BSplineSurface;
use crate::traits::CSGOps;
use geo::{Contains, Coord, Rect};
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use std::fmt::Debug;

/// A coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vector3<Real> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

impl<S: Clone + Send + Sync + Debug> Mesh<S> {
    /// Margin by which tool solids overhang the shape, so their faces do not
    /// coincide with the shape's own.
    fn tool_margin(&self) -> Real {
        let bb = self.bounding_box();
        1.0 + 0.01 * (bb.maxs - bb.mins).norm() + 10.0 * tolerance()
    }

    /// Split by a plane into the parts in front of it (along its normal) and
    /// behind it. Either part may be empty.
    pub fn split_by_plane(&self, plane: &Plane) -> Result<(Mesh<S>, Mesh<S>), ValidationError> {
        if self.is_null() {
            return Err(ValidationError::NullShape);
        }
        let bb = self.bounding_box();
        let reach = (bb.maxs - bb.mins).norm() + self.tool_margin();

        // a box standing on the plane, in the plane's own frame
        let (u, v) = plane.basis();
        let n = plane.normal;
        let center = bb.center();
        let origin = center - n * plane.signed_distance(&center);
        let frame = Matrix4::from_columns(&[
            u.push(0.0),
            v.push(0.0),
            n.push(0.0),
            Vector4::new(origin.x, origin.y, origin.z, 1.0),
        ]);
        let half_space = Mesh::box_between(
            Point3::new(-reach, -reach, 0.0),
            Point3::new(reach, reach, 2.0 * reach),
            self.metadata.clone(),
        )?
        .transform(&frame);

        Ok((self.intersection(&half_space), self.difference(&half_space)))
    }

    /// Split by a free-form surface into the parts below and above it.
    ///
    /// The surface is tessellated within `deflection` and must overhang the
    /// shape seen from above; it is read as a height field over XY.
    ///
    /// ## Errors
    /// * `NullShape` for an empty shape
    /// * `ToolTooSmall` when part of the shape's footprint lies outside the
    ///   surface's footprint
    pub fn split_by_surface(
        &self,
        surface: &BSplineSurface,
        deflection: Real,
    ) -> Result<(Mesh<S>, Mesh<S>), ValidationError> {
        if self.is_null() {
            return Err(ValidationError::NullShape);
        }
        let bb = self.bounding_box();

        // the whole bounding rectangle must lie under the surface, notches included
        let footprint = surface.footprint(deflection);
        let outline = Rect::new(
            Coord { x: bb.mins.x, y: bb.mins.y },
            Coord { x: bb.maxs.x, y: bb.maxs.y },
        )
        .to_polygon();
        if !footprint.contains(&outline) {
            return Err(ValidationError::ToolTooSmall(format!(
                "surface does not cover the shape's footprint [{}, {}] x [{}, {}]",
                bb.mins.x, bb.maxs.x, bb.mins.y, bb.maxs.y
            )));
        }

        let (seg_u, seg_v) = surface.segments_for_deflection(deflection);
        let lowest = surface
            .sample_grid(seg_u, seg_v)
            .iter()
            .flatten()
            .map(|p| p.z)
            .fold(bb.mins.z, Real::min);
        let floor = lowest - self.tool_margin();

        let tool = surface.solid_below(floor, deflection, self.metadata.clone())?;
        tracing::debug!(faces = tool.polygons.len(), floor, "surface split tool");

        Ok((self.intersection(&tool), self.difference(&tool)))
    }

    /// Cut into `count` slabs of equal thickness along `axis`, lowest first.
    ///
    /// Slabs the shape does not reach are returned empty so the indices stay
    /// aligned with the positions.
    ///
    /// ## Errors
    /// * `NoSlices` when `count` is zero
    /// * `NullShape` for an empty shape
    pub fn slices(&self, axis: Axis, count: usize) -> Result<Vec<Mesh<S>>, ValidationError> {
        if count == 0 {
            return Err(ValidationError::NoSlices);
        }
        if self.is_null() {
            return Err(ValidationError::NullShape);
        }

        let bb = self.bounding_box();
        let margin = self.tool_margin();
        let k = axis.index();
        let (start, end) = (bb.mins[k], bb.maxs[k]);
        let step = (end - start) / count as Real;

        (0..count)
            .map(|i| {
                let mut lo = bb.mins - Vector3::repeat(margin);
                let mut hi = bb.maxs + Vector3::repeat(margin);
                // inner cuts are exact, the outermost faces overhang
                if i > 0 {
                    lo[k] = start + step * i as Real;
                }
                if i + 1 < count {
                    hi[k] = start + step * (i + 1) as Real;
                }
                let slab = Mesh::box_between(lo, hi, self.metadata.clone())?;
                Ok(self.intersection(&slab))
            })
            .collect()
    }
}
