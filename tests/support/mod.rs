//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use bim2se::{
    float_types::{Real, TAU},
    mesh::{Mesh, polygon::Polygon, vertex::Vertex},
    surface::PointGrid,
    traits::CSGOps,
};
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Returns the bounding box `[min_x, min_y, min_z, max_x, max_y, max_z]`
/// of a mesh.
pub fn bounding_box<S: Clone + Send + Sync + Debug>(mesh: &Mesh<S>) -> [Real; 6] {
    let bb = mesh.bounding_box();
    [bb.mins.x, bb.mins.y, bb.mins.z, bb.maxs.x, bb.maxs.y, bb.maxs.z]
}

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Helper to make a simple Polygon in 3D with given vertices.
pub fn make_polygon_3d(points: &[[Real; 3]]) -> Polygon<()> {
    let verts = points
        .iter()
        .map(|p| Vertex::new(Point3::new(p[0], p[1], p[2]), Vector3::z()))
        .collect();
    Polygon::new(verts, None)
}

/// Area of the regular `segments`-gon inscribed in a circle of `radius`
pub fn ngon_area(radius: Real, segments: usize) -> Real {
    0.5 * segments as Real * radius * radius * (TAU / segments as Real).sin()
}

/// The 100³ box standing on z = 0, centred on the Z axis
pub fn full_box() -> Mesh<()> {
    Mesh::box_from_corner(Point3::new(-50.0, -50.0, 0.0), 100.0, 100.0, 100.0, None).unwrap()
}

/// The box with a 32-sided cylindrical hole of radius 25 and depth 50
pub fn box_with_hole() -> Mesh<()> {
    let cylinder = Mesh::cylinder(25.0, 50.0, 32, None).unwrap();
    full_box().difference(&cylinder)
}

/// Exact volume of [`box_with_hole`]
pub fn box_with_hole_volume() -> Real {
    1e6 - 50.0 * ngon_area(25.0, 32)
}

/// 2×2 grid over `[-extent, extent]²` on the plane `z = base + slope * x`
pub fn tilted_grid(extent: Real, base: Real, slope: Real) -> PointGrid {
    let z = |x: Real| base + slope * x;
    let mut grid = PointGrid::new(2, 2);
    grid.set(0, 0, Point3::new(-extent, -extent, z(-extent)));
    grid.set(0, 1, Point3::new(-extent, extent, z(-extent)));
    grid.set(1, 0, Point3::new(extent, -extent, z(extent)));
    grid.set(1, 1, Point3::new(extent, extent, z(extent)));
    grid
}

/// ASCII STL with one facet per triangle
pub fn ascii_stl(name: &str, triangles: &[[[Real; 3]; 3]]) -> String {
    let mut out = format!("solid {name}\n");
    for tri in triangles {
        out.push_str("  facet normal 0 0 0\n    outer loop\n");
        for v in tri {
            out.push_str(&format!("      vertex {} {} {}\n", v[0], v[1], v[2]));
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    out.push_str(&format!("endsolid {name}\n"));
    out
}

/// Write `contents` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
