mod support;

use approx::assert_relative_eq;
use bim2se::errors::ValidationError;
use bim2se::float_types::Real;
use bim2se::mesh::{Mesh, plane::Plane, split::Axis};
use bim2se::surface::SurfaceApproximation;
use nalgebra::Vector3;

use crate::support::{bounding_box, box_with_hole, box_with_hole_volume, ngon_area, tilted_grid};

#[test]
fn plane_split_accounts_for_the_whole_volume() {
    let shape = box_with_hole();
    let plane = Plane::from_normal(Vector3::x(), 10.0);
    let (front, back) = shape.split_by_plane(&plane).unwrap();

    let total = front.signed_volume() + back.signed_volume();
    assert_relative_eq!(total, box_with_hole_volume(), max_relative = 1e-6);
    assert!(bounding_box(&front)[0] >= 10.0 - 1e-9);
    assert!(bounding_box(&back)[3] <= 10.0 + 1e-9);
}

#[test]
fn plane_beside_the_shape_leaves_one_side_empty() {
    let cube: Mesh<()> = Mesh::cube(1.0, None).unwrap();
    let (front, back) = cube
        .split_by_plane(&Plane::from_normal(Vector3::z(), 5.0))
        .unwrap();
    assert!(front.is_null());
    assert_relative_eq!(back.signed_volume(), 1.0, epsilon = 1e-9);
}

#[test]
fn slabs_stay_in_their_range_and_sum_up() {
    let shape = box_with_hole();
    let count = 3;
    let slabs = shape.slices(Axis::Z, count).unwrap();
    assert_eq!(slabs.len(), count);

    let step = 100.0 / count as Real;
    let mut total = 0.0;
    for (i, slab) in slabs.iter().enumerate() {
        let bb = bounding_box(slab);
        assert!(bb[2] >= step * i as Real - 1e-6);
        assert!(bb[5] <= step * (i + 1) as Real + 1e-6);
        total += slab.signed_volume();
    }
    assert_relative_eq!(total, box_with_hole_volume(), max_relative = 1e-6);

    // the top slab is above the hole
    assert_relative_eq!(slabs[2].signed_volume(), 1e6 / 3.0, max_relative = 1e-6);
}

#[test]
fn slicing_along_x_gives_symmetric_ends() {
    let shape = box_with_hole();
    let slabs = shape.slices(Axis::X, 2).unwrap();
    assert_relative_eq!(
        slabs[0].signed_volume(),
        slabs[1].signed_volume(),
        max_relative = 1e-6
    );
}

#[test]
fn zero_slabs_is_an_error() {
    let cube: Mesh<()> = Mesh::cube(1.0, None).unwrap();
    assert_eq!(cube.slices(Axis::Z, 0).unwrap_err(), ValidationError::NoSlices);
}

#[test]
fn tilted_surface_splits_the_box() {
    let shape = box_with_hole();
    let surface = SurfaceApproximation::default()
        .approximate(&tilted_grid(100.0, 40.0, 0.1))
        .unwrap();
    let (below, above) = shape.split_by_surface(&surface, 0.5).unwrap();

    let expected_below = 400_000.0 - 40.0 * ngon_area(25.0, 32);
    assert_relative_eq!(below.signed_volume(), expected_below, max_relative = 1e-6);
    assert_relative_eq!(
        below.signed_volume() + above.signed_volume(),
        box_with_hole_volume(),
        max_relative = 1e-6
    );
    assert!(bounding_box(&above)[5] > 99.0);
}

#[test]
fn surface_smaller_than_the_shape_is_refused() {
    let shape = box_with_hole();
    let surface = SurfaceApproximation::default()
        .approximate(&tilted_grid(10.0, 40.0, 0.1))
        .unwrap();
    assert!(matches!(
        shape.split_by_surface(&surface, 0.5),
        Err(ValidationError::ToolTooSmall(_))
    ));
}

#[test]
fn null_shape_cannot_be_split() {
    let empty: Mesh<()> = Mesh::from_polygons(&[], None);
    let surface = SurfaceApproximation::default()
        .approximate(&tilted_grid(100.0, 40.0, 0.1))
        .unwrap();
    assert_eq!(
        empty.split_by_surface(&surface, 0.5).unwrap_err(),
        ValidationError::NullShape
    );
}
