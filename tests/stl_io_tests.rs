mod support;

use approx::assert_relative_eq;
use bim2se::io::IoError;
use bim2se::mesh::Mesh;

use crate::support::{ascii_stl, bounding_box, write_file};

#[test]
fn ascii_export_lists_every_triangle() {
    let cube: Mesh<()> = Mesh::cube(1.0, None).unwrap();
    let text = cube.to_stl_ascii("cube");

    assert!(text.starts_with("solid cube\n"));
    assert!(text.trim_end().ends_with("endsolid cube"));
    assert_eq!(text.matches("facet normal").count(), 12);
    assert_eq!(text.matches("vertex ").count(), 36);
    assert!(text.contains("vertex 1.000000 1.000000 1.000000"));
}

#[test]
fn ascii_round_trip_keeps_the_faces() {
    let cube: Mesh<()> = Mesh::cube(2.0, None).unwrap();
    let text = cube.to_stl_ascii("cube");
    let back: Mesh<()> = Mesh::from_stl(text.as_bytes(), None).unwrap();

    assert_eq!(back.polygons.len(), 12);
    assert_relative_eq!(back.signed_volume(), 8.0, epsilon = 1e-6);
}

#[test]
fn binary_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.stl");

    let cube: Mesh<()> = Mesh::cube(1.0, None).unwrap();
    cube.write_stl(&path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 84 + 50 * 12);

    let back: Mesh<()> = Mesh::read_stl(&path, None).unwrap();
    assert_eq!(back.polygons.len(), 12);
    assert_eq!(bounding_box(&back), [0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    assert!(back.is_closed());
}

#[test]
fn degenerate_facets_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let text = ascii_stl(
        "terrain",
        &[
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
        ],
    );
    let path = write_file(dir.path(), "terrain.stl", &text);

    let mesh: Mesh<&str> = Mesh::read_stl(&path, Some("terrain")).unwrap();
    assert_eq!(mesh.polygons.len(), 1);
    assert_eq!(mesh.polygons[0].metadata, Some("terrain"));
    assert_relative_eq!(mesh.polygons[0].plane.normal.z, 1.0, epsilon = 1e-12);
}

#[test]
fn only_degenerate_facets_give_a_null_shape() {
    let text = ascii_stl("flat", &[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]]);
    assert!(matches!(
        Mesh::<()>::from_stl(text.as_bytes(), None),
        Err(IoError::NullShape(_))
    ));
}

#[test]
fn empty_binary_stl_is_a_null_shape() {
    let empty: Mesh<()> = Mesh::from_polygons(&[], None);
    let bytes = empty.to_stl_binary().unwrap();
    assert_eq!(bytes.len(), 84);
    assert!(matches!(
        Mesh::<()>::from_stl(&bytes, None),
        Err(IoError::NullShape(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Mesh::<()>::read_stl(dir.path().join("nope.stl"), None);
    assert!(matches!(result, Err(IoError::StdIo(_))));
}
