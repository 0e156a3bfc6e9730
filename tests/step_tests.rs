mod support;

use bim2se::io::{IoError, StepWriter};
use bim2se::mesh::{Mesh, plane::Plane};
use bim2se::surface::SurfaceApproximation;
use nalgebra::Vector3;

use crate::support::{box_with_hole, tilted_grid};

/// Entities of the DATA section, without the `#id=` prefix
fn entities(step: &str) -> Vec<&str> {
    step.lines()
        .filter(|l| l.starts_with('#'))
        .filter_map(|l| l.split_once('=').map(|(_, body)| body))
        .collect()
}

fn count(step: &str, keyword: &str) -> usize {
    entities(step)
        .iter()
        .filter(|e| e.starts_with(keyword))
        .count()
}

#[test]
fn file_has_header_and_data_sections() {
    let mut writer = StepWriter::new();
    writer
        .transfer_mesh(&Mesh::<()>::cube(1.0, None).unwrap(), "cube")
        .unwrap();
    let step = writer.to_step_string();

    assert!(step.starts_with("ISO-10303-21;\nHEADER;\n"));
    assert!(step.contains("FILE_SCHEMA(('AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }'));"));
    assert!(step.trim_end().ends_with("END-ISO-10303-21;"));
    assert_eq!(step.matches("ENDSEC;").count(), 2);
}

#[test]
fn closed_mesh_becomes_a_faceted_brep() {
    let mut writer = StepWriter::new();
    writer
        .transfer_mesh(&Mesh::<()>::cube(1.0, None).unwrap(), "cube")
        .unwrap();
    let step = writer.to_step_string();

    assert_eq!(count(&step, "CLOSED_SHELL("), 1);
    assert_eq!(count(&step, "FACETED_BREP('cube'"), 1);
    assert_eq!(count(&step, "FACETED_BREP_SHAPE_REPRESENTATION("), 1);
    assert_eq!(count(&step, "FACE_SURFACE("), 6);
    assert_eq!(count(&step, "POLY_LOOP("), 6);
    // eight corners plus the world origin
    assert_eq!(count(&step, "CARTESIAN_POINT("), 9);
}

#[test]
fn boolean_result_is_still_closed() {
    let mut writer = StepWriter::new();
    writer.transfer_mesh(&box_with_hole(), "model").unwrap();
    let step = writer.to_step_string();
    assert_eq!(count(&step, "CLOSED_SHELL("), 1);
    assert_eq!(count(&step, "OPEN_SHELL("), 0);
}

#[test]
fn open_mesh_becomes_a_shell_model() {
    let surface = SurfaceApproximation::default()
        .approximate(&tilted_grid(10.0, 0.0, 0.5))
        .unwrap();
    let sheet = surface.to_mesh::<()>(3, 3, None).unwrap();

    let mut writer = StepWriter::new();
    writer.transfer_mesh(&sheet, "sheet").unwrap();
    let step = writer.to_step_string();

    assert_eq!(count(&step, "OPEN_SHELL("), 1);
    assert_eq!(count(&step, "SHELL_BASED_SURFACE_MODEL("), 1);
    assert_eq!(count(&step, "FACE_SURFACE("), 18);
    assert_eq!(count(&step, "CLOSED_SHELL("), 0);
}

#[test]
fn tube_without_caps_becomes_a_shell_model() {
    let cylinder: Mesh<()> = Mesh::cylinder(1.0, 2.0, 16, None).unwrap();
    let sides: Vec<_> = cylinder
        .polygons
        .iter()
        .filter(|p| p.plane.normal.z.abs() < 0.5)
        .cloned()
        .collect();
    let tube = Mesh::from_polygons(&sides, None);

    let mut writer = StepWriter::new();
    writer.transfer_mesh(&tube, "tube").unwrap();
    let step = writer.to_step_string();

    assert_eq!(count(&step, "OPEN_SHELL("), 1);
    assert_eq!(count(&step, "CLOSED_SHELL("), 0);
    assert_eq!(count(&step, "FACETED_BREP("), 0);
    assert_eq!(count(&step, "FACE_SURFACE("), 16);
}

#[test]
fn surface_is_written_as_an_advanced_face() {
    let surface = SurfaceApproximation::default()
        .approximate(&tilted_grid(10.0, 0.0, 0.5))
        .unwrap();
    let mut writer = StepWriter::new();
    writer.transfer_surface(&surface, "soil").unwrap();
    let step = writer.to_step_string();

    assert_eq!(count(&step, "B_SPLINE_SURFACE_WITH_KNOTS('soil',1,1,"), 1);
    assert_eq!(count(&step, "ADVANCED_FACE("), 1);
    assert_eq!(count(&step, "B_SPLINE_CURVE_WITH_KNOTS("), 4);
    assert_eq!(count(&step, "EDGE_CURVE("), 4);
    assert_eq!(count(&step, "VERTEX_POINT("), 4);
    assert_eq!(count(&step, "EDGE_LOOP("), 1);
}

#[test]
fn section_is_written_as_polylines() {
    let section = box_with_hole().section_plane(&Plane::from_normal(Vector3::z(), 25.0));
    let mut writer = StepWriter::new();
    writer.transfer_section(&section, "section").unwrap();
    let step = writer.to_step_string();

    assert_eq!(count(&step, "GEOMETRIC_CURVE_SET('section'"), 1);
    assert_eq!(count(&step, "POLYLINE("), 2);
    assert_eq!(
        count(&step, "GEOMETRICALLY_BOUNDED_WIREFRAME_SHAPE_REPRESENTATION("),
        1
    );
}

#[test]
fn every_shape_gets_its_own_product() {
    let mut writer = StepWriter::new();
    writer
        .transfer_mesh(&Mesh::<()>::cube(1.0, None).unwrap(), "a")
        .unwrap();
    writer
        .transfer_mesh(&Mesh::<()>::cube(2.0, None).unwrap(), "b'side")
        .unwrap();
    assert_eq!(writer.root_count(), 2);

    let step = writer.to_step_string();
    assert_eq!(count(&step, "PRODUCT("), 2);
    assert_eq!(count(&step, "APPLICATION_CONTEXT("), 1);
    assert!(step.contains("PRODUCT('b''side','b''side'"));
}

#[test]
fn writer_saves_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.stp");

    let mut writer = StepWriter::new();
    assert!(writer.is_empty());
    writer
        .transfer_mesh(&Mesh::<()>::cube(1.0, None).unwrap(), "cube")
        .unwrap();
    writer.write(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, writer.to_step_string());
}

#[test]
fn null_shapes_are_refused() {
    let mut writer = StepWriter::new();
    let empty: Mesh<()> = Mesh::from_polygons(&[], None);
    assert!(matches!(
        writer.transfer_mesh(&empty, "nothing"),
        Err(IoError::NullShape(_))
    ));

    let missed = box_with_hole().section_plane(&Plane::from_normal(Vector3::z(), 500.0));
    assert!(matches!(
        writer.transfer_section(&missed, "nothing"),
        Err(IoError::NullShape(_))
    ));
    assert!(writer.is_empty());
}
