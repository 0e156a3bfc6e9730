mod support;

use approx::assert_relative_eq;
use bim2se::float_types::Real;
use bim2se::mesh::Mesh;
use bim2se::pipeline::{self, ModelSource, Part, PipelineConfig};
use bim2se::surface::PointGrid;
use nalgebra::{Point3, Vector3};
use std::path::Path;

use crate::support::{ascii_stl, box_with_hole_volume, write_file};

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: dir.to_path_buf(),
        // cuts at thirds stay clear of the hole's ceiling
        slice_count: 3,
        ..PipelineConfig::default()
    }
}

#[test]
fn reference_run_writes_every_result() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let report = pipeline::run(&config_in(&out)).unwrap();

    assert!(report.surface_built);
    assert_relative_eq!(report.model_volume, box_with_hole_volume(), max_relative = 1e-6);
    assert_relative_eq!(report.original_volume, 1e6, max_relative = 1e-9);

    for name in [
        "soilSurface.stp",
        "soilSurface.stl",
        "section.stp",
        "subVolumeBelow.stl",
        "subVolumeAbove.stl",
        "slice0.stl",
        "slice1.stl",
        "slice2.stl",
    ] {
        let path = out.join(name);
        assert!(path.is_file(), "{name} missing");
        assert!(report.written.contains(&path));
    }
    assert!(!out.join("originalGeometry.stp").exists());

    let section = report.section.unwrap();
    assert!(section.segments > 0);
    assert!(section.loops >= 1);
    assert!(section.length > 0.0);

    let (below, above) = report.sub_volumes.unwrap();
    assert!(below > 0.0 && above > 0.0);
    assert_relative_eq!(below + above, report.model_volume, max_relative = 1e-4);

    assert_eq!(report.slice_volumes.len(), 3);
    let sliced: Real = report.slice_volumes.iter().sum();
    assert_relative_eq!(sliced, report.model_volume, max_relative = 1e-6);

    let soil = std::fs::read_to_string(out.join("soilSurface.stp")).unwrap();
    assert!(soil.contains("B_SPLINE_SURFACE_WITH_KNOTS('soilSurface'"));
}

#[test]
fn failed_surface_exports_the_original_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        surface_points: PointGrid::new(2, 2),
        ..config_in(dir.path())
    };
    let report = pipeline::run(&config).unwrap();

    assert!(!report.surface_built);
    assert!(dir.path().join("originalGeometry.stp").is_file());
    assert!(dir.path().join("originalGeometry.stl").is_file());
    assert!(!dir.path().join("soilSurface.stp").exists());
    assert!(report.section.is_none());
    assert!(report.sub_volumes.is_none());
    assert_relative_eq!(report.model_volume, box_with_hole_volume(), max_relative = 1e-6);

    let reread: Mesh<()> = Mesh::read_stl(dir.path().join("originalGeometry.stl"), None).unwrap();
    assert_relative_eq!(reread.signed_volume(), report.model_volume, max_relative = 1e-4);
}

#[test]
fn surface_away_from_the_model_skips_section_and_split() {
    let dir = tempfile::tempdir().unwrap();
    let mut far = PointGrid::new(2, 2);
    far.set(0, 0, Point3::new(495.0, 495.0, 10.0));
    far.set(0, 1, Point3::new(495.0, 505.0, 10.0));
    far.set(1, 0, Point3::new(505.0, 495.0, 10.0));
    far.set(1, 1, Point3::new(505.0, 505.0, 10.0));
    let config = PipelineConfig {
        surface_points: far,
        ..config_in(dir.path())
    };
    let report = pipeline::run(&config).unwrap();

    assert!(report.surface_built);
    assert!(dir.path().join("soilSurface.stp").is_file());
    assert!(report.section.is_none());
    assert!(!dir.path().join("section.stp").exists());
    // the surface does not cover the model, so the split is refused
    assert!(report.sub_volumes.is_none());
    assert!(!dir.path().join("subVolumeBelow.stl").exists());

    // the run goes on with the slabs
    assert_eq!(report.slice_volumes.len(), 3);
    for i in 0..3 {
        assert!(dir.path().join(format!("slice{i}.stl")).is_file());
    }
    let sliced: Real = report.slice_volumes.iter().sum();
    assert_relative_eq!(sliced, report.model_volume, max_relative = 1e-6);
}

#[test]
fn site_models_are_placed_and_combined() {
    let dir = tempfile::tempdir().unwrap();
    let terrain = write_file(
        dir.path(),
        "terrain.stl",
        &ascii_stl(
            "terrain",
            &[
                [[1000.0, 2000.0, 300.0], [1010.0, 2000.0, 301.0], [1010.0, 2010.0, 302.0]],
                [[1000.0, 2000.0, 300.0], [1010.0, 2010.0, 302.0], [1000.0, 2010.0, 301.0]],
            ],
        ),
    );
    let building = dir.path().join("building.stl");
    Mesh::<()>::cube(5.0, None).unwrap().write_stl(&building).unwrap();

    let out = dir.path().join("out");
    let config = PipelineConfig {
        terrain: Some(ModelSource::new(&terrain).with_offset(Vector3::new(1.0, 2.0, 3.0))),
        building: Some(ModelSource::new(&building).with_offset(Vector3::new(10.0, 0.0, 0.0))),
        align_terrain: true,
        ..config_in(&out)
    };
    let report = pipeline::run(&config).unwrap();

    assert_eq!(report.models.len(), 2);
    let terrain = &report.models[0];
    assert_eq!(terrain.part, Part::Terrain);
    assert_eq!(terrain.faces, 2);
    assert_relative_eq!(terrain.min, Point3::new(1.0, 2.0, 3.0), epsilon = 1e-9);
    assert_relative_eq!(terrain.max, Point3::new(11.0, 12.0, 5.0), epsilon = 1e-9);

    let building = &report.models[1];
    assert_eq!(building.part, Part::Building);
    assert_eq!(building.faces, 12);
    assert_relative_eq!(building.min, Point3::new(10.0, 0.0, 0.0), epsilon = 1e-9);

    let combined: Mesh<()> = Mesh::read_stl(out.join("combined.stl"), None).unwrap();
    assert_eq!(combined.polygons.len(), 14);
    let step = std::fs::read_to_string(out.join("combined.stp")).unwrap();
    assert!(step.contains("PRODUCT('combined'"));
}

#[test]
fn null_shape_model_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let terrain = write_file(
        dir.path(),
        "flat.stl",
        &ascii_stl("flat", &[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]]),
    );
    let out = dir.path().join("out");
    let config = PipelineConfig {
        terrain: Some(ModelSource::new(terrain)),
        ..config_in(&out)
    };
    let report = pipeline::run(&config).unwrap();

    assert!(report.models.is_empty());
    assert!(!out.join("combined.stl").exists());
}

#[test]
fn missing_model_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        building: Some(ModelSource::new(dir.path().join("absent.stl"))),
        ..config_in(dir.path())
    };
    assert!(pipeline::run(&config).is_err());
}
