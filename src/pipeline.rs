//! The BIM2SE run: build a volume, fit a soil surface, section, split,
//! slice, load the site models and export everything.
//!
//! Geometric failures take a fallback branch and the run goes on; only I/O
//! failures abort it.

use crate::errors::{PipelineError, ValidationError};
use crate::float_types::Real;
use crate::io::{IoError, StepWriter};
use crate::mesh::Mesh;
use crate::mesh::split::Axis;
use crate::surface::{PointGrid, SurfaceApproximation};
use crate::traits::CSGOps;
use nalgebra::{Point3, Vector3};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a face belongs to; carried as polygon metadata through the booleans
/// so combined exports keep their parts apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Generated,
    Surface,
    Terrain,
    Building,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Part::Generated => "generated",
            Part::Surface => "surface",
            Part::Terrain => "terrain",
            Part::Building => "building",
        };
        f.write_str(name)
    }
}

/// An STL model placed into the shared coordinate system
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    pub path: PathBuf,
    pub offset: Vector3<Real>,
}

impl ModelSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModelSource {
            path: path.into(),
            offset: Vector3::zeros(),
        }
    }

    pub fn with_offset(mut self, offset: Vector3<Real>) -> Self {
        self.offset = offset;
        self
    }
}

/// Everything a run needs; `Default` reproduces the reference scenario.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory all files are written to; created when missing
    pub output_dir: PathBuf,
    pub box_corner: Point3<Real>,
    pub box_size: Vector3<Real>,
    pub cylinder_radius: Real,
    pub cylinder_height: Real,
    pub cylinder_segments: usize,
    /// Points the soil surface is fitted to
    pub surface_points: PointGrid,
    pub approximation: SurfaceApproximation,
    /// Deflection of the exported surface mesh and of the section
    pub mesh_deflection: Real,
    /// Deflection of the solid used to split by the surface
    pub split_deflection: Real,
    pub slice_count: usize,
    pub terrain: Option<ModelSource>,
    pub building: Option<ModelSource>,
    /// Move the terrain's bounding-box minimum to the origin before offsetting
    pub align_terrain: bool,
}

/// The four soil points; `(i, j)` runs along U then V
pub fn default_surface_points() -> PointGrid {
    let mut grid = PointGrid::new(2, 2);
    grid.set(0, 0, Point3::new(79.0, 87.0, 26.0));
    grid.set(0, 1, Point3::new(-62.0, 93.0, 84.0));
    grid.set(1, 1, Point3::new(-97.0, -61.0, 3.0));
    grid.set(1, 0, Point3::new(65.0, -65.0, 65.0));
    grid
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            output_dir: PathBuf::from("."),
            box_corner: Point3::new(-50.0, -50.0, 0.0),
            box_size: Vector3::new(100.0, 100.0, 100.0),
            cylinder_radius: 25.0,
            cylinder_height: 50.0,
            cylinder_segments: 32,
            surface_points: default_surface_points(),
            approximation: SurfaceApproximation::default(),
            mesh_deflection: 1e-2,
            split_deflection: 0.5,
            slice_count: 4,
            terrain: None,
            building: None,
            align_terrain: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionSummary {
    pub segments: usize,
    pub loops: usize,
    pub length: Real,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub part: Part,
    pub faces: usize,
    pub min: Point3<Real>,
    pub max: Point3<Real>,
}

/// Measurements and outputs of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub surface_built: bool,
    /// Volume of the box with the hole
    pub model_volume: Real,
    /// Volume of the full box
    pub original_volume: Real,
    pub section: Option<SectionSummary>,
    /// `(below, above)` the soil surface
    pub sub_volumes: Option<(Real, Real)>,
    pub slice_volumes: Vec<Real>,
    pub models: Vec<ModelSummary>,
    pub written: Vec<PathBuf>,
}

/// Format like C++ streams with `setprecision(digits)`: `digits` significant
/// digits, trailing zeros dropped, exponent form for very large or small values.
///
/// ```
/// # use bim2se::pipeline::format_significant;
/// assert_eq!(format_significant(1e6, 5), "1e+06");
/// assert_eq!(format_significant(1234.5678, 5), "1234.6");
/// ```
pub fn format_significant(value: Real, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let digits = digits.max(1);

    let trim = |s: String| -> String {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    };

    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim(mantissa.to_string()), exponent.abs())
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim(format!("{value:.decimals$}"))
    }
}

/// Enclosed volume; the null shape has none
fn volume(mesh: &Mesh<Part>) -> Result<Real, ValidationError> {
    match mesh.volume_properties() {
        Ok(props) => Ok(props.volume),
        Err(ValidationError::NullShape) => Ok(0.0),
        Err(e) => Err(e),
    }
}

struct Outputs<'a> {
    dir: &'a Path,
    written: Vec<PathBuf>,
}

impl Outputs<'_> {
    fn stl(&mut self, mesh: &Mesh<Part>, name: &str) -> Result<(), IoError> {
        let path = self.dir.join(name);
        mesh.write_stl(&path)?;
        info!(path = %path.display(), "written");
        self.written.push(path);
        Ok(())
    }

    fn step(&mut self, writer: &StepWriter, name: &str) -> Result<(), IoError> {
        let path = self.dir.join(name);
        writer.write(&path)?;
        info!(path = %path.display(), "written");
        self.written.push(path);
        Ok(())
    }

    fn step_mesh(&mut self, mesh: &Mesh<Part>, name: &str) -> Result<(), IoError> {
        let mut writer = StepWriter::new();
        let label = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        writer.transfer_mesh(mesh, label)?;
        self.step(&writer, name)
    }
}

/// Run every step and write the results into `config.output_dir`.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    std::fs::create_dir_all(&config.output_dir).map_err(IoError::from)?;
    let mut out = Outputs {
        dir: &config.output_dir,
        written: Vec::new(),
    };
    let mut report = PipelineReport::default();

    // a box with a cylindrical hole
    let size = config.box_size;
    let full_box = Mesh::box_from_corner(
        config.box_corner,
        size.x,
        size.y,
        size.z,
        Some(Part::Generated),
    )?;
    let cylinder = Mesh::cylinder(
        config.cylinder_radius,
        config.cylinder_height,
        config.cylinder_segments,
        Some(Part::Generated),
    )?;
    let box_with_hole = full_box.difference(&cylinder);
    info!(faces = box_with_hole.polygons.len(), "generated volume");

    // soil surface from the scattered points
    let surface = match config.approximation.approximate(&config.surface_points) {
        Ok(surface) => {
            println!("Creation of Surface succeeded!");
            let mut writer = StepWriter::new();
            writer.transfer_surface(&surface, "soilSurface")?;
            out.step(&writer, "soilSurface.stp")?;

            let meshed = surface.to_mesh_with_deflection(config.mesh_deflection, Some(Part::Surface))?;
            out.stl(&meshed, "soilSurface.stl")?;
            Some((surface, meshed))
        },
        Err(e) => {
            warn!(error = %e, "surface approximation failed, exporting the original geometry");
            out.step_mesh(&box_with_hole, "originalGeometry.stp")?;
            out.stl(&box_with_hole, "originalGeometry.stl")?;
            None
        },
    };
    report.surface_built = surface.is_some();

    report.model_volume = volume(&box_with_hole)?;
    report.original_volume = volume(&full_box)?;
    println!("Volume of the model is: {}", format_significant(report.model_volume, 5));
    println!(
        "Volume of the original model is: {}",
        format_significant(report.original_volume, 5)
    );

    if let Some((surface, meshed)) = &surface {
        // where the volume meets the soil
        let section = box_with_hole.section_mesh(meshed);
        if section.is_empty() {
            println!("The surface does not cross the model, no section written");
        } else {
            let summary = SectionSummary {
                segments: section.segment_count(),
                loops: section.loops().len(),
                length: section.total_length(),
            };
            info!(segments = summary.segments, loops = summary.loops, "section");
            let mut writer = StepWriter::new();
            writer.transfer_section(&section, "section")?;
            out.step(&writer, "section.stp")?;
            report.section = Some(summary);
        }

        // below and above the soil
        match box_with_hole.split_by_surface(surface, config.split_deflection) {
            Ok((below, above)) => {
                out.stl(&below, "subVolumeBelow.stl")?;
                out.stl(&above, "subVolumeAbove.stl")?;
                if !below.is_null() {
                    out.step_mesh(&below, "subVolumeBelow.stp")?;
                }
                if !above.is_null() {
                    out.step_mesh(&above, "subVolumeAbove.stp")?;
                }
                let (v_below, v_above) = (volume(&below)?, volume(&above)?);
                println!("Volume below the surface is: {}", format_significant(v_below, 5));
                println!("Volume above the surface is: {}", format_significant(v_above, 5));
                let gap = (v_below + v_above - report.model_volume).abs();
                if gap > 1e-6 * report.model_volume.max(1.0) {
                    warn!(gap, "sub-volumes do not add up to the model volume");
                }
                report.sub_volumes = Some((v_below, v_above));
            },
            Err(e) => println!("Splitting by the surface failed: {e}"),
        }
    }

    // horizontal slabs
    match box_with_hole.slices(Axis::Z, config.slice_count) {
        Ok(slabs) => {
            for (i, slab) in slabs.iter().enumerate() {
                out.stl(slab, &format!("slice{i}.stl"))?;
                let v = volume(slab)?;
                println!("Volume of slice {i} is: {}", format_significant(v, 5));
                report.slice_volumes.push(v);
            }
        },
        Err(e) => println!("Slicing failed: {e}"),
    }

    // site models
    let sources = [
        (Part::Terrain, config.terrain.as_ref()),
        (Part::Building, config.building.as_ref()),
    ];
    let mut placed = Vec::new();
    for (part, source) in sources {
        let Some(source) = source else { continue };
        let model = match Mesh::read_stl(&source.path, Some(part)) {
            Ok(model) => model,
            Err(IoError::NullShape(_)) => {
                println!("The {part} model {} is a null shape", source.path.display());
                continue;
            },
            Err(e) => return Err(e.into()),
        };
        let model = if part == Part::Terrain && config.align_terrain {
            model.to_origin()
        } else {
            model
        };
        let model = model.translate_vector(source.offset);

        let bb = model.bounding_box();
        debug!(%part, min = ?bb.mins, max = ?bb.maxs, "placed model");
        report.models.push(ModelSummary {
            part,
            faces: model.polygons.len(),
            min: bb.mins,
            max: bb.maxs,
        });
        placed.push(model);
    }
    if !placed.is_empty() {
        let combined = Mesh::compound(&placed, None);
        out.step_mesh(&combined, "combined.stp")?;
        out.stl(&combined, "combined.stl")?;
    }

    report.written = out.written;
    Ok(report)
}
