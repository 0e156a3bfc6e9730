//! `bim2se`: runs the geometry pipeline and prints its measurements.

use bim2se::float_types::{Real, set_tolerance};
use bim2se::pipeline::{self, ModelSource, PipelineConfig};
use clap::Parser;
use nalgebra::Vector3;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bim2se", version, about = "Site geometry: volumes, soil surfaces, sections and splits")]
struct Cli {
    /// Directory the STEP and STL files are written to
    #[arg(long, env = "BIM2SE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Terrain model (STL)
    #[arg(long)]
    terrain: Option<PathBuf>,

    /// Building model (STL)
    #[arg(long)]
    building: Option<PathBuf>,

    /// Translation applied to the terrain, as X,Y,Z
    #[arg(long, value_parser = parse_offset, default_value = "0,0,0", allow_hyphen_values = true)]
    terrain_offset: Vector3<Real>,

    /// Translation applied to the building, as X,Y,Z
    #[arg(long, value_parser = parse_offset, default_value = "0,0,0", allow_hyphen_values = true)]
    building_offset: Vector3<Real>,

    /// Move the terrain's lowest corner to the origin before offsetting it
    #[arg(long)]
    align_terrain: bool,

    /// Number of horizontal slabs the model is cut into
    #[arg(long, default_value_t = 4)]
    slices: usize,

    /// Largest distance between the soil surface and its exported mesh
    #[arg(long, default_value_t = 0.01)]
    deflection: Real,

    /// Facets around the cylindrical hole
    #[arg(long, default_value_t = 32)]
    cylinder_segments: usize,

    /// Geometric tolerance for classification and point matching
    #[arg(long)]
    tolerance: Option<Real>,

    /// Accepted for compatibility and ignored
    #[arg(hide = true, trailing_var_arg = true)]
    rest: Vec<String>,
}

fn parse_offset(s: &str) -> Result<Vector3<Real>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected X,Y,Z, got {s:?}"));
    };
    let parse = |v: &str| v.parse::<Real>().map_err(|e| format!("{v:?}: {e}"));
    Ok(Vector3::new(parse(x)?, parse(y)?, parse(z)?))
}

impl Cli {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            output_dir: self.output_dir.clone(),
            cylinder_segments: self.cylinder_segments,
            mesh_deflection: self.deflection,
            slice_count: self.slices,
            terrain: self
                .terrain
                .as_ref()
                .map(|p| ModelSource::new(p).with_offset(self.terrain_offset)),
            building: self
                .building
                .as_ref()
                .map(|p| ModelSource::new(p).with_offset(self.building_offset)),
            align_terrain: self.align_terrain,
            ..PipelineConfig::default()
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    println!("BIM2SE - (c) {}", env!("CARGO_PKG_AUTHORS"));

    if let Some(tolerance) = cli.tolerance {
        if !set_tolerance(tolerance) {
            tracing::warn!(tolerance, "tolerance was already fixed, ignoring");
        }
    }
    if !cli.rest.is_empty() {
        tracing::debug!(args = ?cli.rest, "ignoring extra arguments");
    }

    let config = cli.config();
    tracing::info!(
        output_dir = %config.output_dir.display(),
        slices = config.slice_count,
        deflection = config.mesh_deflection,
        "starting BIM2SE"
    );

    match pipeline::run(&config) {
        Ok(report) => {
            tracing::info!(files = report.written.len(), "done");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(error = %e, "pipeline aborted");
            eprintln!("bim2se: {e}");
            ExitCode::FAILURE
        },
    }
}
