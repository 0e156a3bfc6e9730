//! **BIM2SE**: site geometry for building information models.
//!
//! A small polygon **Constructive Solid Geometry (CSG)** kernel, built around
//! Boolean operations (*union*, *difference*, *intersection*, *xor*) on sets of
//! polygons stored in [BSP](mesh::bsp) trees, plus what a site workflow needs
//! on top of it:
//!
//! - primitives (boxes, cylinders) in [`mesh::shapes`]
//! - B-spline soil surfaces fitted to scattered points in [`surface`]
//! - sections against planes and surfaces in [`mesh::section`]
//! - splitting into sub-volumes and slabs in [`mesh::split`]
//! - volume and centre of mass through [parry](https://parry.rs) in [`mesh::properties`]
//! - STL import/export and STEP export in [`io`]
//! - the end-to-end run in [`pipeline`]
//!
//! ```
//! use bim2se::mesh::Mesh;
//! use bim2se::traits::CSGOps;
//!
//! let block: Mesh<()> = Mesh::box_from_corner([-50.0, -50.0, 0.0].into(), 100.0, 100.0, 100.0, None).unwrap();
//! let hole: Mesh<()> = Mesh::cylinder(25.0, 50.0, 32, None).unwrap();
//! let part = block.difference(&hole);
//! assert!(part.volume_properties().unwrap().volume < 1e6);
//! ```

#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod errors;
pub mod float_types;
pub mod io;
pub mod mesh;
pub mod pipeline;
pub mod surface;
pub mod traits;

pub use mesh::Mesh;
pub use traits::CSGOps;
