//! ISO 10303-21 (STEP) export, AP214 `AUTOMOTIVE_DESIGN` schema.
//!
//! Polygon meshes become faceted boundary representations, B-spline surfaces
//! become a single advanced face and sections become wireframe curve sets.
//! Every transferred shape gets its own product, so CAD viewers list them as
//! separate parts.

use crate::float_types::Real;
use crate::io::IoError;
use crate::mesh::Mesh;
use crate::mesh::section::Section;
use crate::surface::{BSplineCurve, BSplineSurface};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use std::fmt::{Debug, Write};
use std::path::Path;

/// Entity ids of the shared units, context and world placement
#[derive(Debug, Clone, Copy)]
struct Context {
    product: usize,
    definition: usize,
    geometry: usize,
    placement: usize,
}

/// Collects shapes and writes them into one STEP file.
///
/// ```
/// # use bim2se::io::StepWriter;
/// # use bim2se::mesh::Mesh;
/// let mut writer = StepWriter::new();
/// writer.transfer_mesh(&Mesh::<()>::cube(1.0, None).unwrap(), "cube").unwrap();
/// assert!(writer.to_step_string().contains("FACETED_BREP"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct StepWriter {
    entities: Vec<String>,
    context: Option<Context>,
    roots: usize,
}

/// STEP real literal: always carries a decimal point
fn real(x: Real) -> String {
    let x = if x == 0.0 { 0.0 } else { x };
    let s = format!("{x}");
    if s.contains('.') { s } else { s + "." }
}

/// STEP string literal, quotes doubled
fn string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn refs(ids: &[usize]) -> String {
    let inner: Vec<String> = ids.iter().map(|id| format!("#{id}")).collect();
    format!("({})", inner.join(","))
}

fn list<T: ToString>(items: &[T]) -> String {
    let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("({})", inner.join(","))
}

/// Distinct knot values and their multiplicities
fn knot_multiplicities(knots: &[Real]) -> (Vec<usize>, Vec<String>) {
    let mut mults: Vec<usize> = Vec::new();
    let mut values: Vec<Real> = Vec::new();
    for &k in knots {
        match values.last() {
            Some(&last) if (k - last).abs() <= Real::EPSILON => {
                if let Some(m) = mults.last_mut() {
                    *m += 1;
                }
            },
            _ => {
                values.push(k);
                mults.push(1);
            },
        }
    }
    (mults, values.into_iter().map(real).collect())
}

impl StepWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` until a shape has been transferred
    pub const fn is_empty(&self) -> bool {
        self.roots == 0
    }

    /// Number of transferred shapes
    pub const fn root_count(&self) -> usize {
        self.roots
    }

    fn add(&mut self, body: impl AsRef<str>) -> usize {
        let id = self.entities.len() + 1;
        self.entities.push(format!("#{id}={};", body.as_ref()));
        id
    }

    fn context(&mut self) -> Context {
        if let Some(ctx) = self.context {
            return ctx;
        }
        let app = self.add("APPLICATION_CONTEXT('automotive design')");
        self.add(format!(
            "APPLICATION_PROTOCOL_DEFINITION('international standard','automotive_design',2000,#{app})"
        ));
        let product = self.add(format!("PRODUCT_CONTEXT('',#{app},'mechanical')"));
        let definition = self.add(format!("PRODUCT_DEFINITION_CONTEXT('part definition',#{app},'design')"));
        let length = self.add("(LENGTH_UNIT()NAMED_UNIT(*)SI_UNIT(.MILLI.,.METRE.))");
        let angle = self.add("(NAMED_UNIT(*)PLANE_ANGLE_UNIT()SI_UNIT($,.RADIAN.))");
        let solid = self.add("(NAMED_UNIT(*)SI_UNIT($,.STERADIAN.)SOLID_ANGLE_UNIT())");
        let uncertainty = self.add(format!(
            "UNCERTAINTY_MEASURE_WITH_UNIT(LENGTH_MEASURE({}),#{length},'distance_accuracy_value','confusion accuracy')",
            real(crate::float_types::tolerance())
        ));
        let geometry = self.add(format!(
            "(GEOMETRIC_REPRESENTATION_CONTEXT(3)GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT((#{uncertainty}))\
             GLOBAL_UNIT_ASSIGNED_CONTEXT((#{length},#{angle},#{solid}))\
             REPRESENTATION_CONTEXT('Context #1','3D Context with UNIT and UNCERTAINTY'))"
        ));
        let origin = self.point(&Point3::origin());
        let z = self.direction(&Vector3::z());
        let x = self.direction(&Vector3::x());
        let placement = self.add(format!("AXIS2_PLACEMENT_3D('',#{origin},#{z},#{x})"));

        let ctx = Context {
            product,
            definition,
            geometry,
            placement,
        };
        self.context = Some(ctx);
        ctx
    }

    fn point(&mut self, p: &Point3<Real>) -> usize {
        self.add(format!("CARTESIAN_POINT('',({},{},{}))", real(p.x), real(p.y), real(p.z)))
    }

    fn direction(&mut self, d: &Vector3<Real>) -> usize {
        self.add(format!("DIRECTION('',({},{},{}))", real(d.x), real(d.y), real(d.z)))
    }

    /// Product structure tying a shape representation to a named part
    fn product(&mut self, name: &str, representation: &str, item: usize) {
        let ctx = self.context();
        let name = string(name);
        let rep = self.add(format!(
            "{representation}({name},(#{},#{item}),#{})",
            ctx.placement, ctx.geometry
        ));
        let product = self.add(format!("PRODUCT({name},{name},'',(#{}))", ctx.product));
        let formation = self.add(format!("PRODUCT_DEFINITION_FORMATION('','',#{product})"));
        let definition = self.add(format!(
            "PRODUCT_DEFINITION('design','',#{formation},#{})",
            ctx.definition
        ));
        let shape = self.add(format!("PRODUCT_DEFINITION_SHAPE('','',#{definition})"));
        self.add(format!("SHAPE_DEFINITION_REPRESENTATION(#{shape},#{rep})"));
        self.add(format!("PRODUCT_RELATED_PRODUCT_CATEGORY('part',$,(#{product}))"));
        self.roots += 1;
    }

    /// Transfer a polygon mesh.
    ///
    /// Closed meshes are written as a `FACETED_BREP`, open ones as a
    /// `SHELL_BASED_SURFACE_MODEL`. Each polygon is one planar face bounded
    /// by a `POLY_LOOP`; coincident vertices share a `CARTESIAN_POINT`.
    pub fn transfer_mesh<S: Clone + Send + Sync + Debug>(
        &mut self,
        mesh: &Mesh<S>,
        name: &str,
    ) -> Result<(), IoError> {
        if mesh.is_null() {
            return Err(IoError::NullShape(name.to_string()));
        }
        self.context();

        let mut points: HashMap<[u64; 3], usize> = HashMap::new();
        let mut faces = Vec::with_capacity(mesh.polygons.len());
        for poly in mesh.polygons.iter().filter(|p| !p.is_degenerate()) {
            let corners: Vec<usize> = poly
                .vertices
                .iter()
                .map(|v| {
                    let key = [v.pos.x.to_bits(), v.pos.y.to_bits(), v.pos.z.to_bits()];
                    match points.get(&key) {
                        Some(&id) => id,
                        None => {
                            let id = self.point(&v.pos);
                            points.insert(key, id);
                            id
                        },
                    }
                })
                .collect();

            let poly_loop = self.add(format!("POLY_LOOP('',{})", refs(&corners)));
            let bound = self.add(format!("FACE_OUTER_BOUND('',#{poly_loop},.T.)"));

            let (u, _) = poly.plane.basis();
            let location = corners[0];
            let axis = self.direction(&poly.plane.normal);
            let ref_dir = self.direction(&u);
            let frame = self.add(format!("AXIS2_PLACEMENT_3D('',#{location},#{axis},#{ref_dir})"));
            let plane = self.add(format!("PLANE('',#{frame})"));
            faces.push(self.add(format!("FACE_SURFACE('',(#{bound}),#{plane},.T.)")));
        }

        let label = string(name);
        if mesh.is_closed() {
            let shell = self.add(format!("CLOSED_SHELL('',{})", refs(&faces)));
            let brep = self.add(format!("FACETED_BREP({label},#{shell})"));
            self.product(name, "FACETED_BREP_SHAPE_REPRESENTATION", brep);
        } else {
            let shell = self.add(format!("OPEN_SHELL('',{})", refs(&faces)));
            let model = self.add(format!("SHELL_BASED_SURFACE_MODEL({label},(#{shell}))"));
            self.product(name, "MANIFOLD_SURFACE_SHAPE_REPRESENTATION", model);
        }
        tracing::debug!(name, faces = faces.len(), points = points.len(), "STEP mesh");
        Ok(())
    }

    fn curve(&mut self, curve: &BSplineCurve) -> usize {
        let poles: Vec<usize> = curve.control_points().iter().map(|p| self.point(p)).collect();
        let (mults, knots) = knot_multiplicities(curve.knots());
        self.add(format!(
            "B_SPLINE_CURVE_WITH_KNOTS('',{},{},.UNSPECIFIED.,.F.,.F.,{},{},.UNSPECIFIED.)",
            curve.degree(),
            refs(&poles),
            list(&mults),
            list(&knots)
        ))
    }

    /// Transfer a B-spline surface as one `ADVANCED_FACE` bounded by its four
    /// boundary curves.
    pub fn transfer_surface(&mut self, surface: &BSplineSurface, name: &str) -> Result<(), IoError> {
        self.context();

        let rows: Vec<String> = surface
            .control_points()
            .iter()
            .map(|row| {
                let ids: Vec<usize> = row.iter().map(|p| self.point(p)).collect();
                refs(&ids)
            })
            .collect();
        let (mults_u, knots_u) = knot_multiplicities(surface.knots_u());
        let (mults_v, knots_v) = knot_multiplicities(surface.knots_v());
        let geometry = self.add(format!(
            "B_SPLINE_SURFACE_WITH_KNOTS({},{},{},({}),.UNSPECIFIED.,.F.,.F.,.F.,{},{},{},{},.UNSPECIFIED.)",
            string(name),
            surface.degree_u(),
            surface.degree_v(),
            rows.join(","),
            list(&mults_u),
            list(&mults_v),
            list(&knots_u),
            list(&knots_v)
        ));

        let ((u0, u1), (v0, v1)) = surface.domain();
        let corners: Vec<usize> = [(u0, v0), (u1, v0), (u1, v1), (u0, v1)]
            .iter()
            .map(|&(u, v)| {
                let p = self.point(&surface.evaluate(u, v));
                self.add(format!("VERTEX_POINT('',#{p})"))
            })
            .collect();

        let [u_min, u_max, v_min, v_max] = surface.boundary_curves();
        // (edge curve, start corner, end corner, same sense as the loop)
        let sides = [
            (v_min, 0, 1, true),
            (u_max, 1, 2, true),
            (v_max, 3, 2, false),
            (u_min, 0, 3, false),
        ];
        let mut oriented = Vec::with_capacity(4);
        for (curve, start, end, sense) in sides {
            let geometry = self.curve(&curve);
            let edge = self.add(format!(
                "EDGE_CURVE('',#{},#{},#{geometry},.T.)",
                corners[start], corners[end]
            ));
            let flag = if sense { ".T." } else { ".F." };
            oriented.push(self.add(format!("ORIENTED_EDGE('',*,*,#{edge},{flag})")));
        }

        let edge_loop = self.add(format!("EDGE_LOOP('',{})", refs(&oriented)));
        let bound = self.add(format!("FACE_OUTER_BOUND('',#{edge_loop},.T.)"));
        let face = self.add(format!("ADVANCED_FACE({},(#{bound}),#{geometry},.T.)", string(name)));
        let shell = self.add(format!("OPEN_SHELL('',(#{face}))"));
        let model = self.add(format!("SHELL_BASED_SURFACE_MODEL({},(#{shell}))", string(name)));
        self.product(name, "MANIFOLD_SURFACE_SHAPE_REPRESENTATION", model);
        Ok(())
    }

    /// Transfer section curves as a `GEOMETRIC_CURVE_SET` of polylines, one
    /// per chained loop or open chain.
    pub fn transfer_section(&mut self, section: &Section, name: &str) -> Result<(), IoError> {
        if section.is_empty() {
            return Err(IoError::NullShape(name.to_string()));
        }
        self.context();

        let mut polylines = Vec::new();
        for chain in section.loops() {
            let mut ids: Vec<usize> = chain.points.iter().map(|p| self.point(p)).collect();
            if chain.closed {
                ids.push(ids[0]);
            }
            if ids.len() >= 2 {
                polylines.push(self.add(format!("POLYLINE('',{})", refs(&ids))));
            }
        }

        let set = self.add(format!("GEOMETRIC_CURVE_SET({},{})", string(name), refs(&polylines)));
        self.product(name, "GEOMETRICALLY_BOUNDED_WIREFRAME_SHAPE_REPRESENTATION", set);
        Ok(())
    }

    /// The complete exchange file
    pub fn to_step_string(&self) -> String {
        let mut out = String::new();
        out.push_str("ISO-10303-21;\n");
        out.push_str("HEADER;\n");
        out.push_str("FILE_DESCRIPTION(('BIM2SE export'),'2;1');\n");
        out.push_str("FILE_NAME('','',(''),(''),'bim2se','','');\n");
        out.push_str("FILE_SCHEMA(('AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }'));\n");
        out.push_str("ENDSEC;\n");
        out.push_str("DATA;\n");
        for entity in &self.entities {
            let _ = writeln!(out, "{entity}");
        }
        out.push_str("ENDSEC;\n");
        out.push_str("END-ISO-10303-21;\n");
        out
    }

    /// Write the file; fails when nothing was transferred.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(IoError::Step(format!(
                "no shape transferred for {}",
                path.display()
            )));
        }
        std::fs::write(path, self.to_step_string())?;
        tracing::debug!(path = %path.display(), entities = self.entities.len(), "wrote STEP");
        Ok(())
    }
}
