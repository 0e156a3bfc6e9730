use crate::float_types::Real;
use crate::io::IoError;
use crate::mesh::Mesh;
use crate::mesh::polygon::Polygon;
use nalgebra::Point3;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use stl_io::{Normal, Triangle, Vertex};

impl<S: Clone + Debug + Send + Sync> Mesh<S> {
    /// Triangles with their face normals, in single precision for STL
    fn stl_triangles(&self) -> Vec<Triangle> {
        self.polygons
            .iter()
            .flat_map(|poly| {
                let n = poly.plane.normal;
                poly.triangulate().into_iter().map(move |tri| Triangle {
                    normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                    vertices: tri.map(|v| {
                        Vertex::new([v.pos.x as f32, v.pos.y as f32, v.pos.z as f32])
                    }),
                })
            })
            .collect()
    }

    /// Convert this Mesh to an **ASCII STL** string with the given `name`.
    ///
    /// ```rust
    /// # use bim2se::mesh::Mesh;
    /// let mesh = Mesh::<()>::cube(1.0, None).unwrap();
    /// let text = mesh.to_stl_ascii("my_solid");
    /// assert!(text.starts_with("solid my_solid"));
    /// ```
    pub fn to_stl_ascii(&self, name: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("solid {name}\n"));
        for poly in &self.polygons {
            let n = poly.plane.normal;
            for tri in poly.triangulate() {
                out.push_str(&format!("  facet normal {:.6} {:.6} {:.6}\n", n.x, n.y, n.z));
                out.push_str("    outer loop\n");
                for v in &tri {
                    let p = v.pos;
                    out.push_str(&format!("      vertex {:.6} {:.6} {:.6}\n", p.x, p.y, p.z));
                }
                out.push_str("    endloop\n");
                out.push_str("  endfacet\n");
            }
        }
        out.push_str(&format!("endsolid {name}\n"));
        out
    }

    /// Convert this Mesh to a **binary STL** byte vector.
    pub fn to_stl_binary(&self) -> std::io::Result<Vec<u8>> {
        let triangles = self.stl_triangles();
        let mut cursor = Cursor::new(Vec::new());
        stl_io::write_stl(&mut cursor, triangles.iter())?;
        Ok(cursor.into_inner())
    }

    /// Write this Mesh to `path` as binary STL.
    pub fn write_stl(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let path = path.as_ref();
        let triangles = self.stl_triangles();
        let mut writer = BufWriter::new(File::create(path)?);
        stl_io::write_stl(&mut writer, triangles.iter())?;
        tracing::debug!(path = %path.display(), triangles = triangles.len(), "wrote STL");
        Ok(())
    }

    /// Build a Mesh from STL data (ASCII or binary).
    ///
    /// Every triangle becomes its own face: vertices are not merged and
    /// nothing is sewn, so the result is a "soup" of faces. Triangles with
    /// collinear corners are dropped.
    ///
    /// ## Errors
    /// `MalformedInput` when the data is not STL, `NullShape` when no face
    /// survives.
    pub fn from_stl(stl_data: &[u8], metadata: Option<S>) -> Result<Mesh<S>, IoError> {
        let mut cursor = Cursor::new(stl_data);
        Self::read_triangles(&mut cursor, "STL data", metadata)
    }

    /// Load an STL file, see [`Mesh::from_stl`].
    pub fn read_stl(path: impl AsRef<Path>, metadata: Option<S>) -> Result<Mesh<S>, IoError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_triangles(&mut reader, &path.display().to_string(), metadata)
    }

    fn read_triangles<R: Read + Seek>(
        reader: &mut R,
        source: &str,
        metadata: Option<S>,
    ) -> Result<Mesh<S>, IoError> {
        if reader.seek(SeekFrom::End(0))? == 0 {
            return Err(IoError::NullShape(source.to_string()));
        }
        reader.rewind()?;

        let stl_reader = stl_io::create_stl_reader(reader)
            .map_err(|e| IoError::MalformedInput(format!("{source}: {e}")))?;

        let mut polygons = Vec::new();
        let mut skipped = 0usize;
        for tri_result in stl_reader {
            let tri = tri_result.map_err(|e| IoError::MalformedInput(format!("{source}: {e}")))?;
            let [a, b, c] = tri
                .vertices
                .map(|v| Point3::new(v[0] as Real, v[1] as Real, v[2] as Real));
            match Polygon::triangle(a, b, c, metadata.clone()) {
                Some(face) => polygons.push(face),
                None => skipped += 1,
            }
        }

        tracing::debug!(source, faces = polygons.len(), skipped, "read STL");
        if polygons.is_empty() {
            return Err(IoError::NullShape(source.to_string()));
        }
        Ok(Mesh::from_polygons(&polygons, metadata))
    }
}
