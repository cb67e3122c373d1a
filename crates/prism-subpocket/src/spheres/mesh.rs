//! Boundary mesh handle produced by the surface collaborator

use std::io::Write;

use nalgebra::Vector3;

use crate::errors::{Result, SubpocketError};

/// Closed triangular mesh with its enclosed volume
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[usize; 3]>,
    /// Enclosed volume (Å³), always non-negative
    pub volume: f64,
}

impl BoundaryMesh {
    /// Build a mesh from triangles, orienting faces outward.
    ///
    /// When the signed volume comes out negative the winding is flipped, so
    /// callers may pass faces in either orientation.
    pub fn from_triangles(vertices: Vec<[f64; 3]>, mut faces: Vec<[usize; 3]>) -> Result<Self> {
        if let Some(face) = faces
            .iter()
            .find(|face| face.iter().any(|&v| v >= vertices.len()))
        {
            return Err(SubpocketError::input(format!(
                "face {:?} references a vertex outside 0..{}",
                face,
                vertices.len()
            )));
        }

        let mut volume = signed_volume(&vertices, &faces);
        if volume < 0.0 {
            for face in &mut faces {
                face.swap(1, 2);
            }
            volume = -volume;
        }

        Ok(Self {
            vertices,
            faces,
            volume,
        })
    }

    /// Mesh handle that only carries a volume (no geometry)
    pub fn volume_only(volume: f64) -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            volume,
        }
    }

    /// Write Wavefront OBJ (1-based face indices)
    pub fn write_obj<W: Write>(&self, mut writer: W) -> Result<()> {
        for v in &self.vertices {
            writeln!(writer, "v {} {} {}", v[0], v[1], v[2])?;
        }
        for f in &self.faces {
            writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
        }
        Ok(())
    }
}

fn signed_volume(vertices: &[[f64; 3]], faces: &[[usize; 3]]) -> f64 {
    faces
        .iter()
        .map(|f| {
            let a = Vector3::from(vertices[f[0]]);
            let b = Vector3::from(vertices[f[1]]);
            let c = Vector3::from(vertices[f[2]]);
            a.dot(&b.cross(&c))
        })
        .sum::<f64>()
        / 6.0
}
