//! Whitespace-delimited `x y z r g` sphere tables
//!
//! Floats are written with Rust's shortest round-trip formatting, so reading
//! a table back reproduces every value exactly. Tables with 4 columns are
//! accepted on input and read as ungrouped spheres.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{Group, Sphere, SphereSet};
use crate::errors::{Result, SubpocketError};

impl SphereSet {
    /// Write one `x y z r g` row per sphere
    pub fn write_xyzrg<W: Write>(&self, mut writer: W) -> Result<()> {
        for s in self.spheres() {
            writeln!(
                writer,
                "{} {} {} {} {}",
                s.center[0],
                s.center[1],
                s.center[2],
                s.radius,
                s.group.label()
            )?;
        }
        Ok(())
    }

    pub fn to_xyzrg_string(&self) -> String {
        let mut buffer = Vec::new();
        // writes into a Vec cannot fail
        let _ = self.write_xyzrg(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Parse a 4- or 5-column table; blank lines and `#` comments are skipped
    pub fn read_xyzrg<R: BufRead>(reader: R) -> Result<Self> {
        let mut spheres = Vec::new();
        let mut width: Option<usize> = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let values = trimmed
                .split_whitespace()
                .map(|field| {
                    field.parse::<f64>().map_err(|e| {
                        SubpocketError::parse(line_no, format!("invalid number '{}': {}", field, e))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            match width {
                None => {
                    if values.len() != 4 && values.len() != 5 {
                        return Err(SubpocketError::parse(
                            line_no,
                            format!("{} columns found; must contain 4 or 5", values.len()),
                        ));
                    }
                    width = Some(values.len());
                }
                Some(w) if w != values.len() => {
                    return Err(SubpocketError::parse(
                        line_no,
                        format!("{} columns found; earlier rows have {}", values.len(), w),
                    ));
                }
                Some(_) => {}
            }

            let group = match values.get(4) {
                Some(&label) => Group::from_label(label)
                    .map_err(|e| SubpocketError::parse(line_no, e.to_string()))?,
                None => Group::Ungrouped,
            };
            spheres.push(Sphere::new([values[0], values[1], values[2]], values[3], group));
        }

        SphereSet::new(spheres)
    }

    pub fn from_xyzrg_str(text: &str) -> Result<Self> {
        Self::read_xyzrg(text.as_bytes())
    }

    /// Read a table from disk; the file stem becomes the set name
    pub fn from_xyzrg_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut set = Self::read_xyzrg(BufReader::new(file))?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            set.set_name(stem);
        }
        log::debug!("Spheres read from {}", path.display());
        Ok(set)
    }

    /// Write the table and, when requested, the mesh as a sibling `.obj`
    pub fn write_xyzrg_file(&self, path: impl AsRef<Path>, output_mesh: bool) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_xyzrg(&mut writer)?;
        writer.flush()?;
        log::debug!("{} written to xyzrg file: {}", self.label(), path.display());

        if output_mesh {
            let mesh = self.mesh().ok_or_else(|| {
                SubpocketError::input(format!(
                    "mesh can not be written alongside {}: none computed",
                    path.display()
                ))
            })?;
            let obj_path = path.with_extension("obj");
            let mut obj = BufWriter::new(File::create(&obj_path)?);
            mesh.write_obj(&mut obj)?;
            obj.flush()?;
            log::debug!("{} written to obj file: {}", self.label(), obj_path.display());
        }
        Ok(())
    }
}
