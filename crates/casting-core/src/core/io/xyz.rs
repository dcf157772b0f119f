use crate::core::constraints::Constraint;
use crate::core::io::traits::StructureFile;
use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::models::structure::{StructureData, StructureError};
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Frame has no Lattice entry in its comment line")]
    MissingLattice,
    #[error("Frame species {found:?} do not match expected {expected:?}")]
    SpeciesMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Invalid lattice: {0}")]
    Lattice(#[from] LatticeError),
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Unexpected end of input; expected {expected} atom lines, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("Atom line must have a species and three coordinates: '{0}'")]
    InvalidAtomLine(String),
    #[error("Invalid number '{0}'")]
    InvalidFloat(String),
    #[error("Lattice must contain nine numbers, found {0}")]
    InvalidLattice(usize),
}

/// One extended-XYZ frame in Cartesian coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct XyzFrame {
    pub lattice: Option<Lattice>,
    pub species: Vec<String>,
    pub positions: Vec<Point3<f64>>,
    pub energy: Option<f64>,
}

impl XyzFrame {
    pub fn from_structure(structure: &StructureData, energy: Option<f64>) -> Self {
        Self {
            lattice: Some(structure.lattice().clone()),
            species: structure.species().to_vec(),
            positions: structure.cartesian_coords(),
            energy,
        }
    }

    /// Converts the frame into a structure bound to `constraint`.
    ///
    /// # Errors
    ///
    /// Returns [`XyzError::MissingLattice`] when the frame carries no cell.
    pub fn into_structure(self, constraint: Arc<Constraint>) -> Result<StructureData, XyzError> {
        let lattice = self.lattice.ok_or(XyzError::MissingLattice)?;
        Ok(StructureData::from_cartesian(
            lattice,
            &self.positions,
            self.species,
            constraint,
        )?)
    }

    /// Converts the frame into a variant of `template`, such as a relaxed copy returned by an
    /// external program.
    ///
    /// The frame's cell is used when present, otherwise the template's. Species must match the
    /// template atom for atom.
    pub fn into_structure_like(self, template: &StructureData) -> Result<StructureData, XyzError> {
        if self.species != template.species() {
            return Err(XyzError::SpeciesMismatch {
                expected: template.species().to_vec(),
                found: self.species,
            });
        }
        let lattice = self
            .lattice
            .unwrap_or_else(|| template.lattice().clone());
        Ok(StructureData::from_cartesian(
            lattice,
            &self.positions,
            self.species,
            Arc::clone(template.constraint()),
        )?)
    }
}

pub struct XyzFile;

impl StructureFile for XyzFile {
    type Frame = XyzFrame;
    type Error = XyzError;

    fn read_frame(reader: &mut impl BufRead) -> Result<Option<Self::Frame>, Self::Error> {
        let mut line_num = 0;
        let mut line = String::new();

        let count_line = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            line_num += 1;
            if !line.trim().is_empty() {
                break line.trim().to_string();
            }
        };
        let count: usize = count_line.parse().map_err(|_| XyzError::Parse {
            line: line_num,
            kind: XyzParseErrorKind::InvalidCount(count_line.clone()),
        })?;

        line.clear();
        reader.read_line(&mut line)?;
        line_num += 1;
        let properties = parse_comment(&line);

        let lattice = match properties.get("lattice") {
            Some(value) => Some(parse_lattice(value).map_err(|kind| XyzError::Parse {
                line: line_num,
                kind,
            })??),
            None => None,
        };
        let energy = match properties.get("energy") {
            Some(value) => Some(parse_float(value).map_err(|kind| XyzError::Parse {
                line: line_num,
                kind,
            })?),
            None => None,
        };

        // The count is untrusted; grow as atom lines arrive.
        let mut species = Vec::new();
        let mut positions = Vec::new();
        for found in 0..count {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(XyzError::Parse {
                    line: line_num,
                    kind: XyzParseErrorKind::Truncated {
                        expected: count,
                        found,
                    },
                });
            }
            line_num += 1;

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(XyzError::Parse {
                    line: line_num,
                    kind: XyzParseErrorKind::InvalidAtomLine(line.trim().to_string()),
                });
            }
            let coords = fields[1..4]
                .iter()
                .map(|f| parse_float(f))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|kind| XyzError::Parse {
                    line: line_num,
                    kind,
                })?;
            species.push(fields[0].to_string());
            positions.push(Point3::new(coords[0], coords[1], coords[2]));
        }

        Ok(Some(XyzFrame {
            lattice,
            species,
            positions,
            energy,
        }))
    }

    fn write_frame(frame: &Self::Frame, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", frame.species.len())?;

        let mut comment = Vec::new();
        if let Some(lattice) = &frame.lattice {
            let values: Vec<String> = (0..3)
                .flat_map(|i| {
                    let v = lattice.vector(i);
                    [v.x, v.y, v.z]
                })
                .map(|x| format!("{:.10}", x))
                .collect();
            comment.push(format!("Lattice=\"{}\"", values.join(" ")));
        }
        comment.push("Properties=species:S:1:pos:R:3".to_string());
        if let Some(energy) = frame.energy {
            comment.push(format!("energy={}", energy));
        }
        comment.push("pbc=\"T T T\"".to_string());
        writeln!(writer, "{}", comment.join(" "))?;

        for (s, p) in frame.species.iter().zip(&frame.positions) {
            writeln!(writer, "{:<3} {:>16.10} {:>16.10} {:>16.10}", s, p.x, p.y, p.z)?;
        }
        Ok(())
    }
}

/// Splits an extended-XYZ comment line into lowercase keys and unquoted values.
fn parse_comment(line: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    let mut chars = line.trim().chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let key: String = std::iter::from_fn(|| chars.next_if(|&c| c != '=' && !c.is_whitespace()))
            .collect();
        if key.is_empty() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            properties.insert(key.to_lowercase(), String::new());
            continue;
        }
        let value: String = if chars.next_if_eq(&'"').is_some() {
            let quoted: String = std::iter::from_fn(|| chars.next_if(|&c| c != '"')).collect();
            chars.next();
            quoted
        } else {
            std::iter::from_fn(|| chars.next_if(|c| !c.is_whitespace())).collect()
        };
        properties.insert(key.to_lowercase(), value);
    }
    properties
}

fn parse_float(value: &str) -> Result<f64, XyzParseErrorKind> {
    value
        .trim()
        .parse()
        .map_err(|_| XyzParseErrorKind::InvalidFloat(value.to_string()))
}

fn parse_lattice(value: &str) -> Result<Result<Lattice, LatticeError>, XyzParseErrorKind> {
    let numbers = value
        .split_whitespace()
        .map(parse_float)
        .collect::<Result<Vec<_>, _>>()?;
    if numbers.len() != 9 {
        return Err(XyzParseErrorKind::InvalidLattice(numbers.len()));
    }
    let a = Vector3::new(numbers[0], numbers[1], numbers[2]);
    let b = Vector3::new(numbers[3], numbers[4], numbers[5]);
    let c = Vector3::new(numbers[6], numbers[7], numbers[8]);
    Ok(Lattice::from_matrix(Matrix3::from_columns(&[a, b, c])))
}
