use crate::core::io::traits::StructureFile;
use crate::core::models::element::normalize_symbol;
use crate::core::models::structure::{AtomicStructure, StructureError};
use nalgebra::{Matrix3, Point3};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Frame starting on line {line} declares {expected} atoms but only {found} follow")]
    Truncated {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count (value: '{value}')")]
    InvalidCount { value: String },
    #[error("Invalid float in column {column} (value: '{value}')")]
    InvalidFloat { column: usize, value: String },
    #[error("Atom line needs a symbol and three coordinates")]
    TooFewColumns,
    #[error("Lattice needs nine numbers (value: '{value}')")]
    InvalidLattice { value: String },
    #[error("Invalid pbc flags (value: '{value}')")]
    InvalidPbc { value: String },
}

/// Plain and extended XYZ files.
///
/// Only the species and the first three numeric columns of every atom line
/// are used. An extended-XYZ comment line may carry `Lattice="..."` and
/// `pbc="..."`, which become the structure's cell and periodicity.
pub struct XyzFile;

impl XyzFile {
    /// Reads every frame of a (possibly multi-frame) XYZ stream in order.
    pub fn read_frames(reader: &mut impl BufRead) -> Result<Vec<AtomicStructure>, XyzError> {
        let mut frames = Vec::new();
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(i, line)| line.map(|l| (i + 1, l)));

        loop {
            let header = loop {
                match lines.next().transpose()? {
                    Some((_, line)) if line.trim().is_empty() => continue,
                    other => break other,
                }
            };
            let Some((header_line, header)) = header else {
                break;
            };

            let count: usize = header.trim().parse().map_err(|_| XyzError::Parse {
                line: header_line,
                kind: XyzParseErrorKind::InvalidCount {
                    value: header.trim().into(),
                },
            })?;
            let (comment_line, comment) =
                lines
                    .next()
                    .transpose()?
                    .ok_or_else(|| XyzError::Truncated {
                        line: header_line,
                        expected: count,
                        found: 0,
                    })?;

            // The header count is untrusted; grow as lines actually arrive.
            let mut symbols = Vec::new();
            let mut positions = Vec::new();
            for found in 0..count {
                let (line_num, line) =
                    lines
                        .next()
                        .transpose()?
                        .ok_or_else(|| XyzError::Truncated {
                            line: header_line,
                            expected: count,
                            found,
                        })?;
                let (symbol, position) = parse_atom_line(&line, line_num)?;
                symbols.push(symbol);
                positions.push(position);
            }

            let structure = AtomicStructure::new(symbols, positions)?;
            let structure = match parse_cell(&comment, comment_line)? {
                Some((cell, pbc)) => structure.with_cell(cell, pbc),
                None => structure,
            };
            frames.push(structure);
        }

        Ok(frames)
    }
}

impl StructureFile for XyzFile {
    type Error = XyzError;

    /// Reads the last frame of the stream.
    fn read_from(reader: &mut impl BufRead) -> Result<AtomicStructure, Self::Error> {
        Self::read_frames(reader)?
            .pop()
            .ok_or_else(|| XyzError::MissingRecord("atom count line".into()))
    }

    fn write_to(structure: &AtomicStructure, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", structure.len())?;
        match structure.cell() {
            Some(cell) => {
                let lattice: Vec<String> = (0..3)
                    .flat_map(|i| (0..3).map(move |j| (i, j)))
                    .map(|(i, j)| format!("{:.8}", cell[(i, j)]))
                    .collect();
                let pbc: Vec<&str> = structure
                    .pbc()
                    .iter()
                    .map(|&p| if p { "T" } else { "F" })
                    .collect();
                writeln!(
                    writer,
                    "Lattice=\"{}\" pbc=\"{}\"",
                    lattice.join(" "),
                    pbc.join(" ")
                )?;
            }
            None => writeln!(writer, "{}", structure.chemical_formula())?,
        }
        for (symbol, position) in structure.symbols().iter().zip(structure.positions()) {
            writeln!(
                writer,
                "{:<2} {:>16.8} {:>16.8} {:>16.8}",
                symbol, position.x, position.y, position.z
            )?;
        }
        Ok(())
    }
}

fn parse_atom_line(line: &str, line_num: usize) -> Result<(String, Point3<f64>), XyzError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(XyzError::Parse {
            line: line_num,
            kind: XyzParseErrorKind::TooFewColumns,
        });
    }
    let mut coords = [0.0; 3];
    for (i, coord) in coords.iter_mut().enumerate() {
        *coord = fields[i + 1]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| XyzError::Parse {
                line: line_num,
                kind: XyzParseErrorKind::InvalidFloat {
                    column: i + 2,
                    value: fields[i + 1].into(),
                },
            })?;
    }
    Ok((
        normalize_symbol(fields[0]),
        Point3::new(coords[0], coords[1], coords[2]),
    ))
}

fn parse_cell(comment: &str, line_num: usize) -> Result<Option<(Matrix3<f64>, [bool; 3])>, XyzError> {
    let keys = parse_comment_keys(comment);
    let Some(lattice) = keys.get("lattice") else {
        return Ok(None);
    };

    let values: Vec<f64> = lattice
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()
        .filter(|v: &Vec<f64>| v.len() == 9 && v.iter().all(|x| x.is_finite()))
        .ok_or_else(|| XyzError::Parse {
            line: line_num,
            kind: XyzParseErrorKind::InvalidLattice {
                value: lattice.clone(),
            },
        })?;
    let cell = Matrix3::from_row_slice(&values);

    let pbc = match keys.get("pbc") {
        Some(raw) => {
            let flags: Vec<bool> = raw
                .split_whitespace()
                .map(|f| match f {
                    "T" | "t" | "True" | "true" | "1" => Some(true),
                    "F" | "f" | "False" | "false" | "0" => Some(false),
                    _ => None,
                })
                .collect::<Option<_>>()
                .filter(|v: &Vec<bool>| v.len() == 3)
                .ok_or_else(|| XyzError::Parse {
                    line: line_num,
                    kind: XyzParseErrorKind::InvalidPbc { value: raw.clone() },
                })?;
            [flags[0], flags[1], flags[2]]
        }
        None => [true; 3],
    };

    Ok(Some((cell, pbc)))
}

/// Splits an extended-XYZ comment line into lowercase `key=value` pairs.
/// Values may be wrapped in double quotes to include whitespace.
fn parse_comment_keys(comment: &str) -> HashMap<String, String> {
    let mut keys = HashMap::new();
    let mut chars = comment.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let key: String = std::iter::from_fn(|| chars.next_if(|c| *c != '=' && !c.is_whitespace()))
            .collect();
        if key.is_empty() {
            if chars.next().is_none() {
                break;
            }
            continue;
        }
        if chars.next_if_eq(&'=').is_none() {
            keys.insert(key.to_lowercase(), String::new());
            continue;
        }
        let value: String = if chars.next_if_eq(&'"').is_some() {
            let quoted = std::iter::from_fn(|| chars.next_if(|c| *c != '"')).collect();
            chars.next();
            quoted
        } else {
            std::iter::from_fn(|| chars.next_if(|c| !c.is_whitespace())).collect()
        };
        keys.insert(key.to_lowercase(), value);
    }

    keys
}
