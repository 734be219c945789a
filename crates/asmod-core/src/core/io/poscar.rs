use crate::core::io::traits::StructureFile;
use crate::core::models::element::{atomic_weight, normalize_symbol};
use crate::core::models::structure::{AtomicStructure, StructureError};
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoscarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PoscarParseErrorKind,
    },
    #[error("Unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("POSCAR output requires a unit cell")]
    MissingCell,
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Error)]
pub enum PoscarParseErrorKind {
    #[error("Invalid float (value: '{value}')")]
    InvalidFloat { value: String },
    #[error("Invalid atom count (value: '{value}')")]
    InvalidCount { value: String },
    #[error("Expected {expected} values, found {found}")]
    WrongFieldCount { expected: usize, found: usize },
    #[error("Scaling factor must be non-zero")]
    ZeroScale,
    #[error("Species names are missing and cannot be taken from the comment line")]
    MissingSpecies,
}

/// VASP POSCAR/CONTCAR structure files.
///
/// VASP 5 files carry a species line before the counts. For VASP 4 files the
/// species are taken from the leading words of the comment line. Direct
/// (fractional) coordinates are converted to cartesian using the scaled cell.
pub struct PoscarFile;

struct LineReader<'a, R: BufRead> {
    reader: &'a mut R,
    line_num: usize,
}

impl<'a, R: BufRead> LineReader<'a, R> {
    fn next(&mut self, what: &'static str) -> Result<(usize, String), PoscarError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(PoscarError::UnexpectedEof(what));
            }
            self.line_num += 1;
            if !line.trim().is_empty() || what == "comment" {
                return Ok((self.line_num, line.trim_end().to_string()));
            }
        }
    }
}

fn parse_floats(line: &str, line_num: usize, expected: usize) -> Result<Vec<f64>, PoscarError> {
    let fields: Vec<&str> = line.split_whitespace().take(expected).collect();
    if fields.len() < expected {
        return Err(PoscarError::Parse {
            line: line_num,
            kind: PoscarParseErrorKind::WrongFieldCount {
                expected,
                found: fields.len(),
            },
        });
    }
    fields
        .iter()
        .map(|f| {
            f.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PoscarError::Parse {
                    line: line_num,
                    kind: PoscarParseErrorKind::InvalidFloat {
                        value: f.to_string(),
                    },
                })
        })
        .collect()
}

fn parse_counts(line: &str) -> Option<Vec<usize>> {
    line.split_whitespace()
        .map(|f| f.parse().ok())
        .collect::<Option<Vec<usize>>>()
        .filter(|v| !v.is_empty())
}

impl StructureFile for PoscarFile {
    type Error = PoscarError;

    fn read_from(reader: &mut impl BufRead) -> Result<AtomicStructure, Self::Error> {
        let mut lines = LineReader {
            reader,
            line_num: 0,
        };

        let (_, comment) = lines.next("comment")?;

        let (scale_line, scale_raw) = lines.next("scaling factor")?;
        // Three leading numbers are per-axis factors; anything after one number is a comment.
        let numeric = scale_raw
            .split_whitespace()
            .take_while(|f| f.parse::<f64>().is_ok())
            .count();
        let scale_fields = if numeric == 3 { 3 } else { 1 };
        let scale = parse_floats(&scale_raw, scale_line, scale_fields)?;

        let mut rows = [[0.0; 3]; 3];
        for row in rows.iter_mut() {
            let (line_num, raw) = lines.next("lattice vectors")?;
            let values = parse_floats(&raw, line_num, 3)?;
            row.copy_from_slice(&values);
        }
        let mut cell = Matrix3::from_fn(|i, j| rows[i][j]);

        let factors = if scale.len() == 3 {
            Vector3::new(scale[0], scale[1], scale[2])
        } else if scale[0] < 0.0 {
            Vector3::repeat((scale[0].abs() / cell.determinant().abs()).cbrt())
        } else if scale[0] == 0.0 {
            return Err(PoscarError::Parse {
                line: scale_line,
                kind: PoscarParseErrorKind::ZeroScale,
            });
        } else {
            Vector3::repeat(scale[0])
        };
        if factors.iter().any(|f| !f.is_finite()) {
            return Err(PoscarError::Inconsistency(
                "target volume given for a degenerate cell".into(),
            ));
        }
        for j in 0..3 {
            cell.column_mut(j).scale_mut(factors[j]);
        }

        let (species_line, species_raw) = lines.next("species or counts")?;
        let (species, counts, counts_line) = match parse_counts(&species_raw) {
            Some(counts) => {
                let species: Vec<String> = comment
                    .split_whitespace()
                    .take(counts.len())
                    .map(normalize_symbol)
                    .collect();
                if species.len() != counts.len()
                    || species.iter().any(|s| atomic_weight(s).is_none())
                {
                    return Err(PoscarError::Parse {
                        line: species_line,
                        kind: PoscarParseErrorKind::MissingSpecies,
                    });
                }
                (species, counts, species_line)
            }
            None => {
                let species: Vec<String> = species_raw
                    .split_whitespace()
                    .map(|s| normalize_symbol(s.split(['/', '_']).next().unwrap_or(s)))
                    .collect();
                let (counts_line, counts_raw) = lines.next("atom counts")?;
                let counts = parse_counts(&counts_raw).ok_or_else(|| PoscarError::Parse {
                    line: counts_line,
                    kind: PoscarParseErrorKind::InvalidCount { value: counts_raw.clone() },
                })?;
                if counts.len() != species.len() {
                    return Err(PoscarError::Inconsistency(format!(
                        "{} species names but {} counts",
                        species.len(),
                        counts.len()
                    )));
                }
                (species, counts, counts_line)
            }
        };
        let total = counts
            .iter()
            .try_fold(0_usize, |acc, &n| acc.checked_add(n))
            .ok_or_else(|| PoscarError::Parse {
                line: counts_line,
                kind: PoscarParseErrorKind::InvalidCount {
                    value: format!("{:?}", counts),
                },
            })?;

        let (_, mut mode) = lines.next("coordinate mode")?;
        if mode.trim_start().starts_with(['s', 'S']) {
            mode = lines.next("coordinate mode")?.1;
        }
        let cartesian = mode.trim_start().starts_with(['c', 'C', 'k', 'K']);

        // Counts are only trusted once the matching coordinate lines have been read.
        let mut positions = Vec::new();
        for _ in 0..total {
            let (line_num, raw) = lines.next("atom coordinates")?;
            let values = parse_floats(&raw, line_num, 3)?;
            let v = Vector3::new(values[0], values[1], values[2]);
            let position = if cartesian {
                v.component_mul(&factors)
            } else {
                cell.transpose() * v
            };
            positions.push(Point3::from(position));
        }

        let mut symbols = Vec::with_capacity(total);
        for (symbol, &count) in species.iter().zip(&counts) {
            symbols.extend(std::iter::repeat_n(symbol.clone(), count));
        }

        Ok(AtomicStructure::new(symbols, positions)?.with_cell(cell, [true; 3]))
    }

    fn write_to(structure: &AtomicStructure, writer: &mut impl Write) -> Result<(), Self::Error> {
        let cell = structure.cell().ok_or(PoscarError::MissingCell)?;

        let mut runs: Vec<(&str, usize)> = Vec::new();
        for symbol in structure.symbols() {
            match runs.last_mut() {
                Some((last, n)) if *last == symbol.as_str() => *n += 1,
                _ => runs.push((symbol.as_str(), 1)),
            }
        }

        writeln!(writer, "{}", structure.chemical_formula())?;
        writeln!(writer, "{:>19.14}", 1.0)?;
        for i in 0..3 {
            writeln!(
                writer,
                " {:>21.16} {:>21.16} {:>21.16}",
                cell[(i, 0)],
                cell[(i, 1)],
                cell[(i, 2)]
            )?;
        }
        let names: Vec<String> = runs.iter().map(|(s, _)| format!("{:>3}", s)).collect();
        let counts: Vec<String> = runs.iter().map(|(_, n)| format!("{:>3}", n)).collect();
        writeln!(writer, " {}", names.join(" "))?;
        writeln!(writer, " {}", counts.join(" "))?;
        writeln!(writer, "Cartesian")?;
        for position in structure.positions() {
            writeln!(
                writer,
                " {:>19.16} {:>19.16} {:>19.16}",
                position.x, position.y, position.z
            )?;
        }
        Ok(())
    }
}
