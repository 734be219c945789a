use super::element;
use nalgebra::{Matrix3, Point3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureError {
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),
    #[error("Per-atom arrays differ in length ({symbols} symbols, {masses} masses, {positions} positions)")]
    LengthMismatch {
        symbols: usize,
        masses: usize,
        positions: usize,
    },
    #[error("Atom {index} has a non-finite mass or position")]
    NonFinite { index: usize },
}

/// An ordered collection of atoms read from a structure file.
///
/// Each atom carries a chemical symbol, a mass in amu and a cartesian position
/// in angstrom. The three per-atom arrays always have the same length; the
/// constructors enforce this and the fields cannot be modified afterwards.
///
/// Periodic structures additionally carry a unit cell whose rows are the
/// lattice vectors, together with a periodicity flag per cell axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StructureRecord", into = "StructureRecord")]
pub struct AtomicStructure {
    symbols: Vec<String>,
    masses: Vec<f64>,
    positions: Vec<Point3<f64>>,
    cell: Option<Matrix3<f64>>,
    pbc: [bool; 3],
}

impl AtomicStructure {
    /// Builds a structure, assigning each atom the standard atomic weight of its element.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::UnknownElement`] for a symbol missing from the
    /// element table, [`StructureError::LengthMismatch`] when the arrays differ in length
    /// and [`StructureError::NonFinite`] for infinite or NaN coordinates.
    pub fn new(
        symbols: Vec<String>,
        positions: Vec<Point3<f64>>,
    ) -> Result<Self, StructureError> {
        let masses = symbols
            .iter()
            .map(|s| element::atomic_weight(s).ok_or_else(|| StructureError::UnknownElement(s.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_masses(symbols, masses, positions)
    }

    /// Builds a structure from explicit per-atom masses.
    pub fn with_masses(
        symbols: Vec<String>,
        masses: Vec<f64>,
        positions: Vec<Point3<f64>>,
    ) -> Result<Self, StructureError> {
        if symbols.len() != masses.len() || symbols.len() != positions.len() {
            return Err(StructureError::LengthMismatch {
                symbols: symbols.len(),
                masses: masses.len(),
                positions: positions.len(),
            });
        }
        if let Some(index) = masses
            .iter()
            .zip(&positions)
            .position(|(m, p)| !m.is_finite() || p.iter().any(|c| !c.is_finite()))
        {
            return Err(StructureError::NonFinite { index });
        }
        Ok(Self {
            symbols,
            masses,
            positions,
            cell: None,
            pbc: [false; 3],
        })
    }

    /// Attaches a unit cell (rows are lattice vectors) and periodicity flags.
    pub fn with_cell(mut self, cell: Matrix3<f64>, pbc: [bool; 3]) -> Self {
        self.cell = Some(cell);
        self.pbc = pbc;
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn cell(&self) -> Option<&Matrix3<f64>> {
        self.cell.as_ref()
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    /// Positions flattened row-major into `len() * 3` values.
    pub fn flat_positions(&self) -> Vec<f64> {
        self.positions
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect()
    }

    /// Chemical formula in Hill order: carbon, then hydrogen, then the rest alphabetically.
    /// Without carbon every element is ordered alphabetically.
    pub fn chemical_formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for symbol in &self.symbols {
            *counts.entry(symbol.as_str()).or_default() += 1;
        }

        let mut ordered: Vec<(&str, usize)> = Vec::with_capacity(counts.len());
        if let Some(c) = counts.remove("C") {
            ordered.push(("C", c));
            if let Some(h) = counts.remove("H") {
                ordered.push(("H", h));
            }
        }
        ordered.extend(counts);

        ordered
            .into_iter()
            .map(|(symbol, n)| {
                if n == 1 {
                    symbol.to_string()
                } else {
                    format!("{}{}", symbol, n)
                }
            })
            .collect()
    }

    /// Compares symbols exactly and positions (and cells) within `tolerance` angstrom.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        let cells_match = match (&self.cell, &other.cell) {
            (Some(a), Some(b)) => (a - b).amax() <= tolerance,
            (None, None) => true,
            _ => false,
        };
        self.symbols == other.symbols
            && cells_match
            && self.pbc == other.pbc
            && self
                .positions
                .iter()
                .zip(&other.positions)
                .all(|(a, b)| (a - b).amax() <= tolerance)
    }
}

#[derive(Serialize, Deserialize)]
struct StructureRecord {
    symbols: Vec<String>,
    masses: Vec<f64>,
    positions: Vec<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cell: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pbc: [bool; 3],
}

impl TryFrom<StructureRecord> for AtomicStructure {
    type Error = StructureError;

    fn try_from(record: StructureRecord) -> Result<Self, Self::Error> {
        let positions = record
            .positions
            .into_iter()
            .map(|[x, y, z]| Point3::new(x, y, z))
            .collect();
        let structure = Self::with_masses(record.symbols, record.masses, positions)?;
        Ok(match record.cell {
            Some(rows) => {
                let cell = Matrix3::from_fn(|i, j| rows[i][j]);
                structure.with_cell(cell, record.pbc)
            }
            None => structure,
        })
    }
}

impl From<AtomicStructure> for StructureRecord {
    fn from(structure: AtomicStructure) -> Self {
        Self {
            positions: structure
                .positions
                .iter()
                .map(|p| [p.x, p.y, p.z])
                .collect(),
            cell: structure
                .cell
                .map(|m| [0, 1, 2].map(|i| [m[(i, 0)], m[(i, 1)], m[(i, 2)]])),
            pbc: structure.pbc,
            symbols: structure.symbols,
            masses: structure.masses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> AtomicStructure {
        AtomicStructure::new(
            vec!["O".into(), "H".into(), "H".into()],
            vec![
                Point3::new(0.0, 0.0, 0.119),
                Point3::new(0.0, 0.763, -0.477),
                Point3::new(0.0, -0.763, -0.477),
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_assigns_standard_masses() {
        let structure = water();
        assert_eq!(structure.len(), 3);
        assert_eq!(structure.masses(), &[15.999, 1.008, 1.008]);
    }

    #[test]
    fn new_rejects_unknown_symbols() {
        let result = AtomicStructure::new(vec!["Qq".into()], vec![Point3::origin()]);
        assert_eq!(result, Err(StructureError::UnknownElement("Qq".into())));
    }

    #[test]
    fn rejects_non_finite_positions_and_masses() {
        let result = AtomicStructure::new(
            vec!["H".into(), "H".into()],
            vec![Point3::origin(), Point3::new(0.0, f64::INFINITY, 0.0)],
        );
        assert_eq!(result, Err(StructureError::NonFinite { index: 1 }));

        let result =
            AtomicStructure::with_masses(vec!["H".into()], vec![f64::NAN], vec![Point3::origin()]);
        assert_eq!(result, Err(StructureError::NonFinite { index: 0 }));
    }

    #[test]
    fn with_masses_rejects_mismatched_lengths() {
        let result = AtomicStructure::with_masses(
            vec!["H".into(), "H".into()],
            vec![1.008],
            vec![Point3::origin(), Point3::origin()],
        );
        assert!(matches!(
            result,
            Err(StructureError::LengthMismatch {
                symbols: 2,
                masses: 1,
                positions: 2
            })
        ));
    }

    #[test]
    fn chemical_formula_uses_hill_order() {
        assert_eq!(water().chemical_formula(), "H2O");

        let ethanol = AtomicStructure::new(
            ["C", "C", "O", "H", "H", "H", "H", "H", "H"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![Point3::origin(); 9],
        )
        .unwrap();
        assert_eq!(ethanol.chemical_formula(), "C2H6O");
    }

    #[test]
    fn flat_positions_are_row_major() {
        let flat = water().flat_positions();
        assert_eq!(flat.len(), 9);
        assert_eq!(&flat[3..6], &[0.0, 0.763, -0.477]);
    }

    #[test]
    fn json_serialization_preserves_cell_and_pbc() {
        let structure = water().with_cell(Matrix3::identity() * 5.0, [true, true, false]);
        let json = serde_json::to_string(&structure).unwrap();
        let restored: AtomicStructure = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, structure);
    }

    #[test]
    fn deserialization_enforces_length_invariant() {
        let json = r#"{"symbols":["H"],"masses":[1.0,2.0],"positions":[[0,0,0]]}"#;
        assert!(serde_json::from_str::<AtomicStructure>(json).is_err());
    }

    #[test]
    fn approx_eq_tolerates_small_position_noise() {
        let a = water();
        let b = AtomicStructure::new(
            a.symbols().to_vec(),
            a.positions()
                .iter()
                .map(|p| p + nalgebra::Vector3::new(1e-9, 0.0, 0.0))
                .collect(),
        )
        .unwrap();
        assert!(a.approx_eq(&b, 1e-6));
        assert!(!a.approx_eq(&b, 1e-12));
    }
}
