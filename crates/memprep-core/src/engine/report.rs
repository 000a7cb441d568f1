use crate::core::io::report::{Cell, Tabular};

/// Diagnostic record for one residue of a prepared model.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueRecord {
    pub chain: char,
    pub residue_number: isize,
    pub insertion_code: Option<char>,
    /// Residue name before preparation.
    pub original_name: String,
    /// Residue name after protonation, tautomer and disulfide assignment.
    pub protonation: String,
    /// Model pKa of the titratable group, if any.
    pub pka: Option<f64>,
    pub flipped: bool,
    pub disulfide: bool,
    /// `None` when no orientation data or no Cα coordinate is available.
    pub membrane_exposed: Option<bool>,
    pub ca_z: Option<f64>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparationSummary {
    pub residues: usize,
    pub protonation_changes: usize,
    pub amide_flips: usize,
    pub disulfide_residues: usize,
    pub hydrogens_removed: usize,
}

/// Immutable outcome of a preparation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparationReport {
    records: Vec<ResidueRecord>,
    summary: PreparationSummary,
}

impl PreparationReport {
    pub(crate) fn new(records: Vec<ResidueRecord>, summary: PreparationSummary) -> Self {
        Self { records, summary }
    }

    pub fn records(&self) -> &[ResidueRecord] {
        &self.records
    }

    pub fn summary(&self) -> &PreparationSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

const COLUMNS: &[&str] = &[
    "chain",
    "resid",
    "insertion",
    "resname",
    "protonation",
    "pKa",
    "flipped",
    "disulfide",
    "membrane_exposed",
    "z",
    "notes",
];

impl Tabular for PreparationReport {
    fn headers(&self) -> Vec<&'static str> {
        COLUMNS.to_vec()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.records
            .iter()
            .map(|r| {
                vec![
                    Cell::from(r.chain.to_string()),
                    Cell::Integer(r.residue_number as i64),
                    Cell::from(r.insertion_code.map(|c| c.to_string())),
                    Cell::from(r.original_name.clone()),
                    Cell::from(r.protonation.clone()),
                    Cell::from(r.pka),
                    Cell::Bool(r.flipped),
                    Cell::Bool(r.disulfide),
                    Cell::from(r.membrane_exposed),
                    Cell::from(r.ca_z),
                    Cell::from(r.notes.join("; ")),
                ]
            })
            .collect()
    }
}
