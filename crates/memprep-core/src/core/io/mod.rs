//! Provides input/output functionality for structure files and reports.
//!
//! Structures are read from PDB and written as PDB or mmCIF, with the output format
//! inferred from the target extension. Per-residue reports are exported through
//! the [`report::Tabular`] abstraction to `.xlsx` or `.csv`.

pub mod format;
pub mod mmcif;
pub mod pdb;
pub mod report;
pub mod traits;
