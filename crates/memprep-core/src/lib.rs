//! # memprep Core Library
//!
//! Batch preparation of membrane-protein structures: download oriented models from
//! the OPM database, keep the protein atoms, and assign protonation states with a
//! deterministic rule-based engine, writing a corrected structure and a per-residue
//! report for every case.
//!
//! ## Architecture
//!
//! The library follows a three-layer layout.
//!
//! - **[`core`]: The Foundation.** Data models (`MolecularSystem`), PDB/mmCIF and
//!   spreadsheet I/O, the atom selection language, and structure retrieval from OPM
//!   or a local directory.
//!
//! - **[`engine`]: The Logic Core.** The protonation preparer: titration against pH,
//!   histidine tautomers, amide flips, disulfide detection, and the resulting
//!   `PreparationReport`.
//!
//! - **[`workflows`]: The Public API.** Worklists, artifact naming and the
//!   `BatchRunner` that drives each case through the pipeline with a configurable
//!   failure policy.

pub mod core;
pub mod engine;
pub mod workflows;
