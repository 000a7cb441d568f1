//! # Core Module
//!
//! Stateless building blocks shared by the preparation engine and the batch
//! workflow.
//!
//! - **Molecular Representation** ([`models`]) - Atoms, residues, chains and the ordered `MolecularSystem`
//! - **File I/O** ([`io`]) - PDB reading and writing, mmCIF writing, tabular report export
//! - **Atom Selection** ([`selection`]) - A boolean selection language for extracting components
//! - **Structure Retrieval** ([`fetch`]) - OPM downloads and local structure directories

pub mod fetch;
pub mod io;
pub mod models;
pub mod selection;
