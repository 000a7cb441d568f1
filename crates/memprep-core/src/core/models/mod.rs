//! # Core Models Module
//!
//! Data structures representing an atomic model as it flows through the preparation
//! pipeline: atoms with arbitrary per-atom attributes, residues with insertion codes,
//! chains, and the [`system::MolecularSystem`] container tying them together.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom representation with element, coordinates and free-form attributes
//! - [`residue`] - Residue records and amino-acid / solvent classification
//! - [`chain`] - Chain organization
//! - [`system`] - The complete model with deterministic chain → residue → atom ordering
//! - [`ids`] - Stable slot-map identifiers for atoms, residues, and chains
//!
//! ## Usage
//!
//! ```ignore
//! use memprep::core::models::{system::MolecularSystem, atom::{Atom, Element}};
//!
//! let mut system = MolecularSystem::new();
//! let chain_id = system.add_chain('A');
//! let residue_id = system.add_residue(chain_id, 1, None, "ALA", false)?;
//! system.add_atom_to_residue(residue_id, Atom::new("CA", Element::C, residue_id, Point3::origin()))?;
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod system;
