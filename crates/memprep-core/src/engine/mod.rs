//! # Engine Module
//!
//! The structural-correction step of the pipeline: a deterministic, rule-based
//! preparer that decides protonation and tautomer states for a protein model.
//!
//! ## Pipeline
//!
//! [`protonation::prepare`] validates the model, optionally strips hydrogens, marks
//! disulfide bridges, flips Asn/Gln amides toward their hydrogen-bond partners and
//! titrates every ionizable side chain against the configured pH using model pKa
//! values. Histidine tautomers are picked by a [`config::HisStrategy`]. Each
//! residue ends up as one [`report::ResidueRecord`] in the returned report.
//!
//! ## Supporting Modules
//!
//! - [`config`] - `PreparationConfig` and its validating builder
//! - [`error`] - `PreparationError` for models that cannot be prepared
//! - [`progress`] - Callback-based progress reporting shared with the batch workflow
//! - [`titration`] - Model pKa table and residue-name variants
//! - [`templates`] - Heavy-atom templates and hydrogen-bond roles

pub mod config;
pub mod error;
pub mod progress;
pub mod protonation;
pub mod report;
pub mod templates;
pub mod titration;
