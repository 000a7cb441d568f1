//! # Workflows Module
//!
//! The batch layer: runs every case of a [`worklist::Worklist`] through the
//! fetch, filter, checkpoint, prepare, write and export stages.
//!
//! ## Overview
//!
//! [`batch::BatchRunner`] is the entry point. It owns a [`collaborators::Pipeline`],
//! the set of stage implementations it calls through traits, so tests and callers
//! can swap any stage (a local directory instead of OPM, a different exporter).
//! Each case either ends with three artifacts laid out by
//! [`artifacts::ArtifactLayout`] or with a [`batch::CaseFailure`] naming the stage
//! that failed.
//!
//! ## Failure Handling
//!
//! - [`batch::FailurePolicy::Abort`] stops at the first failed case; later cases are
//!   reported as not attempted.
//! - [`batch::FailurePolicy::Continue`] records the failure and keeps going.
//! - A [`cancel::CancellationToken`] stops the batch before the next case starts.
//!
//! With more than one job, cases run on a rayon pool while fetches stay bounded by
//! `max_concurrent_fetches`. Results are always returned in worklist order.

pub mod artifacts;
pub mod batch;
pub mod cancel;
pub mod collaborators;
pub mod worklist;
