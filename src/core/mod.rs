//! Core data structures for nano-beam.
//!
//! This module contains:
//! - Beam for a single scored hypothesis
//! - BeamSet for the fixed-width set of active hypotheses

pub mod beam;
pub mod beam_set;

pub use beam::Beam;
pub use beam_set::BeamSet;

/// Token identifier produced and consumed by the model oracle.
pub type Token = u32;
