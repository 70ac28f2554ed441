//! nano-beam: a streaming beam-search decoding engine.
//!
//! This crate drives beam search over an external model oracle:
//! - Fixed-width beam sets with stable, deterministic pruning
//! - Incremental output: tokens shared by every beam are confirmed early
//! - Observer hook for progress reports and caller-defined stops
//! - Adapter for logits-producing models built on candle

pub mod config;
pub mod error;

pub mod core;
pub mod engine;
pub mod oracle;

pub use config::BeamSearchConfig;
pub use crate::core::{Beam, BeamSet, Token};
pub use engine::{
    observe_fn, run_beam_search, BeamSearch, BeamsState, FinishReason, Observer, ObserverError,
    ResponseCollector, SearchOutput, StepVerdict,
};
pub use error::{Error, Result};
pub use oracle::{Candidate, ContinuationRequest, LogitsModel, LogitsOracle, ModelOracle, OracleError};
