//! Beam search engine.
//!
//! This module contains:
//! - BeamSearch for driving the step loop
//! - Observer protocol for per-step reports
//! - ResponseCollector for accumulating the confirmed response

pub mod collector;
pub mod observer;
pub mod search;

pub use collector::ResponseCollector;
pub use observer::{observe_fn, BeamsState, FnObserver, Observer, ObserverError, StepVerdict};
pub use search::{
    run_beam_search, BeamSearch, FinishReason, SearchOutput, SearchPhase, StepOutcome,
};
