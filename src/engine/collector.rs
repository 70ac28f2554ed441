//! Observer that accumulates the confirmed response.

use tracing::debug;

use super::observer::{BeamsState, Observer, ObserverError, StepVerdict};
use crate::core::Token;

/// Collects confirmed tokens and ends beams on caller-defined stops.
///
/// A beam is terminated when its last token is the end-of-sequence token
/// or when its tokens end with one of the stop sequences.
///
/// # Example
///
/// ```
/// use nano_beam::engine::ResponseCollector;
///
/// let collector = ResponseCollector::new()
///     .with_eos(2)
///     .with_stop_sequence(vec![13, 13]);
/// assert!(collector.response().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseCollector {
    /// Confirmed tokens in report order.
    response: Vec<Token>,
    /// End-of-sequence token.
    eos_token_id: Option<Token>,
    /// Token sequences that end a beam.
    stop_sequences: Vec<Vec<Token>>,
    /// Set once the final report was received.
    finished: bool,
}

impl ResponseCollector {
    /// Create a collector without stop conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminate beams whose last token is `eos`.
    pub fn with_eos(mut self, eos: Token) -> Self {
        self.eos_token_id = Some(eos);
        self
    }

    /// Terminate beams ending with `stop`. Empty sequences are ignored.
    pub fn with_stop_sequence(mut self, stop: Vec<Token>) -> Self {
        if !stop.is_empty() {
            self.stop_sequences.push(stop);
        }
        self
    }

    /// Get the tokens confirmed so far.
    pub fn response(&self) -> &[Token] {
        &self.response
    }

    /// Consume the collector and return the confirmed tokens.
    pub fn into_response(self) -> Vec<Token> {
        self.response
    }

    /// Whether the final report was received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn is_stopped(&self, tokens: &[Token]) -> bool {
        let at_eos = self.eos_token_id.is_some() && tokens.last().copied() == self.eos_token_id;
        at_eos || self.stop_sequences.iter().any(|stop| tokens.ends_with(stop))
    }
}

impl Observer for ResponseCollector {
    fn on_step(&mut self, state: &BeamsState<'_>) -> Result<StepVerdict, ObserverError> {
        let confirmed = state.common_prefix();
        self.response.extend_from_slice(confirmed);
        if !confirmed.is_empty() {
            debug!(
                step = state.step(),
                confirmed = confirmed.len(),
                total = self.response.len(),
                "response extended"
            );
        }

        if state.is_last_call() {
            self.finished = true;
            return Ok(StepVerdict::proceed());
        }

        let verdict = state
            .beams()
            .iter()
            .enumerate()
            .filter(|(_, beam)| !beam.is_terminal() && self.is_stopped(beam.tokens()))
            .fold(StepVerdict::proceed(), |verdict, (index, _)| {
                verdict.terminate(index)
            });
        Ok(verdict)
    }
}
