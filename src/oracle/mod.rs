//! Model oracle contract.
//!
//! The search engine never runs a model itself. Each step it hands the
//! oracle one [`ContinuationRequest`] per live beam and gets back the
//! highest-scoring next tokens with their incremental log-probabilities.
//!
//! - [`ModelOracle`] is the contract consumed by the search driver
//! - [`LogitsOracle`] adapts any model producing a logits tensor

pub mod logits;

use thiserror::Error;

use crate::core::Token;

pub use logits::{top_k_log_probs, LogitsModel, LogitsOracle};

/// Error reported by a model oracle for one continuation request.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The beam's context no longer fits in the model.
    #[error("context of {position} tokens exceeds model limit of {limit}")]
    ContextOverflow { position: usize, limit: usize },

    /// The backing model or resource could not serve the request.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// A possible next token and its incremental log-probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Next token ID.
    pub token: Token,
    /// Log-probability of `token` given the beam's context.
    pub log_prob: f32,
}

impl Candidate {
    /// Create a candidate from a log-probability.
    pub fn new(token: Token, log_prob: f32) -> Self {
        Self { token, log_prob }
    }

    /// Create a candidate from a plain probability.
    pub fn from_probability(token: Token, probability: f32) -> Self {
        Self::new(token, probability.ln())
    }
}

/// One beam's request for continuation candidates.
///
/// The prompt was consumed by the oracle before the search started and
/// occupies positions `0..start_position`.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationRequest<'a> {
    /// Index of the beam in the current beam set.
    pub beam_index: usize,
    /// Every token the beam generated since the search started.
    pub tokens: &'a [Token],
    /// Number of leading `tokens` already confirmed across all beams.
    pub confirmed: usize,
    /// Position of the first generated token.
    pub start_position: usize,
}

impl<'a> ContinuationRequest<'a> {
    /// Tokens not yet confirmed, i.e. not shared by every beam.
    pub fn context(&self) -> &'a [Token] {
        &self.tokens[self.confirmed.min(self.tokens.len())..]
    }

    /// Position of the first token of [`context`](Self::context).
    pub fn position(&self) -> usize {
        self.start_position + self.confirmed
    }

    /// Position the requested token will occupy.
    pub fn next_position(&self) -> usize {
        self.start_position + self.tokens.len()
    }
}

/// Supplier of next-token candidates for beam search.
///
/// Implementations return at most `fan_out` candidates, best first. Retry
/// policy and timeouts belong to the implementation.
pub trait ModelOracle {
    /// Candidates for the token following `request.tokens`.
    fn next_candidates(
        &mut self,
        request: &ContinuationRequest<'_>,
        fan_out: usize,
    ) -> Result<Vec<Candidate>, OracleError>;

    /// Candidates for every request of one search step.
    ///
    /// The result at index `i` answers `requests[i]`. The default
    /// implementation serves the requests one by one; batched backends
    /// override it to evaluate all beams in one pass.
    fn next_candidates_many(
        &mut self,
        requests: &[ContinuationRequest<'_>],
        fan_out: usize,
    ) -> Vec<Result<Vec<Candidate>, OracleError>> {
        requests
            .iter()
            .map(|request| self.next_candidates(request, fan_out))
            .collect()
    }
}

impl<O: ModelOracle + ?Sized> ModelOracle for &mut O {
    fn next_candidates(
        &mut self,
        request: &ContinuationRequest<'_>,
        fan_out: usize,
    ) -> Result<Vec<Candidate>, OracleError> {
        (**self).next_candidates(request, fan_out)
    }

    fn next_candidates_many(
        &mut self,
        requests: &[ContinuationRequest<'_>],
        fan_out: usize,
    ) -> Vec<Result<Vec<Candidate>, OracleError>> {
        (**self).next_candidates_many(requests, fan_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_positions() {
        let tokens = [10, 11, 12];
        let request = ContinuationRequest {
            beam_index: 0,
            tokens: &tokens,
            confirmed: 2,
            start_position: 5,
        };

        assert_eq!(request.context(), &[12]);
        assert_eq!(request.position(), 7);
        assert_eq!(request.next_position(), 8);
    }

    #[test]
    fn test_candidate_from_probability() {
        let candidate = Candidate::from_probability(3, 1.0);
        assert_eq!(candidate.token, 3);
        assert_eq!(candidate.log_prob, 0.0);
    }
}
