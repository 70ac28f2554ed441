//! Oracle adapter for logits-producing models.
//!
//! ```text
//! prompt ++ beam tokens
//!     │
//!     ▼ model forward
//! Logits [vocab_size] (last position)
//!     │
//!     ▼ log-softmax
//! Log-probabilities
//!     │
//!     ▼ top-k (k = fan-out)
//! Candidates, best first
//! ```

use candle_core::{DType, IndexOp, Result, Tensor, D};

use super::{Candidate, ContinuationRequest, ModelOracle, OracleError};
use crate::core::Token;

/// A model that maps a token sequence to next-token logits.
pub trait LogitsModel {
    /// Run a forward pass over `tokens` placed at `position`.
    ///
    /// Returns logits shaped `[vocab]`, `[seq, vocab]` or
    /// `[1, seq, vocab]`; only the last position is used.
    fn forward_logits(&mut self, tokens: &[Token], position: usize) -> Result<Tensor>;

    /// Maximum number of tokens the model accepts.
    fn max_context_len(&self) -> usize;
}

/// Model oracle replaying the full context through a [`LogitsModel`].
///
/// Without a KV cache every request passes the prompt plus all of the
/// beam's tokens from position 0.
pub struct LogitsOracle<M> {
    /// The wrapped model.
    model: M,
    /// Prompt tokens preceding every beam.
    prompt: Vec<Token>,
}

impl<M: LogitsModel> LogitsOracle<M> {
    /// Create an oracle over `model` for the given prompt.
    pub fn new(model: M, prompt: Vec<Token>) -> Self {
        Self { model, prompt }
    }

    /// Get the prompt tokens.
    pub fn prompt(&self) -> &[Token] {
        &self.prompt
    }

    /// Position of the first generated token.
    pub fn start_position(&self) -> usize {
        self.prompt.len()
    }

    /// Get reference to the wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the oracle and return the wrapped model.
    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M: LogitsModel> ModelOracle for LogitsOracle<M> {
    fn next_candidates(
        &mut self,
        request: &ContinuationRequest<'_>,
        fan_out: usize,
    ) -> std::result::Result<Vec<Candidate>, OracleError> {
        let limit = self.model.max_context_len();
        let total = self.prompt.len() + request.tokens.len();
        if total > limit {
            return Err(OracleError::ContextOverflow {
                position: total,
                limit,
            });
        }

        let mut input = Vec::with_capacity(total);
        input.extend_from_slice(&self.prompt);
        input.extend_from_slice(request.tokens);

        let logits = self.model.forward_logits(&input, 0)?;
        let logits = last_position(&logits)?;
        Ok(top_k_log_probs(&logits, fan_out)?)
    }
}

/// Select logits for the last position.
fn last_position(logits: &Tensor) -> Result<Tensor> {
    let dims = logits.dims();
    match dims.len() {
        1 => Ok(logits.clone()),
        2 if dims[0] > 0 => logits.i(dims[0] - 1),
        3 if dims[0] == 1 && dims[1] > 0 => logits.i((0, dims[1] - 1)),
        _ => Err(candle_core::Error::Msg(format!(
            "Expected [vocab], [seq, vocab] or [1, seq, vocab] logits, got {dims:?}"
        ))),
    }
}

/// The `k` most likely tokens of 1D logits with their log-probabilities.
///
/// Candidates are sorted by descending log-probability; equal values keep
/// token ID order.
pub fn top_k_log_probs(logits: &Tensor, k: usize) -> Result<Vec<Candidate>> {
    let logits = logits.to_dtype(DType::F32)?;
    let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
    let log_probs: Vec<f32> = log_probs.to_vec1()?;

    let mut indexed: Vec<(usize, f32)> = log_probs.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(indexed
        .into_iter()
        .take(k)
        .map(|(token, log_prob)| Candidate::new(token as Token, log_prob))
        .collect())
}
