//! A single beam-search hypothesis.
//!
//! A beam tracks the tokens generated since the search started, the
//! cumulative log-probability of that continuation, and whether it has
//! stopped extending.

use super::Token;

/// One candidate output sequence carried through beam search.
///
/// # Example
///
/// ```
/// use nano_beam::core::Beam;
///
/// let beam = Beam::new();
/// let next = beam.extend(7, -0.5);
///
/// assert_eq!(next.tokens(), &[7]);
/// assert_eq!(next.log_prob(), -0.5);
/// assert!(!next.is_terminal());
/// assert!(beam.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    /// Generated token IDs, append-only.
    tokens: Vec<Token>,
    /// Cumulative log-probability of `tokens`.
    log_prob: f32,
    /// Whether the beam has stopped extending.
    is_terminal: bool,
}

impl Beam {
    /// Create an empty beam with probability 1.
    pub fn new() -> Self {
        Self::with_tokens(Vec::new())
    }

    /// Create a live beam seeded with the given tokens.
    pub fn with_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            log_prob: 0.0,
            is_terminal: false,
        }
    }

    // ========== Getters ==========

    /// Get the generated tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Get the cumulative log-probability.
    pub fn log_prob(&self) -> f32 {
        self.log_prob
    }

    /// Get the cumulative probability.
    pub fn probability(&self) -> f32 {
        self.log_prob.exp()
    }

    /// Check whether the beam has stopped extending.
    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    /// Get the number of generated tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check whether no token has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Get the most recently appended token.
    pub fn last_token(&self) -> Option<Token> {
        self.tokens.last().copied()
    }

    // ========== Transitions ==========

    /// Create a child beam with one more token.
    ///
    /// NaN log-probabilities score as impossible continuations.
    #[must_use]
    pub fn extend(&self, token: Token, log_prob: f32) -> Self {
        let log_prob = if log_prob.is_nan() {
            f32::NEG_INFINITY
        } else {
            log_prob
        };
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        tokens.extend_from_slice(&self.tokens);
        tokens.push(token);
        Self {
            tokens,
            log_prob: self.log_prob + log_prob,
            is_terminal: false,
        }
    }

    /// Stop the beam from receiving further continuations.
    pub fn set_terminal(&mut self) {
        self.is_terminal = true;
    }
}

impl Default for Beam {
    fn default() -> Self {
        Self::new()
    }
}
