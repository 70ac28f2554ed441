//! Configuration types for nano-beam.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Token;
use crate::error::{Error, Result};

/// Beam search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamSearchConfig {
    /// Number of beams kept after each pruning step.
    pub beam_width: usize,
    /// Maximum number of search steps (one new token per live beam each).
    pub max_new_tokens: usize,
    /// Candidates requested per beam each step (`None` = beam width).
    pub fan_out: Option<usize>,
    /// End-of-sequence token. `None` leaves termination to the observer.
    pub eos_token_id: Option<Token>,
    /// Stop as soon as the highest-scoring beam is terminal.
    ///
    /// Scores only decrease as beams grow, so no other beam can overtake
    /// a finished best beam.
    pub early_stopping: bool,
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            beam_width: 2,
            max_new_tokens: 256,
            fan_out: None,
            eos_token_id: None,
            early_stopping: false,
        }
    }
}

impl BeamSearchConfig {
    /// Create a configuration with the given width and token budget.
    pub fn new(beam_width: usize, max_new_tokens: usize) -> Self {
        Self {
            beam_width,
            max_new_tokens,
            ..Default::default()
        }
    }

    /// Set the number of candidates requested per beam.
    pub fn fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = Some(fan_out);
        self
    }

    /// Set the end-of-sequence token.
    pub fn eos_token_id(mut self, eos_token_id: Token) -> Self {
        self.eos_token_id = Some(eos_token_id);
        self
    }

    /// Enable or disable early stopping on a terminal best beam.
    pub fn early_stopping(mut self, early_stopping: bool) -> Self {
        self.early_stopping = early_stopping;
        self
    }

    /// Candidates requested per beam, defaulting to the beam width.
    pub fn effective_fan_out(&self) -> usize {
        self.fan_out.unwrap_or(self.beam_width)
    }

    /// Check the configuration before a search starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the width, token budget or fan-out is zero.
    pub fn validate(&self) -> Result<()> {
        if self.beam_width < 1 {
            return Err(Error::Config("beam_width must be at least 1".to_string()));
        }
        if self.max_new_tokens < 1 {
            return Err(Error::Config(
                "max_new_tokens must be at least 1".to_string(),
            ));
        }
        if self.fan_out == Some(0) {
            return Err(Error::Config("fan_out must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
