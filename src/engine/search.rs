//! Beam search driver.
//!
//! `BeamSearch` owns the beam set for the duration of one search and
//! runs the step loop against a model oracle, reporting every step to an
//! observer.
//!
//! ## Search Flow
//!
//! ```text
//!   Init ──step()──► Stepping ──(all terminal | budget | oracle failure)──► Done
//!                      │  ▲
//!                      ▼  │
//!   ┌─────────────────────────────────────────────┐
//!   │ oracle.next_candidates_many(live beams)     │
//!   │ expand → mark_eob → prune_to_width          │
//!   │ extract_common_prefix                       │
//!   │ observer.on_step(view) → mark_terminal      │
//!   └─────────────────────────────────────────────┘
//!
//!   Done: collapse onto the best beam, confirm its remaining tokens,
//!         observer.on_step(view, last call)
//! ```
//!
//! Each step runs on a copy of the beam set that is only committed once
//! the observer has accepted it, so an observer error leaves the search
//! exactly as it was before the step.

use tracing::{debug, info, instrument, trace, warn};

use super::observer::{BeamsState, Observer};
use crate::config::BeamSearchConfig;
use crate::core::{BeamSet, Token};
use crate::error::Result;
use crate::oracle::{Candidate, ContinuationRequest, ModelOracle};

/// Phase of a beam search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchPhase {
    /// Constructed, no step taken yet.
    Init,
    /// Steps are being taken.
    Stepping,
    /// Final report delivered; no further steps.
    Done,
}

impl SearchPhase {
    /// Get the phase name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Stepping => "Stepping",
            Self::Done => "Done",
        }
    }
}

/// Reason a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinishReason {
    /// Every beam became terminal.
    AllBeamsTerminal,
    /// The step budget was used up.
    MaxTokens,
    /// The best beam became terminal with early stopping enabled.
    BestBeamTerminal,
    /// The oracle failed for every live beam in the same step.
    OracleFailure,
    /// The caller ended the search with [`BeamSearch::finish`].
    Stopped,
}

/// Result of a single [`BeamSearch::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The search continues.
    Continue,
    /// The search is done and the final report was delivered.
    Finished(FinishReason),
}

/// Output of a completed search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutput {
    /// Every confirmed token, in report order.
    pub tokens: Vec<Token>,
    /// Number of completed steps.
    pub steps: usize,
    /// Reason the search ended.
    pub finish_reason: FinishReason,
    /// Cumulative log-probability of the best beam.
    pub log_prob: f32,
}

/// Beam search driver.
///
/// # Example
///
/// ```
/// use nano_beam::config::BeamSearchConfig;
/// use nano_beam::engine::{BeamSearch, ResponseCollector};
/// use nano_beam::oracle::{Candidate, ContinuationRequest, ModelOracle, OracleError};
///
/// struct Countdown;
///
/// impl ModelOracle for Countdown {
///     fn next_candidates(
///         &mut self,
///         request: &ContinuationRequest<'_>,
///         _fan_out: usize,
///     ) -> Result<Vec<Candidate>, OracleError> {
///         let token = if request.tokens.len() < 3 { 7 } else { 0 };
///         Ok(vec![Candidate::from_probability(token, 1.0)])
///     }
/// }
///
/// let config = BeamSearchConfig::new(2, 16).eos_token_id(0);
/// let mut search = BeamSearch::new(Countdown, ResponseCollector::new(), config, 0).unwrap();
/// let output = search.run().unwrap();
///
/// assert_eq!(output.tokens, vec![7, 7, 7, 0]);
/// assert_eq!(search.observer().response(), &[7, 7, 7, 0]);
/// ```
pub struct BeamSearch<O, B> {
    /// Next-token supplier.
    oracle: O,
    /// Per-step reporting hook.
    observer: B,
    /// Search configuration.
    config: BeamSearchConfig,
    /// Position of the first generated token.
    start_position: usize,
    /// Active beams.
    beams: BeamSet,
    /// Current phase.
    phase: SearchPhase,
    /// Number of completed steps.
    steps: usize,
    /// Reason for finishing, set once termination is detected.
    finish_reason: Option<FinishReason>,
}

impl<O: ModelOracle, B: Observer> BeamSearch<O, B> {
    /// Create a search over an oracle that already consumed the prompt.
    ///
    /// # Arguments
    ///
    /// * `oracle` - Next-token supplier
    /// * `observer` - Per-step reporting hook
    /// * `config` - Search configuration
    /// * `start_position` - Position of the first generated token (prompt length)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for an invalid configuration.
    pub fn new(
        oracle: O,
        observer: B,
        config: BeamSearchConfig,
        start_position: usize,
    ) -> Result<Self> {
        config.validate()?;
        let beams = BeamSet::new(config.beam_width);

        Ok(Self {
            oracle,
            observer,
            config,
            start_position,
            beams,
            phase: SearchPhase::Init,
            steps: 0,
            finish_reason: None,
        })
    }

    /// Start from a seed beam holding `tokens` instead of an empty one.
    ///
    /// Only effective before the first step.
    pub fn with_seed_tokens(mut self, tokens: Vec<Token>) -> Self {
        if self.phase == SearchPhase::Init {
            self.beams = BeamSet::with_seed(self.config.beam_width, tokens);
        }
        self
    }

    // ========== Getters ==========

    /// Get the current phase.
    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Get the number of completed steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Get the active beam set.
    pub fn beams(&self) -> &BeamSet {
        &self.beams
    }

    /// Get the tokens confirmed so far.
    pub fn confirmed_tokens(&self) -> &[Token] {
        self.beams.confirmed_tokens()
    }

    /// Get the search configuration.
    pub fn config(&self) -> &BeamSearchConfig {
        &self.config
    }

    /// Get the finish reason (if done).
    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self.phase {
            SearchPhase::Done => self.finish_reason,
            _ => None,
        }
    }

    /// Get reference to the oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Get reference to the observer.
    pub fn observer(&self) -> &B {
        &self.observer
    }

    /// Consume the search and return the oracle and observer.
    pub fn into_parts(self) -> (O, B) {
        (self.oracle, self.observer)
    }

    // ========== Search loop ==========

    /// Run a single step of the search.
    ///
    /// When the step ends the search, the final report is delivered before
    /// returning [`StepOutcome::Finished`]. Calling `step` on a finished
    /// search does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Observer`](crate::Error::Observer) if the observer
    /// fails; the step is discarded and may be retried.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if let Some(reason) = self.finish_reason {
            return match self.phase {
                SearchPhase::Done => Ok(StepOutcome::Finished(reason)),
                _ => self.finish_with(reason),
            };
        }
        self.phase = SearchPhase::Stepping;

        let fan_out = self.config.effective_fan_out();
        let mut next = self.beams.clone();

        let live: Vec<usize> = (0..next.len())
            .filter(|&index| !next.beams()[index].is_terminal())
            .collect();
        if live.is_empty() {
            return self.finish_with(FinishReason::AllBeamsTerminal);
        }

        let (continuations, failed) = self.request_continuations(&next, &live, fan_out);
        next.mark_terminal(&failed);
        if failed.len() == live.len() {
            warn!(
                step = self.steps + 1,
                failed = failed.len(),
                "oracle failed for every live beam"
            );
            self.beams = next;
            return self.finish_with(FinishReason::OracleFailure);
        }

        next.expand(continuations);
        if let Some(eos) = self.config.eos_token_id {
            next.mark_eob(eos);
        }
        next.prune_to_width();

        let prefix_start = next.confirmed_len();
        let confirmed = next.extract_common_prefix();
        let step = self.steps + 1;

        debug!(
            step,
            beams = next.len(),
            live = next.num_live(),
            confirmed,
            "beam search step"
        );
        for (index, beam) in next.beams().iter().enumerate() {
            trace!(
                step,
                beam = index,
                log_prob = beam.log_prob(),
                terminal = beam.is_terminal(),
                tokens = ?beam.tokens(),
                "beam"
            );
        }

        let state = BeamsState::new(next.beams(), prefix_start, confirmed, step, step == 1, false);
        let verdict = self.observer.on_step(&state)?;
        let forced = next.mark_terminal(verdict.beams_to_terminate());
        if forced > 0 {
            debug!(step, forced, "observer terminated beams");
        }

        self.beams = next;
        self.steps = step;

        match self.termination() {
            Some(reason) => self.finish_with(reason),
            None => Ok(StepOutcome::Continue),
        }
    }

    /// Run the search to completion.
    #[instrument(
        skip_all,
        fields(
            beam_width = self.config.beam_width,
            max_new_tokens = self.config.max_new_tokens,
        )
    )]
    pub fn run(&mut self) -> Result<SearchOutput> {
        loop {
            if let StepOutcome::Finished(finish_reason) = self.step()? {
                return Ok(SearchOutput {
                    tokens: self.beams.confirmed_tokens().to_vec(),
                    steps: self.steps,
                    finish_reason,
                    log_prob: self
                        .beams
                        .best()
                        .map_or(f32::NEG_INFINITY, |beam| beam.log_prob()),
                });
            }
        }
    }

    /// Ask the oracle to continue every live beam.
    ///
    /// Returns the candidates per beam index and the beams the oracle
    /// could not continue.
    fn request_continuations(
        &mut self,
        beams: &BeamSet,
        live: &[usize],
        fan_out: usize,
    ) -> (Vec<Vec<Candidate>>, Vec<usize>) {
        let requests: Vec<ContinuationRequest<'_>> = live
            .iter()
            .map(|&index| ContinuationRequest {
                beam_index: index,
                tokens: beams.beams()[index].tokens(),
                confirmed: beams.confirmed_len(),
                start_position: self.start_position,
            })
            .collect();

        let mut responses = self
            .oracle
            .next_candidates_many(&requests, fan_out)
            .into_iter();

        let mut continuations = vec![Vec::new(); beams.len()];
        let mut failed = Vec::new();
        for &index in live {
            match responses.next() {
                Some(Ok(mut candidates)) if !candidates.is_empty() => {
                    candidates.truncate(fan_out);
                    continuations[index] = candidates;
                }
                Some(Ok(_)) => {
                    warn!(beam = index, "oracle returned no candidates, terminating beam");
                    failed.push(index);
                }
                Some(Err(err)) => {
                    warn!(beam = index, error = %err, "oracle failed, terminating beam");
                    failed.push(index);
                }
                None => {
                    warn!(beam = index, "oracle returned no result, terminating beam");
                    failed.push(index);
                }
            }
        }

        (continuations, failed)
    }

    /// Check whether the committed beam set ends the search.
    fn termination(&self) -> Option<FinishReason> {
        if self.beams.all_terminal() {
            Some(FinishReason::AllBeamsTerminal)
        } else if self.steps >= self.config.max_new_tokens {
            Some(FinishReason::MaxTokens)
        } else if self.config.early_stopping
            && self.beams.best().is_some_and(|beam| beam.is_terminal())
        {
            Some(FinishReason::BestBeamTerminal)
        } else {
            None
        }
    }

    /// End the search now, confirming the best beam's remaining tokens.
    ///
    /// Does nothing if the search already finished.
    ///
    /// # Errors
    ///
    /// Propagates an observer error from the final report; calling
    /// `finish` or `step` again retries it.
    pub fn finish(&mut self) -> Result<StepOutcome> {
        let reason = self.finish_reason.unwrap_or(FinishReason::Stopped);
        match self.phase {
            SearchPhase::Done => Ok(StepOutcome::Finished(reason)),
            _ => self.finish_with(reason),
        }
    }

    /// Collapse onto the best beam and deliver the final report.
    fn finish_with(&mut self, reason: FinishReason) -> Result<StepOutcome> {
        self.finish_reason = Some(reason);

        let mut last = self.beams.clone();
        last.collapse_to_best();
        let prefix_start = last.confirmed_len();
        let confirmed = last.extract_common_prefix();

        let state = BeamsState::new(
            last.beams(),
            prefix_start,
            confirmed,
            self.steps,
            self.steps == 0,
            true,
        );
        self.observer.on_step(&state)?;

        self.beams = last;
        self.phase = SearchPhase::Done;

        info!(
            steps = self.steps,
            reason = ?reason,
            tokens = self.beams.confirmed_len(),
            "beam search finished"
        );
        Ok(StepOutcome::Finished(reason))
    }
}

/// Run a beam search and return the confirmed tokens.
///
/// End-of-sequence handling is left to the observer (see
/// [`ResponseCollector::with_eos`](super::ResponseCollector::with_eos)).
/// The returned tokens are exactly those reported to the observer as
/// confirmed, in order.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) if `width` or
/// `max_new_tokens` is zero, and propagates observer errors.
pub fn run_beam_search<O, B>(
    oracle: &mut O,
    observer: &mut B,
    width: usize,
    start_position: usize,
    max_new_tokens: usize,
) -> Result<Vec<Token>>
where
    O: ModelOracle + ?Sized,
    B: Observer + ?Sized,
{
    let config = BeamSearchConfig::new(width, max_new_tokens);
    let mut search = BeamSearch::new(oracle, observer, config, start_position)?;
    Ok(search.run()?.tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::observer::observe_fn;
    use crate::engine::StepVerdict;
    use crate::oracle::OracleError;

    /// Always offers the same candidates.
    struct FixedOracle(Vec<Candidate>);

    impl ModelOracle for FixedOracle {
        fn next_candidates(
            &mut self,
            _request: &ContinuationRequest<'_>,
            fan_out: usize,
        ) -> std::result::Result<Vec<Candidate>, OracleError> {
            Ok(self.0.iter().copied().take(fan_out).collect())
        }
    }

    fn ab_oracle() -> FixedOracle {
        FixedOracle(vec![Candidate::new(1, -1.0), Candidate::new(2, -2.0)])
    }

    #[test]
    fn test_phases() {
        let config = BeamSearchConfig::new(2, 2);
        let mut search =
            BeamSearch::new(ab_oracle(), observe_fn(|_| StepVerdict::proceed()), config, 0)
                .unwrap();
        assert_eq!(search.phase(), SearchPhase::Init);

        assert_eq!(search.step().unwrap(), StepOutcome::Continue);
        assert_eq!(search.phase(), SearchPhase::Stepping);
        assert_eq!(search.finish_reason(), None);

        assert_eq!(
            search.step().unwrap(),
            StepOutcome::Finished(FinishReason::MaxTokens)
        );
        assert_eq!(search.phase(), SearchPhase::Done);
        assert_eq!(search.finish_reason(), Some(FinishReason::MaxTokens));

        // Finished searches stay finished.
        assert_eq!(
            search.step().unwrap(),
            StepOutcome::Finished(FinishReason::MaxTokens)
        );
        assert_eq!(search.steps(), 2);
    }

    #[test]
    fn test_run_flushes_best_beam() {
        let config = BeamSearchConfig::new(2, 3);
        let mut search =
            BeamSearch::new(ab_oracle(), observe_fn(|_| StepVerdict::proceed()), config, 0)
                .unwrap();
        let output = search.run().unwrap();

        assert_eq!(output.tokens, vec![1, 1, 1]);
        assert_eq!(output.steps, 3);
        assert_eq!(output.log_prob, -3.0);
        assert_eq!(output.finish_reason, FinishReason::MaxTokens);
    }

    #[test]
    fn test_invalid_config_fails_before_stepping() {
        let config = BeamSearchConfig::new(0, 3);
        let result = BeamSearch::new(ab_oracle(), observe_fn(|_| StepVerdict::proceed()), config, 0);
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_finish_early_confirms_best_beam() {
        let config = BeamSearchConfig::new(2, 10);
        let mut search =
            BeamSearch::new(ab_oracle(), observe_fn(|_| StepVerdict::proceed()), config, 0)
                .unwrap();
        search.step().unwrap();
        search.step().unwrap();

        assert_eq!(search.confirmed_tokens(), &[1]);
        assert_eq!(
            search.finish().unwrap(),
            StepOutcome::Finished(FinishReason::Stopped)
        );
        assert_eq!(search.phase(), SearchPhase::Done);
        assert_eq!(search.confirmed_tokens(), &[1, 1]);

        // A finished search keeps its first reason.
        assert_eq!(
            search.step().unwrap(),
            StepOutcome::Finished(FinishReason::Stopped)
        );
        assert_eq!(search.steps(), 2);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(SearchPhase::Init.as_str(), "Init");
        assert_eq!(SearchPhase::Done.as_str(), "Done");
    }
}
