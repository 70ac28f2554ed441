//! Shared oracles and observers for integration tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use nano_beam::engine::{BeamsState, Observer, ObserverError, StepVerdict};
use nano_beam::oracle::{Candidate, ContinuationRequest, ModelOracle, OracleError};
use nano_beam::Token;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Oracle answering from a closure over the beam's tokens.
///
/// Records every request it serves.
pub struct FnOracle<F> {
    f: F,
    /// Token contexts of every request, in call order.
    pub calls: Vec<Vec<Token>>,
    /// `(position, next_position)` of every request.
    pub positions: Vec<(usize, usize)>,
    /// Fan-out of every request.
    pub fan_outs: Vec<usize>,
}

pub fn oracle_fn<F>(f: F) -> FnOracle<F>
where
    F: FnMut(&[Token]) -> Result<Vec<Candidate>, OracleError>,
{
    FnOracle {
        f,
        calls: Vec::new(),
        positions: Vec::new(),
        fan_outs: Vec::new(),
    }
}

impl<F> ModelOracle for FnOracle<F>
where
    F: FnMut(&[Token]) -> Result<Vec<Candidate>, OracleError>,
{
    fn next_candidates(
        &mut self,
        request: &ContinuationRequest<'_>,
        fan_out: usize,
    ) -> Result<Vec<Candidate>, OracleError> {
        self.calls.push(request.tokens.to_vec());
        self.positions
            .push((request.position(), request.next_position()));
        self.fan_outs.push(fan_out);
        let mut candidates = (self.f)(request.tokens)?;
        candidates.truncate(fan_out);
        Ok(candidates)
    }
}

/// Deterministic pseudo-random oracle: the distribution depends only on
/// the seed and the beam's tokens.
pub struct SeededOracle {
    seed: u64,
    vocab_size: u32,
}

impl SeededOracle {
    pub fn new(seed: u64, vocab_size: u32) -> Self {
        Self { seed, vocab_size }
    }
}

impl ModelOracle for SeededOracle {
    fn next_candidates(
        &mut self,
        request: &ContinuationRequest<'_>,
        fan_out: usize,
    ) -> Result<Vec<Candidate>, OracleError> {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        request.tokens.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let weights: Vec<f32> = (0..self.vocab_size)
            .map(|_| rng.gen_range(0.01f32..1.0))
            .collect();
        let total: f32 = weights.iter().sum();

        let mut candidates: Vec<Candidate> = weights
            .iter()
            .enumerate()
            .map(|(token, weight)| Candidate::from_probability(token as Token, weight / total))
            .collect();
        candidates.sort_by(|a, b| b.log_prob.total_cmp(&a.log_prob));
        candidates.truncate(fan_out);
        Ok(candidates)
    }
}

/// Owned copy of one observer call.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub step: usize,
    pub beams: Vec<(Vec<Token>, f32, bool)>,
    pub prefix_start: usize,
    pub prefix: Vec<Token>,
    pub is_first_call: bool,
    pub is_last_call: bool,
}

impl Snapshot {
    pub fn tokens(&self) -> Vec<Vec<Token>> {
        self.beams.iter().map(|(tokens, _, _)| tokens.clone()).collect()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.beams.iter().map(|(_, score, _)| *score).collect()
    }

    pub fn terminal(&self) -> Vec<bool> {
        self.beams.iter().map(|(_, _, terminal)| *terminal).collect()
    }
}

/// Observer recording every call and answering with a fixed policy.
#[derive(Default)]
pub struct RecordingObserver {
    pub snapshots: Vec<Snapshot>,
    /// Terminate every beam once this step is reached.
    pub cancel_at_step: Option<usize>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_at(step: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cancel_at_step: Some(step),
        }
    }

    /// Confirmed tokens, concatenated in report order.
    pub fn confirmed(&self) -> Vec<Token> {
        self.snapshots
            .iter()
            .flat_map(|snapshot| snapshot.prefix.iter().copied())
            .collect()
    }

    pub fn last(&self) -> &Snapshot {
        self.snapshots.last().expect("no observer call recorded")
    }
}

impl Observer for RecordingObserver {
    fn on_step(&mut self, state: &BeamsState<'_>) -> Result<StepVerdict, ObserverError> {
        self.snapshots.push(Snapshot {
            step: state.step(),
            beams: state
                .beams()
                .iter()
                .map(|beam| (beam.tokens().to_vec(), beam.log_prob(), beam.is_terminal()))
                .collect(),
            prefix_start: state.confirmed_offset(),
            prefix: state.common_prefix().to_vec(),
            is_first_call: state.is_first_call(),
            is_last_call: state.is_last_call(),
        });

        match self.cancel_at_step {
            Some(step) if state.step() >= step => Ok(StepVerdict::terminate_all(state.num_beams())),
            _ => Ok(StepVerdict::proceed()),
        }
    }
}

/// Observer failing once at the given step.
pub struct FlakyObserver {
    pub fail_at_step: usize,
    pub failures: usize,
    pub reports: Vec<usize>,
}

impl FlakyObserver {
    pub fn new(fail_at_step: usize) -> Self {
        Self {
            fail_at_step,
            failures: 0,
            reports: Vec::new(),
        }
    }
}

impl Observer for FlakyObserver {
    fn on_step(&mut self, state: &BeamsState<'_>) -> Result<StepVerdict, ObserverError> {
        if state.step() == self.fail_at_step && self.failures == 0 && !state.is_last_call() {
            self.failures += 1;
            return Err(ObserverError::new("sink unavailable"));
        }
        self.reports.push(state.step());
        Ok(StepVerdict::proceed())
    }
}

/// Candidates from `(token, log_prob)` pairs.
pub fn candidates(pairs: &[(Token, f32)]) -> Vec<Candidate> {
    pairs
        .iter()
        .map(|&(token, log_prob)| Candidate::new(token, log_prob))
        .collect()
}
