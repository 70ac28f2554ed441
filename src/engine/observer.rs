//! Per-step reporting and termination hook.
//!
//! The search driver calls its [`Observer`] once after every completed
//! step and once more when the search ends. The observer sees a
//! read-only [`BeamsState`] and may answer with a [`StepVerdict`] naming
//! beams to force-terminate; the driver applies it.

use thiserror::Error;

use crate::core::{Beam, Token};

/// Error raised by an observer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    /// Create an observer error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Read-only view of the beam set handed to the observer.
#[derive(Debug, Clone, Copy)]
pub struct BeamsState<'a> {
    beams: &'a [Beam],
    prefix_start: usize,
    common_prefix_length: usize,
    step: usize,
    is_first_call: bool,
    is_last_call: bool,
}

impl<'a> BeamsState<'a> {
    /// Create a view over `beams` whose tokens
    /// `prefix_start..prefix_start + common_prefix_length` were just
    /// confirmed.
    pub fn new(
        beams: &'a [Beam],
        prefix_start: usize,
        common_prefix_length: usize,
        step: usize,
        is_first_call: bool,
        is_last_call: bool,
    ) -> Self {
        Self {
            beams,
            prefix_start,
            common_prefix_length,
            step,
            is_first_call,
            is_last_call,
        }
    }

    /// Beams ordered best first.
    pub fn beams(&self) -> &'a [Beam] {
        self.beams
    }

    /// Number of beams.
    pub fn num_beams(&self) -> usize {
        self.beams.len()
    }

    /// Highest-scoring beam.
    pub fn best(&self) -> Option<&'a Beam> {
        self.beams.first()
    }

    /// Number of tokens confirmed by this call.
    pub fn common_prefix_length(&self) -> usize {
        self.common_prefix_length
    }

    /// Number of tokens confirmed before this call.
    pub fn confirmed_offset(&self) -> usize {
        self.prefix_start
    }

    /// Tokens confirmed by this call, identical in every beam.
    pub fn common_prefix(&self) -> &'a [Token] {
        match self.beams.first() {
            Some(beam) => {
                &beam.tokens()[self.prefix_start..self.prefix_start + self.common_prefix_length]
            }
            None => &[],
        }
    }

    /// Number of search steps completed.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Whether this is the first observer call of the search.
    pub fn is_first_call(&self) -> bool {
        self.is_first_call
    }

    /// Whether this is the final observer call of the search.
    pub fn is_last_call(&self) -> bool {
        self.is_last_call
    }
}

/// Observer answer: beams the driver should mark terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepVerdict {
    terminate: Vec<usize>,
}

impl StepVerdict {
    /// Leave every beam as it is.
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Also terminate the beam at `index`.
    pub fn terminate(mut self, index: usize) -> Self {
        self.terminate.push(index);
        self
    }

    /// Terminate every one of `num_beams` beams, ending the search.
    pub fn terminate_all(num_beams: usize) -> Self {
        Self {
            terminate: (0..num_beams).collect(),
        }
    }

    /// Indices of the beams to terminate.
    pub fn beams_to_terminate(&self) -> &[usize] {
        &self.terminate
    }

    /// Whether the verdict changes nothing.
    pub fn is_empty(&self) -> bool {
        self.terminate.is_empty()
    }
}

/// Caller-supplied hook invoked once per search step.
///
/// The verdict returned on the last call is ignored.
pub trait Observer {
    /// Report a completed step.
    fn on_step(&mut self, state: &BeamsState<'_>) -> Result<StepVerdict, ObserverError>;
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_step(&mut self, state: &BeamsState<'_>) -> Result<StepVerdict, ObserverError> {
        (**self).on_step(state)
    }
}

/// Observer backed by a closure. See [`observe_fn`].
pub struct FnObserver<F> {
    f: F,
}

/// Wrap a closure as an infallible observer.
///
/// # Example
///
/// ```
/// use nano_beam::engine::{observe_fn, BeamsState, StepVerdict};
///
/// let mut seen = 0;
/// let _observer = observe_fn(|state: &BeamsState<'_>| {
///     seen += state.common_prefix_length();
///     StepVerdict::proceed()
/// });
/// ```
pub fn observe_fn<F>(f: F) -> FnObserver<F>
where
    F: FnMut(&BeamsState<'_>) -> StepVerdict,
{
    FnObserver { f }
}

impl<F> Observer for FnObserver<F>
where
    F: FnMut(&BeamsState<'_>) -> StepVerdict,
{
    fn on_step(&mut self, state: &BeamsState<'_>) -> Result<StepVerdict, ObserverError> {
        Ok((self.f)(state))
    }
}
