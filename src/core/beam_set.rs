//! Fixed-width collection of beams.
//!
//! The beam set owns every live hypothesis of one search and provides the
//! primitives the search driver composes into a step:
//!
//! ```text
//! beams (≤ width)
//!     │
//!     ▼ expand        append one candidate token per (parent, candidate)
//! candidate pool
//!     │
//!     ▼ mark_eob      last token == EOS  →  terminal
//!     │
//!     ▼ prune         stable sort by score, keep top `width`
//! beams (≤ width)
//!     │
//!     ▼ extract       shared run after the confirmed split point
//! confirmed += n
//! ```
//!
//! Confirmation only moves the split point; beam tokens are never
//! shifted or truncated.

use tracing::warn;

use super::beam::Beam;
use super::Token;
use crate::oracle::Candidate;

/// The active beams of a search, sorted by descending score.
#[derive(Debug, Clone)]
pub struct BeamSet {
    /// Active beams, best first.
    beams: Vec<Beam>,
    /// Maximum number of beams kept after pruning.
    width: usize,
    /// Number of leading tokens already confirmed as common to all beams.
    confirmed: usize,
}

impl BeamSet {
    /// Create a beam set holding one empty seed beam.
    pub fn new(width: usize) -> Self {
        Self::with_seed(width, Vec::new())
    }

    /// Create a beam set holding one seed beam with the given tokens.
    ///
    /// Seed tokens are unconfirmed; they are reported with the first
    /// common prefix that covers them.
    pub fn with_seed(width: usize, tokens: Vec<Token>) -> Self {
        Self {
            beams: vec![Beam::with_tokens(tokens)],
            width,
            confirmed: 0,
        }
    }

    // ========== Getters ==========

    /// Get the configured width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get the active beams, best first.
    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// Get a beam by index.
    pub fn get(&self, index: usize) -> Option<&Beam> {
        self.beams.get(index)
    }

    /// Get the number of active beams.
    pub fn len(&self) -> usize {
        self.beams.len()
    }

    /// Check whether the set holds no beam.
    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Get the number of confirmed tokens.
    pub fn confirmed_len(&self) -> usize {
        self.confirmed
    }

    /// Get the confirmed tokens.
    pub fn confirmed_tokens(&self) -> &[Token] {
        self.beams
            .first()
            .map(|beam| &beam.tokens()[..self.confirmed])
            .unwrap_or(&[])
    }

    /// Get the number of beams still receiving continuations.
    pub fn num_live(&self) -> usize {
        self.beams.iter().filter(|b| !b.is_terminal()).count()
    }

    /// Check whether every beam is terminal.
    ///
    /// An empty set counts as terminal: nothing is left to extend.
    pub fn all_terminal(&self) -> bool {
        self.beams.iter().all(Beam::is_terminal)
    }

    /// Index of the highest-scoring beam (first one on ties).
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, beam) in self.beams.iter().enumerate() {
            if best.map_or(true, |(_, score)| beam.log_prob() > score) {
                best = Some((index, beam.log_prob()));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Get the highest-scoring beam.
    pub fn best(&self) -> Option<&Beam> {
        self.best_index().map(|index| &self.beams[index])
    }

    // ========== Search primitives ==========

    /// Replace every beam by its continuations.
    ///
    /// `continuations[i]` holds the candidates for beam `i`. Terminal beams
    /// are carried forward unchanged and their entry is ignored. A live
    /// beam with no candidates cannot be extended, so it is carried forward
    /// as terminal. The resulting pool keeps parent order, then candidate
    /// order, which [`prune_to_width`](Self::prune_to_width) relies on for
    /// tie-breaking.
    pub fn expand(&mut self, mut continuations: Vec<Vec<Candidate>>) {
        continuations.resize_with(self.beams.len(), Vec::new);

        let pool_size = self
            .beams
            .iter()
            .zip(&continuations)
            .map(|(beam, candidates)| {
                if beam.is_terminal() {
                    1
                } else {
                    candidates.len().max(1)
                }
            })
            .sum();

        let mut pool = Vec::with_capacity(pool_size);
        let parents = std::mem::take(&mut self.beams);

        for (index, (mut parent, candidates)) in
            parents.into_iter().zip(continuations).enumerate()
        {
            if parent.is_terminal() {
                pool.push(parent);
            } else if candidates.is_empty() {
                warn!(beam = index, "live beam received no continuations, marking terminal");
                parent.set_terminal();
                pool.push(parent);
            } else {
                pool.extend(
                    candidates
                        .iter()
                        .map(|candidate| parent.extend(candidate.token, candidate.log_prob)),
                );
            }
        }

        self.beams = pool;
    }

    /// Mark every beam ending in `eos` as terminal.
    ///
    /// Returns the number of beams that became terminal.
    pub fn mark_eob(&mut self, eos: Token) -> usize {
        let mut marked = 0;
        for beam in &mut self.beams {
            if !beam.is_terminal() && beam.last_token() == Some(eos) {
                beam.set_terminal();
                marked += 1;
            }
        }
        marked
    }

    /// Mark the beams at `indices` as terminal.
    ///
    /// Out-of-range indices are skipped. Returns the number of beams that
    /// became terminal.
    pub fn mark_terminal(&mut self, indices: &[usize]) -> usize {
        let num_beams = self.beams.len();
        let mut marked = 0;
        for &index in indices {
            match self.beams.get_mut(index) {
                Some(beam) if !beam.is_terminal() => {
                    beam.set_terminal();
                    marked += 1;
                }
                Some(_) => {}
                None => warn!(
                    beam = index,
                    num_beams,
                    "ignoring termination of unknown beam"
                ),
            }
        }
        marked
    }

    /// Keep the `width` highest-scoring beams.
    ///
    /// The sort is stable: equal scores keep their pool order.
    pub fn prune_to_width(&mut self) {
        self.beams.sort_by(|a, b| b.log_prob().total_cmp(&a.log_prob()));
        self.beams.truncate(self.width);
    }

    /// Length of the token run after the split point shared by all beams.
    ///
    /// Does not move the split point.
    pub fn common_prefix_length(&self) -> usize {
        let Some((first, rest)) = self.beams.split_first() else {
            return 0;
        };

        let base = unconfirmed(first, self.confirmed);
        let mut length = base.len();
        for beam in rest {
            let other = unconfirmed(beam, self.confirmed);
            length = length.min(other.len());
            if let Some(diverge) = base[..length]
                .iter()
                .zip(other)
                .position(|(a, b)| a != b)
            {
                length = diverge;
            }
            if length == 0 {
                break;
            }
        }
        length
    }

    /// Confirm the run shared by all beams and return its length.
    ///
    /// A second call without an intervening [`expand`](Self::expand)
    /// returns 0.
    pub fn extract_common_prefix(&mut self) -> usize {
        let length = self.common_prefix_length();
        self.confirmed += length;
        length
    }

    /// Drop every beam except the highest-scoring one.
    ///
    /// Afterwards the common prefix covers all of the best beam's
    /// unconfirmed tokens.
    pub fn collapse_to_best(&mut self) {
        if let Some(index) = self.best_index() {
            let best = self.beams.swap_remove(index);
            self.beams.clear();
            self.beams.push(best);
        }
    }
}

fn unconfirmed(beam: &Beam, confirmed: usize) -> &[Token] {
    &beam.tokens()[confirmed.min(beam.len())..]
}
