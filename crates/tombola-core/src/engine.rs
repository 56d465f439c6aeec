// Draw engine: picks the next number and commits it to the round.
//
// Sources are consulted in a fixed order (stealth queue, preset queue,
// weighted random) until one yields a usable number. The weighted fallback
// is an explicit weight table sampled by cumulative distribution so a seeded
// generator reproduces the exact same draws.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RoundConfig;
use crate::round::{QueueEntry, RoundState};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Multiplier for numbers still inside the recent window.
pub const RECENT_PENALTY: f64 = 0.35;

/// Multiplier for live plan targets while a plan is active.
pub const TARGET_BOOST: f64 = 1.8;

/// Multiplier for every other number while a plan is active.
pub const NON_TARGET_DAMPING: f64 = 0.75;

/// Floor applied to every weight.
pub const MIN_WEIGHT: f64 = 0.001;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Result of a committed draw, as broadcast on the `draw` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawPayload {
    pub number: u32,
    pub counts: BTreeMap<u32, u32>,
    pub drawn: Vec<u32>,
    pub winners: Vec<u32>,
    pub config: RoundConfig,
    pub planned_winners: Vec<u32>,
    pub stealth_left: usize,
}

/// Carried by the `round:over` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOver {
    pub winners: Vec<u32>,
    pub config: RoundConfig,
    pub planned_winners: Vec<u32>,
}

/// Everything one call to [`draw_one`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOutcome {
    pub source: DrawSource,
    pub payload: DrawPayload,
    pub became_winner: bool,
    /// `Some` only on the draw that closed the round.
    pub round_over: Option<RoundOver>,
}

// ---------------------------------------------------------------------------
// Candidate sources
// ---------------------------------------------------------------------------

/// Where a drawn number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSource {
    Stealth,
    Preset,
    Weighted,
}

/// Evaluation order of the sources.
pub const SOURCE_ORDER: [DrawSource; 3] =
    [DrawSource::Stealth, DrawSource::Preset, DrawSource::Weighted];

impl DrawSource {
    /// Try to produce the next number from this source, consuming queue
    /// entries as it goes. Forced entries for numbers that already won are
    /// discarded. A noise marker is discarded and resolved by a weighted
    /// draw.
    fn next<R: Rng + ?Sized>(self, state: &mut RoundState, rng: &mut R) -> Option<u32> {
        match self {
            DrawSource::Stealth => {
                while let Some(entry) = state.pop_stealth() {
                    match entry {
                        QueueEntry::Noise => return Some(weighted_pick(state, rng)),
                        QueueEntry::Forced(n) if !state.is_winner(n) => return Some(n),
                        QueueEntry::Forced(n) => {
                            debug!("Skipping stealth entry {} (already a winner)", n);
                        }
                    }
                }
                None
            }
            DrawSource::Preset => {
                while let Some(n) = state.pop_preset() {
                    if !state.is_winner(n) {
                        return Some(n);
                    }
                    debug!("Skipping preset entry {} (already a winner)", n);
                }
                None
            }
            DrawSource::Weighted => Some(weighted_pick(state, rng)),
        }
    }
}

// ---------------------------------------------------------------------------
// Weight table
// ---------------------------------------------------------------------------

/// Candidate numbers with their selection weights, in ascending number order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    entries: Vec<(u32, f64)>,
}

impl WeightTable {
    /// Candidates for a random draw: every non-winner (or the whole range if
    /// all numbers have won), minus the previous draw when more than one
    /// candidate remains.
    pub fn candidates(state: &RoundState) -> Vec<u32> {
        let range = state.config().numbers();
        let mut candidates: Vec<u32> = range.clone().filter(|n| !state.is_winner(*n)).collect();
        if candidates.is_empty() {
            candidates = range.collect();
        }
        if candidates.len() > 1 {
            if let Some(last) = state.last_drawn() {
                candidates.retain(|&n| n != last);
            }
        }
        candidates
    }

    pub fn build(state: &RoundState) -> Self {
        let plan_active = state.plan_active();
        let targets = state.live_targets();
        let touches = state.config().touches_to_win;

        let entries = Self::candidates(state)
            .into_iter()
            .map(|n| {
                let missing = touches.saturating_sub(state.have(n));
                let recency = if state.recent().contains(&n) {
                    RECENT_PENALTY
                } else {
                    1.0
                };
                let plan_factor = match (plan_active, targets.contains(&n)) {
                    (true, true) => TARGET_BOOST,
                    (true, false) => NON_TARGET_DAMPING,
                    (false, _) => 1.0,
                };
                let weight = (1.0 + f64::from(missing)) * recency * plan_factor;
                (n, weight.max(MIN_WEIGHT))
            })
            .collect();

        WeightTable { entries }
    }

    pub fn entries(&self) -> &[(u32, f64)] {
        &self.entries
    }

    pub fn weight_of(&self, n: u32) -> Option<f64> {
        self.entries.iter().find(|(x, _)| *x == n).map(|(_, w)| *w)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Cumulative-weight sampling: roll `r` in `[0, total)` and walk the
    /// table subtracting weights until the remainder drops to zero or below.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u32> {
        let (last, _) = *self.entries.last()?;
        if self.entries.len() == 1 {
            return Some(last);
        }
        let mut roll = rng.gen_range(0.0..self.total());
        for (n, weight) in &self.entries {
            roll -= weight;
            if roll <= 0.0 {
                return Some(*n);
            }
        }
        Some(last)
    }
}

fn weighted_pick<R: Rng + ?Sized>(state: &RoundState, rng: &mut R) -> u32 {
    WeightTable::build(state)
        .sample(rng)
        .unwrap_or(state.config().min)
}

// ---------------------------------------------------------------------------
// Draw
// ---------------------------------------------------------------------------

/// Decide and commit exactly one draw.
///
/// Infallible for a validated config: the weighted source always yields.
pub fn draw_one<R: Rng + ?Sized>(state: &mut RoundState, rng: &mut R) -> DrawOutcome {
    let (source, number) = SOURCE_ORDER
        .iter()
        .find_map(|source| source.next(state, rng).map(|n| (*source, n)))
        .unwrap_or((DrawSource::Weighted, state.config().min));

    let became_winner = state.record_draw(number);
    debug!(
        "Drew {} from {:?} (hits={}, stealth_left={})",
        number,
        source,
        state.have(number),
        state.stealth_queue().len()
    );

    let payload = DrawPayload {
        number,
        counts: state.counts().clone(),
        drawn: state.drawn().to_vec(),
        winners: state.winners().to_vec(),
        config: *state.config(),
        planned_winners: state.planned_winners().to_vec(),
        stealth_left: state.stealth_queue().len(),
    };

    let round_over = if state.close_if_complete() {
        info!("Round over, winners={:?}", state.winners());
        Some(RoundOver {
            winners: state.winners().to_vec(),
            config: *state.config(),
            planned_winners: state.planned_winners().to_vec(),
        })
    } else {
        None
    };

    DrawOutcome {
        source,
        payload,
        became_winner,
        round_over,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
