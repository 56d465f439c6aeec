// Prediction view: a read-only projection of how close each number is to
// winning, counting both recorded hits and hits already queued for it.

use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::round::RoundState;

/// Standing of one number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionEntry {
    pub number: u32,
    pub have: u32,
    /// Concrete occurrences waiting in the stealth and preset queues.
    pub in_queue: u32,
    pub remaining: u32,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Closest to winning first.
    pub list: Vec<PredictionEntry>,
    /// The visible preset queue, head first.
    pub queue: Vec<u32>,
    pub winners: Vec<u32>,
    pub config: RoundConfig,
}

/// Compute the prediction for the current round. Pure: the same state always
/// yields the same output.
pub fn compute(state: &RoundState) -> Prediction {
    let touches = state.config().touches_to_win;

    let mut list: Vec<PredictionEntry> = state
        .config()
        .numbers()
        .map(|n| {
            let have = state.have(n);
            let in_queue = state.queued_count(n);
            PredictionEntry {
                number: n,
                have,
                in_queue,
                remaining: touches.saturating_sub(have + in_queue),
                is_winner: state.is_winner(n),
            }
        })
        .collect();

    // Stable sort keeps ascending number order among full ties.
    list.sort_by(|a, b| a.remaining.cmp(&b.remaining).then(b.have.cmp(&a.have)));

    Prediction {
        list,
        queue: state.preset_queue().iter().copied().collect(),
        winners: state.winners().to_vec(),
        config: *state.config(),
    }
}
