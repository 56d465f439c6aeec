// Round state: the authoritative record of one round (config, hit counts,
// history, winners, forced-draw queues).

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RoundConfig;

/// How many of the latest draws are remembered to damp immediate repeats.
pub const RECENT_WINDOW: usize = 3;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// One entry of the hidden stealth queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEntry {
    /// Placeholder resolved to a weighted-random draw when consumed.
    Noise,
    /// A number that must be drawn when this entry is reached.
    Forced(u32),
}

impl QueueEntry {
    pub fn forced(self) -> Option<u32> {
        match self {
            QueueEntry::Forced(n) => Some(n),
            QueueEntry::Noise => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Active,
    Over,
}

// ---------------------------------------------------------------------------
// RoundState
// ---------------------------------------------------------------------------

/// The complete state of the current round.
///
/// Fields are only mutated through the methods below, which the engine,
/// planner and [`crate::game::Game`] call; outside readers get a
/// [`RoundSnapshot`] or a [`PublicView`].
#[derive(Debug, Clone)]
pub struct RoundState {
    config: RoundConfig,
    counts: BTreeMap<u32, u32>,
    drawn: Vec<u32>,
    recent: VecDeque<u32>,
    winners: Vec<u32>,
    preset_queue: VecDeque<u32>,
    stealth_queue: VecDeque<QueueEntry>,
    planned_winners: Vec<u32>,
    phase: RoundPhase,
}

impl RoundState {
    /// Start a fresh, active round. `config` must already be validated.
    pub fn new(config: RoundConfig) -> Self {
        RoundState {
            config,
            counts: BTreeMap::new(),
            drawn: Vec::new(),
            recent: VecDeque::with_capacity(RECENT_WINDOW + 1),
            winners: Vec::new(),
            preset_queue: VecDeque::new(),
            stealth_queue: VecDeque::new(),
            planned_winners: Vec::new(),
            phase: RoundPhase::Active,
        }
    }

    // -- read access --------------------------------------------------------

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn counts(&self) -> &BTreeMap<u32, u32> {
        &self.counts
    }

    /// Hits recorded for `n` in this round.
    pub fn have(&self, n: u32) -> u32 {
        self.counts.get(&n).copied().unwrap_or(0)
    }

    pub fn drawn(&self) -> &[u32] {
        &self.drawn
    }

    pub fn recent(&self) -> &VecDeque<u32> {
        &self.recent
    }

    pub fn last_drawn(&self) -> Option<u32> {
        self.recent.back().copied()
    }

    pub fn winners(&self) -> &[u32] {
        &self.winners
    }

    pub fn is_winner(&self, n: u32) -> bool {
        self.winners.contains(&n)
    }

    pub fn preset_queue(&self) -> &VecDeque<u32> {
        &self.preset_queue
    }

    pub fn stealth_queue(&self) -> &VecDeque<QueueEntry> {
        &self.stealth_queue
    }

    pub fn planned_winners(&self) -> &[u32] {
        &self.planned_winners
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    /// Concrete occurrences of `n` waiting in either queue.
    pub fn queued_count(&self, n: u32) -> u32 {
        let in_stealth = self
            .stealth_queue
            .iter()
            .filter(|e| e.forced() == Some(n))
            .count();
        let in_preset = self.preset_queue.iter().filter(|&&x| x == n).count();
        (in_stealth + in_preset) as u32
    }

    /// Hits `n` still needs once everything already queued for it is drawn.
    pub fn remaining_to_win(&self, n: u32) -> u32 {
        self.config
            .touches_to_win
            .saturating_sub(self.have(n) + self.queued_count(n))
    }

    /// Hits `n` still needs, ignoring the queues.
    pub fn deficit(&self, n: u32) -> u32 {
        self.config.touches_to_win.saturating_sub(self.have(n))
    }

    /// Planned winners that have not won yet.
    pub fn live_targets(&self) -> Vec<u32> {
        self.planned_winners
            .iter()
            .copied()
            .filter(|n| !self.is_winner(*n))
            .collect()
    }

    /// A plan is active while a planned winner is still pending or the
    /// stealth queue still holds a forced entry.
    pub fn plan_active(&self) -> bool {
        self.planned_winners.iter().any(|n| !self.is_winner(*n))
            || self.stealth_queue.iter().any(|e| e.forced().is_some())
    }

    // -- mutation -----------------------------------------------------------

    /// Start a new round under `config` (already validated).
    ///
    /// Counts, history, winners, the recent window and the stealth queue are
    /// cleared. Planned winners and the preset queue carry over, minus any
    /// number that falls outside the new range.
    pub fn reset(&mut self, config: RoundConfig) {
        self.config = config;
        self.counts.clear();
        self.drawn.clear();
        self.recent.clear();
        self.winners.clear();
        self.stealth_queue.clear();
        self.preset_queue.retain(|n| config.contains(*n));
        self.planned_winners.retain(|n| config.contains(*n));
        self.phase = RoundPhase::Active;
    }

    /// Record one draw of `n`. Returns `true` when this draw made `n` a
    /// winner, in which case `n` is purged from both queues.
    pub(crate) fn record_draw(&mut self, n: u32) -> bool {
        *self.counts.entry(n).or_insert(0) += 1;
        self.drawn.push(n);

        self.recent.push_back(n);
        while self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }

        if !self.is_winner(n) && self.have(n) >= self.config.touches_to_win {
            self.winners.push(n);
            self.purge_queues_of(n);
            info!("Number {} became winner #{}", n, self.winners.len());
            return true;
        }
        false
    }

    /// Drop every concrete occurrence of `n` from both queues. Noise markers
    /// are left in place.
    fn purge_queues_of(&mut self, n: u32) {
        self.preset_queue.retain(|&x| x != n);
        self.stealth_queue.retain(|e| e.forced() != Some(n));
    }

    /// Close the round if the winner quota has been reached. Returns `true`
    /// only on the Active -> Over transition.
    pub(crate) fn close_if_complete(&mut self) -> bool {
        if self.phase == RoundPhase::Active
            && self.winners.len() >= self.config.winners_per_round
        {
            self.phase = RoundPhase::Over;
            return true;
        }
        false
    }

    pub(crate) fn pop_stealth(&mut self) -> Option<QueueEntry> {
        self.stealth_queue.pop_front()
    }

    pub(crate) fn pop_preset(&mut self) -> Option<u32> {
        self.preset_queue.pop_front()
    }

    pub(crate) fn extend_preset(&mut self, numbers: impl IntoIterator<Item = u32>) {
        self.preset_queue.extend(numbers);
    }

    /// Install a new plan, replacing any previous one wholesale.
    pub(crate) fn replace_plan(&mut self, planned: Vec<u32>, queue: VecDeque<QueueEntry>) {
        self.planned_winners = planned;
        self.stealth_queue = queue;
    }

    pub(crate) fn clear_plan(&mut self) {
        self.planned_winners.clear();
        self.stealth_queue.clear();
    }

    // -- external views -----------------------------------------------------

    /// Owned copy of every field.
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            config: self.config,
            counts: self.counts.clone(),
            drawn: self.drawn.clone(),
            recent: self.recent.iter().copied().collect(),
            winners: self.winners.clone(),
            preset_queue: self.preset_queue.iter().copied().collect(),
            stealth_queue: self.stealth_queue.iter().copied().collect(),
            planned_winners: self.planned_winners.clone(),
            phase: self.phase,
        }
    }

    /// The fields any player may see. Hidden planning state is left out.
    pub fn public_view(&self) -> PublicView {
        PublicView {
            config: self.config,
            counts: self.counts.clone(),
            drawn: self.drawn.clone(),
            winners: self.winners.clone(),
            is_round_active: self.is_active(),
        }
    }
}

/// Immutable copy of the full round state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub config: RoundConfig,
    pub counts: BTreeMap<u32, u32>,
    pub drawn: Vec<u32>,
    pub recent: Vec<u32>,
    pub winners: Vec<u32>,
    pub preset_queue: Vec<u32>,
    pub stealth_queue: Vec<QueueEntry>,
    pub planned_winners: Vec<u32>,
    pub phase: RoundPhase,
}

/// What a non-operator client is shown on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicView {
    pub config: RoundConfig,
    pub counts: BTreeMap<u32, u32>,
    pub drawn: Vec<u32>,
    pub winners: Vec<u32>,
    pub is_round_active: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
