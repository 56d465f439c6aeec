// Game: the single coordinating service of a round. Owns the round state,
// the random generator and the notifier, and is the only entry point for
// mutations. Every mutator validates its input completely before touching
// state, so a rejected call leaves the round exactly as it was.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RoundConfig;
use crate::engine::{self, DrawPayload};
use crate::error::DrawError;
use crate::events::{Notifier, RoundEvent};
use crate::planner::{self, NoiseGap};
use crate::prediction::{self, Prediction};
use crate::round::{PublicView, RoundSnapshot, RoundState};

/// Current plan as shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    pub planned_winners: Vec<u32>,
    pub stealth_left: usize,
}

pub struct Game<R, N> {
    state: RoundState,
    rng: R,
    notifier: N,
}

impl<R: Rng, N: Notifier> Game<R, N> {
    /// Start a game with a fresh round under `config`.
    pub fn new(config: RoundConfig, rng: R, notifier: N) -> Result<Self, DrawError> {
        config.validate()?;
        Ok(Game {
            state: RoundState::new(config),
            rng,
            notifier,
        })
    }

    /// Replace the config and start a new round. Plan targets survive.
    pub fn reset(&mut self, config: RoundConfig) -> Result<(), DrawError> {
        config.validate()?;
        self.state.reset(config);
        info!(
            "Round reset: range {}..={}, touches_to_win={}, winners_per_round={}",
            config.min, config.max, config.touches_to_win, config.winners_per_round
        );
        self.notifier.notify(RoundEvent::Reset { config });
        Ok(())
    }

    /// Append numbers to the visible preset queue. Numbers that already won
    /// are dropped. Returns how many were enqueued.
    pub fn push_preset(&mut self, numbers: &[i64]) -> Result<usize, DrawError> {
        let checked = self.check_numbers(numbers)?;
        let accepted: Vec<u32> = checked
            .into_iter()
            .filter(|n| !self.state.is_winner(*n))
            .collect();
        let added = accepted.len();
        self.state.extend_preset(accepted);
        info!("Preset queue extended by {} (now {})", added, self.state.preset_queue().len());
        Ok(added)
    }

    /// Rebuild the stealth plan from `targets`, replacing any previous plan.
    pub fn build_plan(&mut self, targets: &[i64], gap: NoiseGap) -> Result<PlanStatus, DrawError> {
        let requested = self.check_numbers(targets)?;
        let selected = planner::select_targets(&self.state, &requested);
        if selected.is_empty() {
            return Err(DrawError::EmptyPlan);
        }

        let queue = planner::build_queue(&self.state, &selected, gap, &mut self.rng);
        info!(
            "Plan rebuilt for {} target(s), {} stealth entries",
            selected.len(),
            queue.len()
        );
        debug!("Plan targets {:?}, queue {:?}", selected, queue);
        self.state.replace_plan(selected, queue);
        Ok(self.plan_status())
    }

    /// Drop the plan targets and the stealth queue.
    pub fn clear_plan(&mut self) {
        self.state.clear_plan();
        info!("Plan cleared");
    }

    /// Queue enough copies of `number` on the preset queue to make it win.
    /// Hits already queued in either queue count toward the deficit.
    /// Returns how many copies were added (0 for an existing winner).
    pub fn force_win(&mut self, number: i64) -> Result<u32, DrawError> {
        let n = self.state.config().check_number(number)?;
        if self.state.is_winner(n) {
            return Ok(0);
        }
        let added = self.state.remaining_to_win(n);
        self.state
            .extend_preset(std::iter::repeat(n).take(added as usize));
        info!("Forced win for {}: {} preset entries added", n, added);
        Ok(added)
    }

    /// Commit exactly one draw and raise its events.
    pub fn draw_one(&mut self) -> DrawPayload {
        let outcome = engine::draw_one(&mut self.state, &mut self.rng);
        self.notifier.notify(RoundEvent::Draw(outcome.payload.clone()));
        if let Some(over) = outcome.round_over {
            self.notifier.notify(RoundEvent::Over(over));
        }
        outcome.payload
    }

    pub fn prediction(&self) -> Prediction {
        prediction::compute(&self.state)
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.state.snapshot()
    }

    pub fn public_view(&self) -> PublicView {
        self.state.public_view()
    }

    pub fn plan_status(&self) -> PlanStatus {
        PlanStatus {
            planned_winners: self.state.planned_winners().to_vec(),
            stealth_left: self.state.stealth_queue().len(),
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn config(&self) -> &RoundConfig {
        self.state.config()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    fn check_numbers(&self, numbers: &[i64]) -> Result<Vec<u32>, DrawError> {
        let config = self.state.config();
        numbers.iter().map(|&v| config.check_number(v)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
