// Stealth planner: turns a set of target numbers into a hidden forced-draw
// sequence padded with noise markers.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::round::{QueueEntry, RoundState};

/// Most targets a single plan may carry.
pub const MAX_PLAN_TARGETS: usize = 3;

pub const DEFAULT_GAP_MIN: u32 = 1;
pub const DEFAULT_GAP_MAX: u32 = 4;

// ---------------------------------------------------------------------------
// NoiseGap
// ---------------------------------------------------------------------------

/// Inclusive range of noise markers placed before each forced occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseGap {
    min: u32,
    max: u32,
}

impl NoiseGap {
    /// A `max` below `min` is raised to `min`.
    pub fn new(min: u32, max: u32) -> Self {
        NoiseGap {
            min,
            max: max.max(min),
        }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

impl Default for NoiseGap {
    fn default() -> Self {
        NoiseGap::new(DEFAULT_GAP_MIN, DEFAULT_GAP_MAX)
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Reduce a requested target list to the plan targets: first occurrence of
/// each number in request order, at most [`MAX_PLAN_TARGETS`], then minus
/// the numbers that already won.
pub fn select_targets(state: &RoundState, requested: &[u32]) -> Vec<u32> {
    let mut distinct: Vec<u32> = Vec::with_capacity(MAX_PLAN_TARGETS);
    for &n in requested {
        if !distinct.contains(&n) {
            distinct.push(n);
        }
    }
    distinct.truncate(MAX_PLAN_TARGETS);
    distinct.retain(|n| !state.is_winner(*n));
    distinct
}

/// Build the stealth queue for `targets`.
///
/// Each missing hit of a target becomes one unit: a random run of
/// `gap.min..=gap.max` noise markers followed by the target itself. Units of
/// all targets are shuffled together, flattened, and closed with a short run
/// of trailing noise bounded by `units * (gap.max - 1)`.
pub fn build_queue<R: Rng + ?Sized>(
    state: &RoundState,
    targets: &[u32],
    gap: NoiseGap,
    rng: &mut R,
) -> VecDeque<QueueEntry> {
    let mut units: Vec<Vec<QueueEntry>> = Vec::new();
    for &target in targets {
        for _ in 0..state.deficit(target) {
            let noise = rng.gen_range(gap.min()..=gap.max()) as usize;
            let mut unit = vec![QueueEntry::Noise; noise];
            unit.push(QueueEntry::Forced(target));
            units.push(unit);
        }
    }

    units.shuffle(rng);

    let forced_count = units.len() as u32;
    let mut queue: VecDeque<QueueEntry> = units.into_iter().flatten().collect();

    let max_noise = forced_count * gap.max().saturating_sub(1);
    let extra_noise = max_noise.min(rng.gen_range(1..=(gap.min() + 1).max(2)));
    queue.extend(std::iter::repeat(QueueEntry::Noise).take(extra_noise as usize));

    queue
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
