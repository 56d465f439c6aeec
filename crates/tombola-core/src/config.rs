// Round configuration: the closed number range and the win thresholds.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{DrawError, NumberFault};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The only accepted lower bound of the number range.
pub const RANGE_MIN: u32 = 1;

/// Accepted upper bounds of the number range.
pub const ALLOWED_MAX: [u32; 3] = [5, 10, 20];

/// Inclusive bounds for `touches_to_win`.
pub const TOUCHES_TO_WIN_BOUNDS: RangeInclusive<u32> = 1..=20;

/// Inclusive bounds for `winners_per_round`.
pub const WINNERS_PER_ROUND_BOUNDS: RangeInclusive<usize> = 1..=10;

// ---------------------------------------------------------------------------
// RoundConfig
// ---------------------------------------------------------------------------

/// Parameters of one round. Only constructed values that passed
/// [`RoundConfig::validate`] are ever installed into a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfig {
    pub min: u32,
    pub max: u32,
    /// Hits a number needs before it becomes a winner.
    pub touches_to_win: u32,
    /// Winners needed to close the round.
    pub winners_per_round: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        RoundConfig {
            min: RANGE_MIN,
            max: 10,
            touches_to_win: 5,
            winners_per_round: 3,
        }
    }
}

impl RoundConfig {
    /// Build a config with the fixed lower bound.
    pub fn new(max: u32, touches_to_win: u32, winners_per_round: usize) -> Self {
        RoundConfig {
            min: RANGE_MIN,
            max,
            touches_to_win,
            winners_per_round,
        }
    }

    /// Check every field against the allowed sets and ranges.
    pub fn validate(&self) -> Result<(), DrawError> {
        if self.min != RANGE_MIN {
            return Err(DrawError::invalid_config(
                "min",
                format!("must be {RANGE_MIN}, got {}", self.min),
            ));
        }

        if !ALLOWED_MAX.contains(&self.max) {
            return Err(DrawError::invalid_config(
                "max",
                format!("must be one of {ALLOWED_MAX:?}, got {}", self.max),
            ));
        }

        if !TOUCHES_TO_WIN_BOUNDS.contains(&self.touches_to_win) {
            return Err(DrawError::invalid_config(
                "touchesToWin",
                format!(
                    "must be between {} and {} inclusive, got {}",
                    TOUCHES_TO_WIN_BOUNDS.start(),
                    TOUCHES_TO_WIN_BOUNDS.end(),
                    self.touches_to_win
                ),
            ));
        }

        if !WINNERS_PER_ROUND_BOUNDS.contains(&self.winners_per_round) {
            return Err(DrawError::invalid_config(
                "winnersPerRound",
                format!(
                    "must be between {} and {} inclusive, got {}",
                    WINNERS_PER_ROUND_BOUNDS.start(),
                    WINNERS_PER_ROUND_BOUNDS.end(),
                    self.winners_per_round
                ),
            ));
        }

        Ok(())
    }

    /// All valid numbers of the round, ascending.
    pub fn numbers(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }

    pub fn contains(&self, n: u32) -> bool {
        self.numbers().contains(&n)
    }

    /// Validate a caller-supplied number against the range.
    ///
    /// Takes `i64` so negative values coming off the wire are reported as
    /// out of range rather than wrapping.
    pub fn check_number(&self, value: i64) -> Result<u32, DrawError> {
        match u32::try_from(value) {
            Ok(n) if self.contains(n) => Ok(n),
            _ => Err(DrawError::InvalidNumber {
                value: value.to_string(),
                fault: NumberFault::OutOfRange,
                min: self.min,
                max: self.max,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RoundConfig::default();
        assert_eq!(config.min, 1);
        assert_eq!(config.max, 10);
        assert_eq!(config.touches_to_win, 5);
        assert_eq!(config.winners_per_round, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn every_allowed_max_is_accepted() {
        for max in ALLOWED_MAX {
            assert!(RoundConfig::new(max, 3, 2).validate().is_ok(), "max={max}");
        }
    }

    #[test]
    fn rejects_max_outside_allowed_set() {
        let err = RoundConfig::new(7, 3, 2).validate().unwrap_err();
        match err {
            DrawError::InvalidConfig { field, .. } => assert_eq!(field, "max"),
            other => panic!("expected InvalidConfig, got: {other}"),
        }
    }

    #[test]
    fn rejects_min_other_than_one() {
        let mut config = RoundConfig::default();
        config.min = 0;
        match config.validate().unwrap_err() {
            DrawError::InvalidConfig { field, .. } => assert_eq!(field, "min"),
            other => panic!("expected InvalidConfig, got: {other}"),
        }
    }

    #[test]
    fn rejects_touches_to_win_out_of_bounds() {
        for touches in [0, 21] {
            match RoundConfig::new(10, touches, 1).validate().unwrap_err() {
                DrawError::InvalidConfig { field, .. } => assert_eq!(field, "touchesToWin"),
                other => panic!("expected InvalidConfig, got: {other}"),
            }
        }
        assert!(RoundConfig::new(10, 1, 1).validate().is_ok());
        assert!(RoundConfig::new(10, 20, 1).validate().is_ok());
    }

    #[test]
    fn rejects_winners_per_round_out_of_bounds() {
        for winners in [0, 11] {
            match RoundConfig::new(20, 3, winners).validate().unwrap_err() {
                DrawError::InvalidConfig { field, .. } => assert_eq!(field, "winnersPerRound"),
                other => panic!("expected InvalidConfig, got: {other}"),
            }
        }
    }

    #[test]
    fn check_number_bounds() {
        let config = RoundConfig::new(5, 2, 1);
        assert_eq!(config.check_number(1), Ok(1));
        assert_eq!(config.check_number(5), Ok(5));
        assert!(matches!(
            config.check_number(0),
            Err(DrawError::InvalidNumber {
                fault: NumberFault::OutOfRange,
                min: 1,
                max: 5,
                ..
            })
        ));
        assert_eq!(
            config.check_number(6).unwrap_err().to_string(),
            "number 6 is outside the range, expected an integer in 1..=5"
        );
        assert!(config.check_number(6).is_err());
        assert!(config.check_number(-3).is_err());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(RoundConfig::new(5, 2, 1)).unwrap();
        assert_eq!(json["touchesToWin"], 2);
        assert_eq!(json["winnersPerRound"], 1);
        assert_eq!(json["min"], 1);
    }
}
