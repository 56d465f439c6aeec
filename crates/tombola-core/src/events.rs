// Outbound round events and the notifier seam that fans them out.

use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::engine::{DrawPayload, RoundOver};

/// Events raised by round mutations, in issuance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RoundEvent {
    /// Raised on every committed draw.
    #[serde(rename = "draw")]
    Draw(DrawPayload),
    /// Raised on every reset with the config now in force.
    #[serde(rename = "round:reset")]
    Reset { config: RoundConfig },
    /// Raised once per round, on the draw that reaches the winner quota.
    #[serde(rename = "round:over")]
    Over(RoundOver),
}

impl RoundEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            RoundEvent::Draw(_) => "draw",
            RoundEvent::Reset { .. } => "round:reset",
            RoundEvent::Over(_) => "round:over",
        }
    }
}

/// Receives every event a [`crate::game::Game`] raises.
pub trait Notifier {
    fn notify(&mut self, event: RoundEvent);
}

/// Buffers events for the owner to drain and deliver.
impl Notifier for Vec<RoundEvent> {
    fn notify(&mut self, event: RoundEvent) {
        self.push(event);
    }
}
