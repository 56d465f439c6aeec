// Wire protocol between browser clients and the draw server.
//
// Clients send JSON objects tagged by `type`. The server answers and
// broadcasts `{"type": ..., "payload": ..., "timestamp": ...}` envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use tombola_core::engine::{DrawPayload, RoundOver};
use tombola_core::prediction::Prediction;
use tombola_core::error::NumberFault;
use tombola_core::planner::{NoiseGap, DEFAULT_GAP_MAX, DEFAULT_GAP_MIN};
use tombola_core::round::PublicView;
use tombola_core::{DrawError, RoundConfig, RoundEvent};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "login")]
    Login { password: String },

    /// Draw requested by a player screen.
    #[serde(rename = "public:draw")]
    PublicDraw,

    #[serde(rename = "admin:state")]
    AdminState,

    /// Change the config and start a new round. Omitted thresholds keep
    /// their current value.
    #[serde(rename = "admin:config", rename_all = "camelCase")]
    SetConfig {
        max: u32,
        #[serde(default)]
        touches_to_win: Option<u32>,
        #[serde(default)]
        winners_per_round: Option<usize>,
    },

    #[serde(rename = "admin:preset")]
    Preset { numbers: Vec<Number> },

    #[serde(rename = "admin:reset")]
    Reset,

    #[serde(rename = "admin:draw")]
    Draw,

    #[serde(rename = "admin:makewin")]
    MakeWin { number: Number },

    #[serde(rename = "admin:plan", rename_all = "camelCase")]
    SetPlan {
        winners: Vec<Number>,
        #[serde(default)]
        gap_min: Option<u32>,
        #[serde(default)]
        gap_max: Option<u32>,
    },

    #[serde(rename = "admin:plan:get")]
    GetPlan,

    #[serde(rename = "admin:plan:clear")]
    ClearPlan,
}

impl ClientMessage {
    /// Whether the sender must have logged in as operator.
    pub fn requires_admin(&self) -> bool {
        !matches!(self, ClientMessage::Login { .. } | ClientMessage::PublicDraw)
    }
}

/// Convert wire numbers to integers, rejecting anything non-integral.
pub fn integers(numbers: &[Number], config: &RoundConfig) -> Result<Vec<i64>, DrawError> {
    numbers.iter().map(|n| integer(n, config)).collect()
}

pub fn integer(number: &Number, config: &RoundConfig) -> Result<i64, DrawError> {
    number.as_i64().ok_or_else(|| DrawError::InvalidNumber {
        value: number.to_string(),
        fault: NumberFault::NotInteger,
        min: config.min,
        max: config.max,
    })
}

/// Largest noise gap bound accepted in an `admin:plan` request.
pub const MAX_REQUESTED_GAP: u32 = 100;

/// Noise gap for an `admin:plan` request, defaulting omitted bounds.
/// Bounds above [`MAX_REQUESTED_GAP`] are refused, never trimmed.
pub fn requested_gap(gap_min: Option<u32>, gap_max: Option<u32>) -> Result<NoiseGap, String> {
    let min = gap_min.unwrap_or(DEFAULT_GAP_MIN);
    let max = gap_max.unwrap_or(DEFAULT_GAP_MAX);
    for (field, value) in [("gapMin", min), ("gapMax", max)] {
        if value > MAX_REQUESTED_GAP {
            return Err(format!(
                "{field} must be at most {MAX_REQUESTED_GAP}, got {value}"
            ));
        }
    }
    Ok(NoiseGap::new(min, max))
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Operator panel view of the round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub config: RoundConfig,
    pub preset_queue: Vec<u32>,
    pub counts: std::collections::BTreeMap<u32, u32>,
    pub drawn: Vec<u32>,
    pub winners: Vec<u32>,
    pub prediction: Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Sent once to every new connection.
    #[serde(rename = "hydrate")]
    Hydrate(PublicView),

    #[serde(rename = "draw")]
    Draw(DrawPayload),

    #[serde(rename = "round:reset")]
    RoundReset { config: RoundConfig },

    #[serde(rename = "round:over")]
    RoundOver(RoundOver),

    /// Reply to whoever requested a draw.
    #[serde(rename = "ack")]
    Ack(DrawPayload),

    #[serde(rename = "login")]
    Login { ok: bool },

    #[serde(rename = "admin:state")]
    AdminState(Box<AdminView>),

    #[serde(rename = "config")]
    Config { config: RoundConfig },

    #[serde(rename = "preset", rename_all = "camelCase")]
    Preset {
        added: usize,
        preset_queue: Vec<u32>,
        prediction: Prediction,
    },

    #[serde(rename = "makewin", rename_all = "camelCase")]
    MakeWin {
        added: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        preset_queue: Vec<u32>,
        prediction: Prediction,
    },

    #[serde(rename = "plan", rename_all = "camelCase")]
    Plan {
        planned_winners: Vec<u32>,
        stealth_left: usize,
        prediction: Prediction,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serialize into the wire envelope, stamped with the current time in
    /// unix milliseconds.
    pub fn encode(&self) -> serde_json::Result<String> {
        self.encode_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn encode_at(&self, timestamp: i64) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("timestamp".into(), timestamp.into());
        }
        serde_json::to_string(&value)
    }
}

impl From<RoundEvent> for ServerMessage {
    fn from(event: RoundEvent) -> Self {
        match event {
            RoundEvent::Draw(payload) => ServerMessage::Draw(payload),
            RoundEvent::Reset { config } => ServerMessage::RoundReset { config },
            RoundEvent::Over(over) => ServerMessage::RoundOver(over),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
