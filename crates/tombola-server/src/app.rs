// Application state and orchestration logic.
//
// The central event loop owns the game. Client requests and timer ticks are
// applied one at a time in arrival order. Events raised by a mutation are
// fanned out to every connected client before the requester gets its reply.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tombola_core::{DrawError, Game, RoundConfig, RoundEvent};

use crate::config::Config;
use crate::protocol::{self, AdminView, ClientMessage, ServerMessage};
use crate::ws_server::{ConnId, WsEvent};

/// The game as the server runs it: ChaCha20 randomness, events buffered for
/// fan-out by the loop.
pub type RoundGame = Game<ChaCha20Rng, Vec<RoundEvent>>;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// One connected client.
#[derive(Debug)]
pub struct Session {
    pub addr: String,
    pub outbound: mpsc::Sender<String>,
    /// Set by a successful `login` on this connection.
    pub is_admin: bool,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete application state.
pub struct AppState {
    pub config: Config,
    pub game: RoundGame,
    pub sessions: HashMap<ConnId, Session>,
}

impl AppState {
    /// Build the state with a fresh round from `config.round`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let rng = match config.draw.seed {
            Some(seed) => {
                info!("Seeding draw generator with {}", seed);
                ChaCha20Rng::seed_from_u64(seed)
            }
            None => ChaCha20Rng::from_entropy(),
        };
        let game = Game::new(config.round, rng, Vec::new())
            .context("invalid initial round config")?;

        Ok(AppState {
            config,
            game,
            sessions: HashMap::new(),
        })
    }

    fn is_admin(&self, conn_id: ConnId) -> bool {
        self.sessions.get(&conn_id).is_some_and(|s| s.is_admin)
    }

    /// Apply one client request and build the reply for its sender.
    /// Events the request raised stay buffered until [`Self::take_events`].
    pub fn dispatch(&mut self, conn_id: ConnId, msg: ClientMessage) -> ServerMessage {
        if msg.requires_admin() && !self.is_admin(conn_id) {
            warn!("Rejected operator request from connection #{}", conn_id);
            return ServerMessage::error("unauthorized");
        }

        self.apply(conn_id, msg).unwrap_or_else(|e| {
            info!("Request from connection #{} rejected: {}", conn_id, e);
            ServerMessage::error(e.to_string())
        })
    }

    fn apply(&mut self, conn_id: ConnId, msg: ClientMessage) -> Result<ServerMessage, DrawError> {
        let reply = match msg {
            ClientMessage::Login { password } => {
                if password != self.config.admin_password {
                    warn!("Failed login from connection #{}", conn_id);
                    return Ok(ServerMessage::error("invalid password"));
                }
                if let Some(session) = self.sessions.get_mut(&conn_id) {
                    session.is_admin = true;
                }
                info!("Connection #{} logged in as operator", conn_id);
                ServerMessage::Login { ok: true }
            }
            ClientMessage::PublicDraw | ClientMessage::Draw => {
                ServerMessage::Ack(self.game.draw_one())
            }
            ClientMessage::AdminState => ServerMessage::AdminState(Box::new(self.admin_view())),
            ClientMessage::SetConfig {
                max,
                touches_to_win,
                winners_per_round,
            } => {
                let current = *self.game.config();
                let config = RoundConfig::new(
                    max,
                    touches_to_win.unwrap_or(current.touches_to_win),
                    winners_per_round.unwrap_or(current.winners_per_round),
                );
                self.game.reset(config)?;
                ServerMessage::Config { config }
            }
            ClientMessage::Reset => {
                let config = *self.game.config();
                self.game.reset(config)?;
                ServerMessage::Config { config }
            }
            ClientMessage::Preset { numbers } => {
                let numbers = protocol::integers(&numbers, self.game.config())?;
                let added = self.game.push_preset(&numbers)?;
                ServerMessage::Preset {
                    added,
                    preset_queue: self.preset_queue(),
                    prediction: self.game.prediction(),
                }
            }
            ClientMessage::MakeWin { number } => {
                let value = protocol::integer(&number, self.game.config())?;
                let n = self.game.config().check_number(value)?;
                let note = self
                    .game
                    .state()
                    .is_winner(n)
                    .then(|| "already a winner".to_string());
                let added = self.game.force_win(value)?;
                ServerMessage::MakeWin {
                    added,
                    note,
                    preset_queue: self.preset_queue(),
                    prediction: self.game.prediction(),
                }
            }
            ClientMessage::SetPlan {
                winners,
                gap_min,
                gap_max,
            } => {
                let targets = protocol::integers(&winners, self.game.config())?;
                let gap = match protocol::requested_gap(gap_min, gap_max) {
                    Ok(gap) => gap,
                    Err(message) => return Ok(ServerMessage::error(message)),
                };
                self.game.build_plan(&targets, gap)?;
                self.plan_reply()
            }
            ClientMessage::GetPlan => self.plan_reply(),
            ClientMessage::ClearPlan => {
                self.game.clear_plan();
                self.plan_reply()
            }
        };
        Ok(reply)
    }

    /// Drain the events raised since the last call, in issuance order.
    pub fn take_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(self.game.notifier_mut())
    }

    pub fn admin_view(&self) -> AdminView {
        let snapshot = self.game.snapshot();
        AdminView {
            config: snapshot.config,
            preset_queue: snapshot.preset_queue,
            counts: snapshot.counts,
            drawn: snapshot.drawn,
            winners: snapshot.winners,
            prediction: self.game.prediction(),
        }
    }

    fn preset_queue(&self) -> Vec<u32> {
        self.game.state().preset_queue().iter().copied().collect()
    }

    fn plan_reply(&self) -> ServerMessage {
        let status = self.game.plan_status();
        ServerMessage::Plan {
            planned_winners: status.planned_winners,
            stealth_left: status.stealth_left,
            prediction: self.game.prediction(),
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on the WebSocket event channel and, when configured, an auto-draw
/// interval, using `tokio::select!`. Exits when the WebSocket channel closes.
pub async fn run(mut ws_rx: mpsc::Receiver<WsEvent>, mut state: AppState) -> anyhow::Result<()> {
    info!("Application event loop started");

    let period_ms = state.config.draw.auto_draw_interval_ms;
    let auto_draw_enabled = period_ms > 0;
    let mut auto_draw = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
    auto_draw.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the first draw
    // happens after one full period.
    auto_draw.tick().await;
    if auto_draw_enabled {
        info!("Auto-draw enabled every {} ms", period_ms);
    }

    loop {
        tokio::select! {
            ws_event = ws_rx.recv() => {
                match ws_event {
                    Some(event) => handle_ws_event(&mut state, event),
                    None => {
                        info!("WebSocket channel closed, shutting down");
                        break;
                    }
                }
            }

            _ = auto_draw.tick(), if auto_draw_enabled => {
                handle_auto_draw(&mut state);
            }
        }
    }

    info!("Application event loop exiting");
    Ok(())
}

fn handle_ws_event(state: &mut AppState, event: WsEvent) {
    match event {
        WsEvent::Connected {
            conn_id,
            addr,
            outbound,
        } => {
            info!("Client #{} connected from {}", conn_id, addr);
            state.sessions.insert(
                conn_id,
                Session {
                    addr,
                    outbound,
                    is_admin: false,
                },
            );
            let hydrate = ServerMessage::Hydrate(state.game.public_view());
            send_to(state, conn_id, &hydrate);
        }
        WsEvent::Disconnected { conn_id } => {
            if let Some(session) = state.sessions.remove(&conn_id) {
                info!("Client #{} ({}) disconnected", conn_id, session.addr);
            }
        }
        WsEvent::Message { conn_id, text } => {
            handle_client_text(state, conn_id, &text);
        }
    }
}

/// Parse and apply one client message, then deliver events and reply.
fn handle_client_text(state: &mut AppState, conn_id: ConnId, text: &str) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => {
            debug!("Connection #{} sent {:?}", conn_id, msg);
            state.dispatch(conn_id, msg)
        }
        Err(e) => {
            warn!("Failed to parse client message: {}", e);
            ServerMessage::error(format!("malformed message: {e}"))
        }
    };

    broadcast_events(state);
    send_to(state, conn_id, &reply);
}

/// Timer-driven draw. Skipped once the round is over.
fn handle_auto_draw(state: &mut AppState) {
    if !state.game.state().is_active() {
        return;
    }
    let payload = state.game.draw_one();
    debug!("Auto-draw produced {}", payload.number);
    broadcast_events(state);
}

// ---------------------------------------------------------------------------
// Delivery
//
// The loop never waits on a client. A session whose outbound buffer is full
// or closed is dropped, which closes its writer and then its connection.
// ---------------------------------------------------------------------------

fn broadcast_events(state: &mut AppState) {
    for event in state.take_events() {
        let name = event.name();
        let text = match ServerMessage::from(event).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {} event: {}", name, e);
                continue;
            }
        };

        let stalled: Vec<ConnId> = state
            .sessions
            .iter()
            .filter(|(conn_id, session)| !offer(**conn_id, session, text.clone()))
            .map(|(conn_id, _)| *conn_id)
            .collect();
        for conn_id in stalled {
            drop_session(state, conn_id);
        }
    }
}

fn send_to(state: &mut AppState, conn_id: ConnId, msg: &ServerMessage) {
    let text = match msg.encode() {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode reply: {}", e);
            return;
        }
    };
    let delivered = state
        .sessions
        .get(&conn_id)
        .map(|session| offer(conn_id, session, text));
    if delivered == Some(false) {
        drop_session(state, conn_id);
    }
}

/// Queue `text` for one client without waiting. Returns `false` when the
/// client is gone or not keeping up.
fn offer(conn_id: ConnId, session: &Session, text: String) -> bool {
    match session.outbound.try_send(text) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(
                "Client #{} ({}) is not reading its messages",
                conn_id, session.addr
            );
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

fn drop_session(state: &mut AppState, conn_id: ConnId) {
    if let Some(session) = state.sessions.remove(&conn_id) {
        info!("Dropped client #{} ({})", conn_id, session.addr);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
