// Library root for the draw engine: round state, draw selection, stealth
// planning and the prediction view. No I/O lives in this crate.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod game;
pub mod planner;
pub mod prediction;
pub mod round;

pub use config::RoundConfig;
pub use error::DrawError;
pub use events::{Notifier, RoundEvent};
pub use game::Game;
