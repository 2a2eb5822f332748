//! Core simulation components.
//!
//! This module provides the fundamental types for replaying a strategy:
//! - `Bar`: one price sample, with an ordered price fallback per role.
//! - `Trade`: an executed trade tagged with its effect on the position.
//! - `PlacedOrder`: a resting limit order of a maker strategy.
//! - `Strategy`: a taker or a maker decision function.
//! - `PositionSimulator`: turns decisions into trades under an inventory cap.

mod bar;
mod inventory;
mod order;
mod simulator;
mod strategy;
mod trade;

pub use bar::*;
pub use inventory::*;
pub use order::*;
pub use simulator::*;
pub use strategy::*;
pub use trade::*;
