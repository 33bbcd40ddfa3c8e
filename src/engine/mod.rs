//! Control connection engine
//!
//! One [`ControlEngine`] drives one control connection: it admits inbound
//! lines, runs each command through the hook cycle, applies the reply and
//! close policy and performs the AUTH/CCC protection switch.

mod channel;
mod control;
mod cycle;
mod failure;

pub use channel::ControlChannel;
pub use control::{ControlEngine, EngineSettings, EngineState};
