//! Simulation link drivers.
//!
//! Software-emulated hardware for development and testing without a
//! physical station. Each simulator is a cheap clonable handle over
//! shared interior state, so a test can keep a probe handle while the
//! facade owns the link:
//!
//! - deterministic behavior (the MCU temperature follows the last
//!   commanded setpoint, so the standard sequences pass),
//! - scriptable failure injection (`fail_next_connect`, scripted
//!   temperature/force readbacks),
//! - call counters for asserting command traffic.

mod digital_io;
mod load_cell;
mod mcu;
mod power;
mod robot;

pub use digital_io::SimDigitalIo;
pub use load_cell::SimLoadCell;
pub use mcu::SimMcu;
pub use power::SimPowerSupply;
pub use robot::SimRobot;
