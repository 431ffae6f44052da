//! FTS hardware backends.
//!
//! The station consumes hardware exclusively through the link traits in
//! [`fts_common::links`]; this crate provides the pluggable backends.
//! Currently that is the simulation driver set used for development and
//! testing without physical hardware — production serial/TCP drivers
//! live outside this workspace and implement the same traits.

pub mod simulation;

pub use simulation::{SimDigitalIo, SimLoadCell, SimMcu, SimPowerSupply, SimRobot};
