//! FTS station core.
//!
//! Two tightly-coupled subsystems make up the station engine:
//!
//! - [`sequencer`] - the hardware orchestration facade: connection
//!   management, initialization, the standby heating/cooling procedure,
//!   the temperature × position × repeat measurement matrix, and
//!   best-effort teardown.
//! - [`safety`] - the industrial safety subsystem: tower-lamp state
//!   machine (dedicated actor thread), safety-sensor violation
//!   classifier, and the system manager gating test starts.
//!
//! [`sinks`] holds the optional collaborator contracts (measurement
//! repository, GUI progress, operator prompt) the facade fans data
//! out to.

pub mod safety;
pub mod sequencer;
pub mod sinks;
