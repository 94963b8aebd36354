//! UCI engine driver: subprocess lifecycle, handshake and option
//! negotiation, per-position analysis cycles, and shutdown escalation.
//!
//! The driver is strictly synchronous at the protocol level. Commands are
//! totally ordered on the engine's stdin and a new command is only issued
//! once the previous one's terminating response (`uciok`, `readyok`,
//! `bestmove`) has been consumed, so responses always attribute to the
//! command that caused them.

pub mod options;
pub mod process;
pub mod types;

pub use process::UciEngine;
pub use types::{Evaluation, GoMode, Score, MATE_IN_ONE_CP};
