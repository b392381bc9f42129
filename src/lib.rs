//! Vigil: operator console core with a terminal front end.
//!
//! The console keeps a bounded activity log, tracks whether the viewer follows its tail,
//! times critical alerts and gates simulated occupancy analysis on a validated media
//! source. Time and randomness are injected so every behaviour can be replayed.

mod cli;
pub mod colors;
pub mod vigil_alert;
pub mod vigil_clock;
pub mod vigil_console;
pub mod vigil_core;
pub mod vigil_follow;
pub mod vigil_log;
pub mod vigil_source;
pub mod vigil_telemetry;
pub mod vigil_tui;

pub use cli::{run, DynError};
pub use vigil_console::{Console, ConsoleConfig, ConsoleEvent, ConsoleSnapshot, TeardownReport};
pub use vigil_core::{DensitySnapshot, EntryId, LogEntry, Severity, ValidationError, ZoneCount};
