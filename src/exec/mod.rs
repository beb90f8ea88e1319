// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] describes the argv handed to the OS.
//! - [`backend`] provides the `ProcessBackend` trait and the production
//!   `TokioBackend`; tests replace it with a scripted fake.
//! - [`drain`] forwards child output streams into handoff channels.
//! - [`events`] recognises progress markers in partial output.
//! - [`supervisor`] owns the consumption loop and the terminal-state
//!   resolution for one run.

pub mod backend;
pub mod command;
pub mod drain;
pub mod events;
pub mod supervisor;

pub use backend::{ChildExit, OutputStream, ProcessBackend, ScanChild, TokioBackend};
pub use command::CommandLine;
pub use events::{Marker, ProgressSnapshot, extract_into, scan_markers};
pub use supervisor::Supervisor;
