//! Debug-side state machine for a target/task build engine.
//!
//! This crate provides:
//! - [`BuildDebugTracker`]: consumes the engine's ordered lifecycle events,
//!   maintains the live call/target stacks, and decides where and when the
//!   build suspends.
//! - The delimited wire format ([`wire`]) a remote debugger client receives:
//!   call-stack snapshots and property deltas.
//!
//! The build engine itself is an external collaborator reached through
//! `joist_build_model::BuildModel`; nothing here executes build work.

pub mod breakpoints;
pub mod events;
mod location;
pub mod properties;
mod tracker;
pub mod wire;

pub use crate::events::{DebugListener, NullListener, ResumeMode, SuspendReason};
pub use crate::location::parse_legacy_location;
pub use crate::properties::PropertyKind;
pub use crate::tracker::BuildDebugTracker;
