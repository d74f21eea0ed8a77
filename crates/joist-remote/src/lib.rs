//! Remote endpoint for the build debug tracker.
//!
//! A debugger UI in another process connects over TCP and speaks a
//! line-oriented protocol: commands in (`resume`, `step_over`,
//! `add_breakpoint ...`), lifecycle events and marshaled `stack`/`properties`
//! messages out. The endpoint owns no build state of its own; every command
//! maps onto one `joist_debug::BuildDebugTracker` operation.

pub mod config;
pub mod logging;
pub mod protocol;
pub mod server;

pub use crate::config::{ConfigError, DebugServerConfig};
pub use crate::protocol::{Command, ProtocolError};
pub use crate::server::{event_channel, DebugServer, RemoteListener, ServerError};
