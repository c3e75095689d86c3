//! Command queue library.
//!
//! Runs batches of shell commands either one after another or all at once,
//! and reports their lifecycle to registered listeners.
//!
//! ## Core Types
//!
//! - [`QueueEngine`] - A named FIFO of commands with a fixed [`QueueMode`]
//! - [`CommandEntry`] - A command, its working directory and result handler
//! - [`QueueHandle`] - Adds entries to an engine while it is draining
//!
//! ## Execution
//!
//! - [`ProcessRunner`] - Runs one command and resolves to a [`CommandOutput`]
//! - [`ShellRunner`] - `/bin/sh -c` implementation with captured output
//! - [`spawn_command`] - Callback form: returns at once, reports later
//!
//! ## Events
//!
//! - [`EventKind`] - `queue-begin`, `command-start`, `command-done`,
//!   `all-dispatched`, `queue-complete`
//! - [`QueueEvent`] - An emitted event with its payload
//! - [`EventBus`] - Per-engine listener registry
//!
//! ## Console Styling
//!
//! - [`Theme`] - Role to color mapping, loadable from JSON

mod engine;
mod error;
mod events;
mod runner;
pub mod theme;

pub use engine::{CommandEntry, DrainSummary, QueueEngine, QueueHandle, QueueMode, ResultHandler};
pub use error::{ConfigError, RunError, ThemeError};
pub use events::{forward_to, EventBus, EventKind, Listener, QueueEvent};
pub use runner::{spawn_command, CommandOutput, ProcessRunner, RunFuture, ShellRunner, DEFAULT_SHELL};
pub use theme::{ColorName, Role, Theme};
