//! eda-assist: natural-language command pipeline for schematic and board editors
//!
//! A user request is sent to a text generator together with a snapshot of the
//! open design. Command lines are mined out of the reply, parsed into typed
//! actions and executed against the host editor in two passes, placements
//! before connections.
//!
//! # Architecture
//!
//! ```text
//! prompt ─► context ─► prompt builder ─► generator ─► miner ─► parser ─► executor
//! ```
//!
//! The host application is reached only through the capability traits in
//! [`host`]. [`host::MemoryHost`] implements them over a JSON design document.
//!
//! # Modules
//!
//! - [`command`] - Action language: miner, lexer, parser
//! - [`config`] - Configuration loading and validation
//! - [`context`] - Per-request snapshot of host state
//! - [`error`] - Error types
//! - [`executor`] - Action dispatch, name resolution, schematic edits
//! - [`generator`] - Generator trait and HTTP client
//! - [`host`] - Host capability traits and the in-memory host
//! - [`pipeline`] - Two-pass orchestration and reporting
//! - [`prompt`] - System prompt construction

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod generator;
pub mod host;
pub mod pipeline;
pub mod prompt;

pub use command::{Action, LibraryId, Point};
pub use executor::{CommandResult, Executor};
pub use pipeline::Pipeline;
