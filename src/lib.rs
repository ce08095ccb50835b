#![forbid(unsafe_code)]

//! Bridge between a host process and external coding agents.
//!
//! - [`process`]: stream a CLI agent's stdout line by line under a timeout.
//! - [`serializer`]: one in-flight operation per session key.
//! - [`protocol`]: fold stream-json lines into a final answer.
//! - [`runner`]: the three above as one call.
//! - [`bridge`]: shape an in-process agent session's events for delivery.

pub mod bridge;
pub mod config;
pub mod errors;
pub mod process;
pub mod protocol;
pub mod runner;
pub mod serializer;

pub use config::RelayConfig;
pub use errors::{AppError, Result};
