//! Streaming subprocess execution.
//!
//! - `codec`: lossy `\n` framing for child stdout.
//! - `executor`: spawn, stream lines, enforce the timeout, report a
//!   [`ProcessOutcome`].

pub mod codec;
pub mod executor;

pub use executor::{
    execute, EnvPolicy, InvocationDescriptor, ProcessOutcome, ALLOWED_ENV_VARS, DEFAULT_TIMEOUT,
    KILL_DRAIN_GRACE,
};
