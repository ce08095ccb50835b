//! Stream-json protocol handling for agent CLIs.
//!
//! - `event`: decode one line into a [`ProtocolEvent`].
//! - `accumulator`: fold lines into an [`AggregateOutput`] while reporting
//!   each event to a [`StreamObserver`].

pub mod accumulator;
pub mod event;

pub use accumulator::{
    AggregateOutput, StreamAccumulator, StreamObserver, ToolRegistry, ToolResultNotice,
    ToolUseNotice,
};
pub use event::{parse_line, ProtocolEvent, Usage, UNKNOWN_TOOL};
