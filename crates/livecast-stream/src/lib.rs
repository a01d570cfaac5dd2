//! Stream loop coordinator for Livecast.
//!
//! A single [`Coordinator`] task runs generation cycles back to back:
//!
//! ```text
//! IDLE → SELECTING → GENERATING_SCRIPT → GENERATING_AUDIO → PUBLISHING → SELECTING …
//!                          any state → DRAINING → STOPPED   (on shutdown)
//! ```
//!
//! Each cycle takes at most one interrupt from the queue, asks the script
//! generator for a line (falling back to filler), synthesizes it, and appends
//! the chunk under the next sequence number. Generation failures never stop
//! the loop. The coordinator owns the narration history and the sequence
//! counter outright; other tasks reach it only through the interrupt queue,
//! the chunk store, and the read-only status and event channels.

mod coordinator;
mod filler;
mod history;

pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorDeps, CoordinatorStatus, CycleOutcome,
};
pub use filler::FillerLines;
pub use history::NarrationHistory;
