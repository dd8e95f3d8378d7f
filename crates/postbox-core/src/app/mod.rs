//! App - the dispatcher itself, composed from ports.
//!
//! # Components
//! - **BatchScanner**: reads up to `batch_limit` queued rows
//! - **ClaimStep**: conditional `Queued -> InFlight`
//! - **DeliveryWorker**: compose, send, record
//! - **OutcomeRecorder**: conditional `InFlight -> Delivered`
//! - **PollDriver**: the scan/claim/dispatch loop
//! - **ReaperLoop**: opt-in requeue of stale `InFlight` rows
//! - **PostboxBuilder**: wiring and startup validation

pub mod builder;
pub mod claim;
pub mod delivery;
pub mod poll_loop;
pub mod reaper_loop;
pub mod recorder;
pub mod scanner;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::builder::{Postbox, PostboxBuilder, PostboxHandle};
pub use self::claim::{ClaimOutcome, ClaimStep};
pub use self::delivery::{DeliveryReport, DeliveryWorker};
pub use self::poll_loop::{CycleReport, PollDriver, PollSettings};
pub use self::reaper_loop::ReaperLoop;
pub use self::recorder::{OutcomeRecorder, RecordOutcome};
pub use self::scanner::{BatchScanner, ScanBatch};
pub use self::status::{QueueCounts, status_counts};
