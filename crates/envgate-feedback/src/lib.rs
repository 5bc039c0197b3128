//! # envgate-feedback
//!
//! Durable outcome journal, statistics, and reports for envgate.
//!
//! Every validation an agent performs (and, when it executes the action,
//! the result) is recorded as an [`Outcome`] in a per-agent JSONL journal.
//! The [`FeedbackTracker`] facade records outcomes and derives
//! [`FeedbackStats`] and text reports from whatever the journal holds,
//! including records written by earlier runs.
//!
//! ## Key invariants
//!
//! - **One writer per journal**: appends are serialized through a single
//!   lock; sequence numbers are strictly increasing in file order and
//!   continue across reopen.
//! - **Committed means complete**: a trailing line without its newline is a
//!   crash fragment and is never counted.
//! - **Failed means absent**: an append that returns an error is never
//!   written to the journal by a later append.
//! - **Fresh stats**: statistics are recomputed on every call, never cached.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use envgate_feedback::FeedbackTracker;
//!
//! let tracker = FeedbackTracker::open("agent-1", "dev", "data/feedback").unwrap();
//! tracker
//!     .record_success("command_validation", "git status", "git", Duration::ZERO, serde_json::Value::Null)
//!     .unwrap();
//! println!("{}", tracker.generate_report().unwrap());
//! tracker.close().unwrap();
//! ```

pub mod error;
pub mod outcome;
pub mod report;
pub mod stats;
pub mod store;
pub mod tracker;

pub use error::FeedbackError;
pub use outcome::{task_types, Outcome, OutcomeResult};
pub use report::ReportGenerator;
pub use stats::{FeedbackStats, PatternCount, StatsAggregator};
pub use store::{FeedbackStore, Snapshot, StoreOptions};
pub use tracker::FeedbackTracker;
