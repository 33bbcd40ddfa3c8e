//! Transfer module
//!
//! Tracks whether a data transfer is running on a session and reports
//! finished transfers back to the control connection.

pub mod control;
pub mod results;
pub mod tracker;

pub use control::DataTransferControl;
pub use results::{TransferDirection, TransferOutcome, TransferStatus};
pub use tracker::TransferTracker;
