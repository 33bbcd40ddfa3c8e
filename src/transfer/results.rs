//! Transfer result types
//!
//! Outcome of a finished data transfer, as reported back to the control
//! connection.

use std::fmt;

use crate::protocol::{Reply, ReplyCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Download,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Aborted,
    Failed(String),
}

/// Result of a data transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub direction: TransferDirection,
    pub path: String,
    pub bytes: u64,
    pub status: TransferStatus,
}

impl TransferOutcome {
    pub fn completed(direction: TransferDirection, path: impl Into<String>, bytes: u64) -> Self {
        Self {
            direction,
            path: path.into(),
            bytes,
            status: TransferStatus::Completed,
        }
    }

    pub fn aborted(direction: TransferDirection, path: impl Into<String>, bytes: u64) -> Self {
        Self {
            direction,
            path: path.into(),
            bytes,
            status: TransferStatus::Aborted,
        }
    }

    pub fn failed(
        direction: TransferDirection,
        path: impl Into<String>,
        bytes: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            path: path.into(),
            bytes,
            status: TransferStatus::Failed(reason.into()),
        }
    }

    /// Reply the control connection sends once the transfer ends.
    pub fn reply(&self) -> Reply {
        match &self.status {
            TransferStatus::Completed => Reply::new(
                ReplyCode::ClosingDataConnection,
                format!("Transfer complete ({} bytes)", self.bytes),
            ),
            TransferStatus::Aborted => Reply::from_code(ReplyCode::ConnectionClosedTransferAborted),
            TransferStatus::Failed(reason) => Reply::new(
                ReplyCode::ActionAbortedLocalError,
                format!("Transfer failed: {reason}"),
            ),
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            TransferDirection::Download => "download",
            TransferDirection::Upload => "upload",
        };
        write!(f, "{direction} of {} ({} bytes): ", self.path, self.bytes)?;
        match &self.status {
            TransferStatus::Completed => f.write_str("completed"),
            TransferStatus::Aborted => f.write_str("aborted"),
            TransferStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
