//! Data transfer control contract
//!
//! What the control engine needs to know about the session's data channel.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransferError;

#[async_trait]
pub trait DataTransferControl: Send + Sync {
    /// Whether a bulk transfer is in flight right now.
    fn is_executing(&self) -> bool;

    /// Waits at most `timeout` for the in-flight transfer to end.
    ///
    /// Returns `true` if a transfer is still executing when the wait gives up.
    async fn wait_until_idle(&self, timeout: Duration) -> bool;

    /// Drops pending transfer bookkeeping, cancelling any running transfer.
    fn clear(&self);

    /// Closes the current data channel. Fails with
    /// [`TransferError::NoConnection`] when there is none.
    fn close_current_channel(&self) -> Result<(), TransferError>;
}
