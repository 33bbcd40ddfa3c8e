//! Module `tracker`
//!
//! Per-session transfer bookkeeping. A `watch` channel carries the
//! "executing" flag so bounded waits wake as soon as the transfer ends,
//! and finished transfers are published on an unbounded channel the
//! connection driver drains.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use super::control::DataTransferControl;
use super::results::TransferOutcome;
use crate::error::TransferError;

pub struct TransferTracker {
    executing: watch::Sender<bool>,
    channel: Mutex<Option<AbortHandle>>,
    completions: mpsc::UnboundedSender<TransferOutcome>,
}

impl TransferTracker {
    /// Creates a tracker and the receiving end of its completion feed.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TransferOutcome>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let tracker = Self {
            executing: watch::Sender::new(false),
            channel: Mutex::new(None),
            completions,
        };
        (Arc::new(tracker), receiver)
    }

    /// Registers a running transfer task.
    pub fn start(&self, task: AbortHandle) -> Result<(), TransferError> {
        let mut slot = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        if *self.executing.borrow() {
            return Err(TransferError::AlreadyExecuting);
        }
        *slot = Some(task);
        self.executing.send_replace(true);
        Ok(())
    }

    /// Marks the running transfer finished and publishes its outcome.
    pub fn complete(&self, outcome: TransferOutcome) {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.executing.send_replace(false);
        if self.completions.send(outcome).is_err() {
            debug!("Transfer finished after its control connection went away");
        }
    }

    fn abort_running(&self) -> bool {
        let task = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.executing.send_replace(false);
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl DataTransferControl for TransferTracker {
    fn is_executing(&self) -> bool {
        *self.executing.borrow()
    }

    async fn wait_until_idle(&self, timeout: Duration) -> bool {
        let mut executing = self.executing.subscribe();
        let idle = async move {
            loop {
                let busy = *executing.borrow_and_update();
                if !busy || executing.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(timeout, idle).await.is_err()
    }

    fn clear(&self) {
        if self.abort_running() {
            debug!("Cancelled in-flight transfer");
        }
    }

    fn close_current_channel(&self) -> Result<(), TransferError> {
        if self.abort_running() {
            Ok(())
        } else {
            Err(TransferError::NoConnection)
        }
    }
}
