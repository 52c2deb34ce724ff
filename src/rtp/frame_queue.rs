//! Outbound frame queue collaborator.
//!
//! The packetizer batches every payload of one access unit into a single
//! transaction so the transport can coalesce datagrams. The queue is a
//! single-writer resource for the duration of a transaction; transactions are
//! not reentrant.

use crate::rtp_error::RtpError;

/// Consumer of the packetizer's output.
pub trait FrameQueue {
    /// Opens a transaction for one access unit.
    fn init_transaction(&mut self) -> Result<(), RtpError>;
    /// Stages one RTP payload inside the open transaction.
    fn enqueue_message(&mut self, payload: Vec<u8>) -> Result<(), RtpError>;
    /// Commits every staged payload and closes the transaction.
    fn flush_queue(&mut self) -> Result<(), RtpError>;
    /// Abandons the open transaction, discarding staged payloads.
    fn deinit_transaction(&mut self);
}

/// In-memory queue backing the tests and loopback use.
///
/// Flushed payloads accumulate in `sent` in emission order.
#[derive(Debug, Default)]
pub struct VecFrameQueue {
    staged: Vec<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    in_transaction: bool,
}

impl VecFrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads committed so far, in emission order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Takes ownership of the committed payloads.
    pub fn drain_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl FrameQueue for VecFrameQueue {
    fn init_transaction(&mut self) -> Result<(), RtpError> {
        if self.in_transaction {
            return Err(RtpError::Generic("transaction already open".into()));
        }
        self.in_transaction = true;
        Ok(())
    }

    fn enqueue_message(&mut self, payload: Vec<u8>) -> Result<(), RtpError> {
        if !self.in_transaction {
            return Err(RtpError::Generic("no open transaction".into()));
        }
        self.staged.push(payload);
        Ok(())
    }

    fn flush_queue(&mut self) -> Result<(), RtpError> {
        if !self.in_transaction {
            return Err(RtpError::Generic("no open transaction".into()));
        }
        self.sent.append(&mut self.staged);
        self.in_transaction = false;
        Ok(())
    }

    fn deinit_transaction(&mut self) {
        self.staged.clear();
        self.in_transaction = false;
    }
}
