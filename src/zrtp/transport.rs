//! Datagram transport seam for the handshake.
//!
//! The state machine drives retransmission through blocking receives with
//! per-attempt timeouts; a zero timeout is a non-blocking poll. Socket
//! plumbing stays outside the crate.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use crate::rtp_error::RtpError;

pub trait ZrtpTransport {
    /// Sends one datagram to the peer.
    fn send(&mut self, data: &[u8]) -> Result<(), RtpError>;

    /// Receives one datagram, waiting at most `timeout`; `Duration::ZERO`
    /// polls without blocking. `Err(Timeout)` when nothing arrived.
    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, RtpError>;
}

/// In-memory duplex transport over std mpsc channels.
///
/// Backs the tests and loopback sessions; datagrams keep their boundaries
/// and their order.
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Two connected endpoints.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            ChannelTransport { tx: a_tx, rx: a_rx },
            ChannelTransport { tx: b_tx, rx: b_rx },
        )
    }
}

impl ZrtpTransport for ChannelTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), RtpError> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| RtpError::Generic("peer endpoint is gone".into()))
    }

    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, RtpError> {
        if timeout.is_zero() {
            return match self.rx.try_recv() {
                Ok(data) => Ok(data),
                Err(TryRecvError::Empty) => Err(RtpError::Timeout),
                Err(TryRecvError::Disconnected) => {
                    Err(RtpError::Generic("peer endpoint is gone".into()))
                }
            };
        }
        match self.rx.recv_timeout(timeout) {
            Ok(data) => Ok(data),
            Err(RecvTimeoutError::Timeout) => Err(RtpError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(RtpError::Generic("peer endpoint is gone".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_duplex_and_ordered() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.send(&[1]).unwrap();
        a.send(&[2, 2]).unwrap();
        b.send(&[3]).unwrap();
        assert_eq!(b.recv(Duration::from_millis(10)).unwrap(), vec![1]);
        assert_eq!(b.recv(Duration::from_millis(10)).unwrap(), vec![2, 2]);
        assert_eq!(a.recv(Duration::from_millis(10)).unwrap(), vec![3]);
    }

    #[test]
    fn empty_poll_times_out() {
        let (mut a, _b) = ChannelTransport::pair();
        assert_eq!(a.recv(Duration::ZERO), Err(RtpError::Timeout));
        assert_eq!(a.recv(Duration::from_millis(5)), Err(RtpError::Timeout));
    }
}
