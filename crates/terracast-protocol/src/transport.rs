//! Datagram transport seam.
//!
//! The socket itself is an external collaborator: both peers only require
//! non-blocking send/receive of whole datagrams, expressed by
//! [`DatagramTransport`]. The in-memory [`LoopbackTransport`] pair backs the
//! crate's own tests and lets a client and server run in one process.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::rc::Rc;

use crate::codec::MAX_DATAGRAM_BYTES;

/// Errors raised by transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The payload exceeds one datagram.
    #[error("payload of {size} bytes exceeds datagram limit {MAX_DATAGRAM_BYTES}")]
    PayloadTooLarge {
        /// Payload size in bytes.
        size: usize,
    },
    /// The peer endpoint is gone.
    #[error("transport closed")]
    Closed,
}

/// Non-blocking, connectionless datagram endpoint.
///
/// Implementations must never block: `try_recv` returns `None` when no
/// datagram is pending, and `send_to` is fire-and-forget (loss is expected
/// and handled by the protocol, not the transport).
pub trait DatagramTransport {
    /// Sends one datagram to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PayloadTooLarge`] for oversized payloads or
    /// [`TransportError::Closed`] if the endpoint is gone.
    fn send_to(&mut self, addr: SocketAddr, payload: &[u8]) -> Result<(), TransportError>;

    /// Receives one pending datagram, if any, with its sender address.
    fn try_recv(&mut self) -> Option<(SocketAddr, Vec<u8>)>;
}

// ---------------------------------------------------------------------------
// LoopbackTransport
// ---------------------------------------------------------------------------

type Queue = Rc<RefCell<VecDeque<(SocketAddr, Vec<u8>)>>>;

/// One end of an in-memory datagram pair.
pub struct LoopbackTransport {
    addr: SocketAddr,
    /// Datagrams sent by the peer, awaiting `try_recv`.
    inbox: Queue,
    /// The peer's inbox.
    outbox: Queue,
}

impl LoopbackTransport {
    /// Creates a connected pair of endpoints with distinct synthetic
    /// addresses.
    pub fn pair() -> (Self, Self) {
        let a_inbox: Queue = Rc::default();
        let b_inbox: Queue = Rc::default();
        let a_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 40_001));
        let b_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 40_002));
        (
            Self {
                addr: a_addr,
                inbox: a_inbox.clone(),
                outbox: b_inbox.clone(),
            },
            Self {
                addr: b_addr,
                inbox: b_inbox,
                outbox: a_inbox,
            },
        )
    }

    /// This endpoint's synthetic address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of datagrams waiting in this endpoint's inbox.
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }
}

impl DatagramTransport for LoopbackTransport {
    fn send_to(&mut self, _addr: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_DATAGRAM_BYTES {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
            });
        }
        self.outbox
            .borrow_mut()
            .push_back((self.addr, payload.to_vec()));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<(SocketAddr, Vec<u8>)> {
        self.inbox.borrow_mut().pop_front()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagrams_cross_the_pair() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.send_to(b.local_addr(), b"hello").unwrap();

        let (from, data) = b.try_recv().unwrap();
        assert_eq!(from, a.local_addr());
        assert_eq!(data, b"hello");
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn test_recv_is_non_blocking() {
        let (mut a, _b) = LoopbackTransport::pair();
        assert!(a.try_recv().is_none());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let (mut a, b) = LoopbackTransport::pair();
        let big = vec![0u8; MAX_DATAGRAM_BYTES + 1];
        let result = a.send_to(b.local_addr(), &big);
        assert!(matches!(
            result,
            Err(TransportError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_order_preserved_within_pair() {
        let (mut a, mut b) = LoopbackTransport::pair();
        for i in 0..3u8 {
            a.send_to(b.local_addr(), &[i]).unwrap();
        }
        for i in 0..3u8 {
            assert_eq!(b.try_recv().unwrap().1, vec![i]);
        }
    }
}
