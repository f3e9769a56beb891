//! Client connection lifecycle: request → handshake → connected.
//!
//! The session owns the header bookkeeping for outbound packets (packet
//! counter, session tag, client id) and validates the tag on inbound ones.
//! Handshake rejection is a recoverable outcome surfaced as an event, not an
//! error.

use terracast_protocol::codec::{PROTOCOL_VERSION, Packet};
use terracast_protocol::packets::{
    ConnectionHandshake, ConnectionRequest, HandshakeAccepted, Payload, Ping,
};

/// Lifecycle of the client's server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSessionState {
    /// No connection attempt in progress.
    Disconnected,
    /// Request sent, waiting for the server's handshake.
    AwaitingHandshake,
    /// Handshake accepted; gameplay traffic flows.
    Connected,
}

/// Client-side connection state and outbound header bookkeeping.
#[derive(Debug)]
pub struct ClientSession {
    state: ClientSessionState,
    /// Assigned by the handshake; `0` before.
    client_id: u16,
    /// Random tag assigned by the handshake; echoed in every header.
    session_tag: u32,
    /// Monotonic outbound packet counter.
    packet_counter: u32,
    /// Handshake parameters, present once connected.
    params: Option<HandshakeAccepted>,
}

impl ClientSession {
    /// Creates a disconnected session.
    pub fn new() -> Self {
        Self {
            state: ClientSessionState::Disconnected,
            client_id: 0,
            session_tag: 0,
            packet_counter: 0,
            params: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientSessionState {
        self.state
    }

    /// Assigned client id (`0` before handshake).
    pub fn client_id(&self) -> u16 {
        self.client_id
    }

    /// Handshake parameters, once connected.
    pub fn params(&self) -> Option<&HandshakeAccepted> {
        self.params.as_ref()
    }

    /// Builds the join request and moves to `AwaitingHandshake`.
    pub fn request_connection(&mut self, player_name: &str, tick: u64) -> Packet {
        self.state = ClientSessionState::AwaitingHandshake;
        self.make_packet(
            Payload::ConnectionRequest(ConnectionRequest {
                player_name: player_name.to_owned(),
                protocol_version: PROTOCOL_VERSION,
            }),
            tick,
        )
    }

    /// Processes the server's handshake. Returns the accepted parameters, or
    /// `None` on rejection (the session returns to `Disconnected`).
    pub fn handle_handshake(&mut self, handshake: &ConnectionHandshake) -> Option<&HandshakeAccepted> {
        match handshake {
            ConnectionHandshake::Accepted(accepted) => {
                self.state = ClientSessionState::Connected;
                self.client_id = accepted.client_id;
                self.session_tag = accepted.session_tag;
                self.params = Some(accepted.clone());
                tracing::info!(
                    "connected as client {} (session tag {:#x})",
                    accepted.client_id,
                    accepted.session_tag
                );
                self.params.as_ref()
            }
            ConnectionHandshake::Rejected { reason } => {
                tracing::warn!("connection rejected: {reason}");
                self.state = ClientSessionState::Disconnected;
                None
            }
        }
    }

    /// Returns `true` if an inbound header carries this session's tag.
    /// Untagged handshake-phase packets (tag `0`) are accepted only before
    /// the handshake completes.
    pub fn accepts_tag(&self, session_tag: u32) -> bool {
        match self.state {
            ClientSessionState::Connected => session_tag == self.session_tag,
            _ => session_tag == 0,
        }
    }

    /// Builds an echo for a server ping.
    pub fn echo_ping(&mut self, ping: Ping, tick: u64) -> Packet {
        self.make_packet(Payload::Ping(ping), tick)
    }

    /// Builds the voluntary disconnect notice and leaves the session.
    pub fn disconnect(&mut self, tick: u64) -> Packet {
        let packet = self.make_packet(Payload::ClientDisconnect, tick);
        self.state = ClientSessionState::Disconnected;
        self.client_id = 0;
        self.session_tag = 0;
        self.params = None;
        packet
    }

    /// Wraps a payload with this session's header fields.
    pub fn make_packet(&mut self, payload: Payload, tick: u64) -> Packet {
        self.packet_counter += 1;
        Packet::new(
            payload,
            tick,
            self.packet_counter,
            self.session_tag,
            self.client_id,
        )
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use terracast_protocol::header::PacketKind;
    use terracast_protocol::player::PlayerClaim;

    fn accepted() -> ConnectionHandshake {
        ConnectionHandshake::Accepted(HandshakeAccepted {
            client_id: 4,
            session_tag: 0xAA55,
            tick: 100,
            tick_rate: 60,
            command_interval_ticks: 3,
            snapshot_interval_ticks: 6,
            loaded_chunk_count: 17,
            spawn: PlayerClaim::at_spawn(Vec3::ZERO),
            roster: Vec::new(),
        })
    }

    #[test]
    fn test_request_moves_to_awaiting() {
        let mut session = ClientSession::new();
        let packet = session.request_connection("ada", 1);
        assert_eq!(session.state(), ClientSessionState::AwaitingHandshake);
        assert_eq!(packet.header.kind, PacketKind::ConnectionRequest);
        assert_eq!(packet.header.session_tag, 0);
    }

    #[test]
    fn test_accepted_handshake_connects() {
        let mut session = ClientSession::new();
        session.request_connection("ada", 1);
        let params = session.handle_handshake(&accepted()).unwrap();
        assert_eq!(params.loaded_chunk_count, 17);
        assert_eq!(session.state(), ClientSessionState::Connected);
        assert_eq!(session.client_id(), 4);

        let packet = session.make_packet(Payload::ClientDisconnect, 5);
        assert_eq!(packet.header.session_tag, 0xAA55);
        assert_eq!(packet.header.client_id, 4);
    }

    #[test]
    fn test_rejected_handshake_is_recoverable() {
        let mut session = ClientSession::new();
        session.request_connection("ada", 1);
        let outcome = session.handle_handshake(&ConnectionHandshake::Rejected {
            reason: "server full".into(),
        });
        assert!(outcome.is_none());
        assert_eq!(session.state(), ClientSessionState::Disconnected);
    }

    #[test]
    fn test_tag_validation() {
        let mut session = ClientSession::new();
        session.request_connection("ada", 1);
        assert!(session.accepts_tag(0));
        session.handle_handshake(&accepted());
        assert!(session.accepts_tag(0xAA55));
        assert!(!session.accepts_tag(0));
        assert!(!session.accepts_tag(0xBEEF));
    }

    #[test]
    fn test_packet_counter_increments() {
        let mut session = ClientSession::new();
        let a = session.make_packet(Payload::ClientDisconnect, 1);
        let b = session.make_packet(Payload::ClientDisconnect, 2);
        assert_eq!(b.header.packet_counter, a.header.packet_counter + 1);
    }
}
