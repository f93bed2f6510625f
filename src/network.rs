//! Peer-to-peer transport: wire messages, frame codec and outbound connections

pub mod peer;
pub mod protocol;

pub use peer::PeerConnection;
pub use protocol::*;
