pub mod connection;
pub mod peer;

pub use connection::{ConnectionManager, Connector, UnixConnector};
pub use peer::PeerSession;
