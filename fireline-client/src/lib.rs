//! Responder client library: the reliable sender (C5), the snapshot
//! applier (C6), and the reconnecting transport adapter (C7).

pub mod applier;
pub mod config;
pub mod msgid;
pub mod sender;
pub mod transport;

pub use applier::{ObservedState, Status};
pub use config::ClientConfig;
pub use sender::Sender;
pub use transport::{connect, ClientHandle, ConnectConfig, Event};
