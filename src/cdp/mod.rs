//! CDP transport layer: one WebSocket per connection, a multiplexer
//! correlating commands with replies by id, and an event router fanning
//! unsolicited events out to subscribers.

mod client;
mod error;
mod events;
mod transport;
mod types;

pub use client::{Connection, ConnectionConfig};
pub use error::CdpError;
pub use events::EventRouter;
pub use transport::ReconnectConfig;
pub use types::{Command, CommandFrame, Event, Incoming, ProtocolError, RawMessage, Reply};
