//! PCVC protocol - newline-delimited JSON over TCP.
//!
//! On connect the server pushes its full mixer state. The client then sends
//! sparse update documents, each answered with the new full state. Any
//! protocol violation closes the connection.

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod server;

pub use client::{ClientConfig, MixerClient};
pub use codec::{DEFAULT_MAX_FRAME_BYTES, JsonLineCodec};
pub use connection::{Connection, ConnectionState};
pub use error::{FramingError, ProtocolError, ProtocolResult};
pub use server::{ProtocolServer, ServerConfig};

/// Port the server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3000;
