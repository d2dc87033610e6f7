//! Interactive terminal sessions over the gateway's WebSocket
//!
//! # Architecture
//!
//! - `protocol`: INIT / RESIZE / input frame encoding, UTF-8 stream decoding
//! - `state`: pure lifecycle state machine
//! - `transport`: `Connector` / `Transport` traits and the WebSocket impl
//! - `gateway`: per-session driver task and its handle

pub mod gateway;
pub mod protocol;
pub mod state;
pub mod transport;

pub use gateway::{SessionConfig, SessionGateway, SessionHandle, SessionUpdate};
pub use protocol::{Geometry, InboundFrame, Utf8StreamDecoder};
pub use state::{transition, Effect, SessionEvent, SessionFailure, SessionState, Transition};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
