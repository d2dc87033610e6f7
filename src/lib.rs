//! Wicket - passphrase-sealed SSH keys and remote terminal sessions
//!
//! Wicket keeps one SSH private key sealed at rest under a user passphrase
//! and unlocks it only for the operation that needs it: an interactive
//! terminal over the gateway's WebSocket, or an HTTP action (tmux session
//! management, host directory listing) run over the host SSH connection.
//!
//! ## Components
//!
//! - **Vault**: envelope cipher and single-record credential storage
//! - **Auth**: one resolver turning an auth method + passphrase into a key
//! - **Session**: per-session state machine and WebSocket driver
//! - **Remote**: gateway HTTP client for tmux and filesystem actions

pub mod auth;
pub mod config;
pub mod endpoint;
pub mod logging;
pub mod remote;
pub mod session;
pub mod terminal;
pub mod types;
pub mod vault;

pub use config::Args;
pub use types::{Result, WicketError};
