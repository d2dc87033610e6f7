//! Gateway HTTP actions that run over the host SSH connection.

pub mod client;
pub mod types;

pub use client::{RemoteSessionClient, DEFAULT_REQUEST_TIMEOUT};
pub use types::{
    DirectoryEntry, DirectoryListing, SettingValue, TmuxKillResult, TmuxSession, TmuxSessionList,
};
