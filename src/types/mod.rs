//! Shared types for Wicket

pub mod error;

pub use error::{Result, WicketError};
