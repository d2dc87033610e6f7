//! Terminal wire protocol
//!
//! Frames exchanged with the gateway's `/terminal/ws` endpoint:
//!
//! - First outbound frame: `{"type":"INIT","privateKey":"...","rows":R,"cols":C}`
//! - Then raw input text, or the control string `RESIZE:<rows>,<cols>`
//! - Inbound text or binary frames carry the same character stream

use serde::{Deserialize, Serialize};

use crate::types::{Result, WicketError};

/// Prefix of the out-of-band resize control string.
pub const RESIZE_PREFIX: &str = "RESIZE:";

/// Handshake message type tag.
pub const INIT_TYPE: &str = "INIT";

// =============================================================================
// Geometry
// =============================================================================

/// Visible terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

impl Geometry {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// A zero dimension is never sent to the remote PTY.
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

// =============================================================================
// Outbound frames
// =============================================================================

/// Encode the handshake frame.
pub fn encode_init(private_key: &str, geometry: Geometry) -> Result<String> {
    #[derive(Serialize)]
    struct InitRef<'a> {
        #[serde(rename = "type")]
        kind: &'a str,
        #[serde(rename = "privateKey")]
        private_key: &'a str,
        rows: u16,
        cols: u16,
    }

    serde_json::to_string(&InitRef {
        kind: INIT_TYPE,
        private_key,
        rows: geometry.rows,
        cols: geometry.cols,
    })
    .map_err(|_| WicketError::Internal("Failed to encode handshake".into()))
}

/// Encode the resize control string.
pub fn encode_resize(geometry: Geometry) -> String {
    format!("{RESIZE_PREFIX}{},{}", geometry.rows, geometry.cols)
}

// =============================================================================
// Inbound frames
// =============================================================================

/// Gateway-to-client frame as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    /// Remote end sent a close frame.
    Close,
}

/// Incremental UTF-8 decoder for binary output frames.
///
/// A multi-byte character split across two frames is held back until its
/// remaining bytes arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning all text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        out.push_str(text);
                    }

                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete tail; wait for the next frame.
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}
