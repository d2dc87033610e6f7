//! Gateway URL construction
//!
//! The gateway base URL may carry a path prefix (e.g. `https://host/api`);
//! endpoint paths are appended to it rather than replacing it.

use reqwest::Url;

use crate::types::{Result, WicketError};

/// Terminal WebSocket path under the gateway base.
pub const TERMINAL_WS_PATH: &str = "/terminal/ws";

/// Parse and check a gateway base URL. Only `http` and `https` are accepted.
pub fn parse_base(base: &str) -> Result<Url> {
    let url = Url::parse(base)
        .map_err(|e| WicketError::Config(format!("Invalid gateway URL '{base}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WicketError::Config(format!(
            "Unsupported gateway URL scheme '{other}' (expected http or https)"
        ))),
    }
}

/// Append `path` to the base URL's path, dropping any query or fragment.
pub fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// WebSocket URL for terminal sessions: `ws` for `http`, `wss` for `https`.
pub fn terminal_ws_url(base: &Url) -> Result<Url> {
    let mut url = join(base, TERMINAL_WS_PATH);
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(WicketError::Config(format!(
                "Unsupported gateway URL scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| WicketError::Config(format!("Cannot use scheme '{scheme}' for {base}")))?;
    Ok(url)
}
