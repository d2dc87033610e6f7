//! Gateway HTTP request and reply shapes.

use serde::{Deserialize, Serialize};

use crate::types::WicketError;

// =============================================================================
// Reply envelope
// =============================================================================

/// `{"status":"success", ...payload}` or `{"status":"error","code","message"}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum Reply<T> {
    Success(T),
    Error {
        #[serde(default = "default_error_code")]
        code: String,
        #[serde(default)]
        message: String,
    },
}

fn default_error_code() -> String {
    "remote_error".to_string()
}

impl<T> Reply<T> {
    pub(crate) fn into_result(self) -> Result<T, WicketError> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Error { code, message } => Err(WicketError::Remote { code, message }),
        }
    }
}

/// `GET /settings/{key}` reply. Not wrapped in the status envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingValue {
    pub key: String,
    pub value: String,
}

// =============================================================================
// tmux
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct TmuxListRequest<'a> {
    #[serde(rename = "privateKey")]
    pub private_key: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TmuxKillRequest<'a> {
    #[serde(rename = "privateKey")]
    pub private_key: Option<&'a str>,
    pub session_names: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TmuxSession {
    pub name: String,
    #[serde(default)]
    pub attached: u32,
    #[serde(default)]
    pub windows: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TmuxSessionList {
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub sessions: Vec<TmuxSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TmuxKillResult {
    #[serde(default)]
    pub killed: Vec<String>,
}

// =============================================================================
// Host filesystem
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct HostListRequest<'a> {
    pub path: Option<&'a str>,
    #[serde(rename = "privateKey")]
    pub private_key: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(default)]
    pub readable: bool,
    #[serde(default)]
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryListing {
    pub path: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub entries: Vec<DirectoryEntry>,
    /// Server capped the entry count.
    #[serde(default)]
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_reply_unwraps_payload() {
        let reply: Reply<TmuxSessionList> = serde_json::from_str(
            r#"{"status":"success","installed":true,"sessions":[{"name":"lyra_a","attached":1,"windows":2}]}"#,
        )
        .unwrap();

        let list = reply.into_result().unwrap();
        assert!(list.installed);
        assert_eq!(
            list.sessions,
            vec![TmuxSession {
                name: "lyra_a".into(),
                attached: 1,
                windows: 2
            }]
        );
    }

    #[test]
    fn test_error_reply_becomes_remote_error() {
        let reply: Reply<TmuxKillResult> = serde_json::from_str(
            r#"{"status":"error","code":"tmux_not_installed","message":"tmux is not installed on the host"}"#,
        )
        .unwrap();

        match reply.into_result() {
            Err(WicketError::Remote { code, message }) => {
                assert_eq!(code, "tmux_not_installed");
                assert_eq!(message, "tmux is not installed on the host");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_private_key_field_name() {
        let body = serde_json::to_value(TmuxKillRequest {
            private_key: None,
            session_names: &["a".to_string()],
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"privateKey": null, "session_names": ["a"]})
        );
    }
}
