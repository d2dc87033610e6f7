//! Remote Session Client
//!
//! HTTP calls to the gateway that need the same SSH credential as a terminal
//! session: tmux session management and host directory browsing. Every call
//! takes a [`ResolvedCredential`] by value, so key material is used for one
//! request and dropped.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::types::{
    DirectoryListing, HostListRequest, Reply, SettingValue, TmuxKillRequest, TmuxKillResult,
    TmuxListRequest, TmuxSessionList,
};
use crate::auth::{AuthMethod, ResolvedCredential};
use crate::endpoint;
use crate::types::{Result, WicketError};

/// Default timeout for gateway HTTP requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const AUTH_METHOD_PATH: &str = "/settings/ssh_auth_method";
const TMUX_SESSIONS_PATH: &str = "/terminal/tmux/sessions";
const TMUX_KILL_PATH: &str = "/terminal/tmux/kill";
const HOST_LIST_PATH: &str = "/filesystem/host/list";

pub struct RemoteSessionClient {
    base: Url,
    http_client: reqwest::Client,
}

impl RemoteSessionClient {
    pub fn new(base: Url) -> Self {
        Self::with_timeout(base, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base: Url, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wicket/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self { base, http_client }
    }

    /// The gateway's configured SSH auth method.
    ///
    /// An unset setting (404) means the server default, `password`.
    pub async fn auth_method(&self) -> Result<AuthMethod> {
        let url = endpoint::join(&self.base, AUTH_METHOD_PATH);
        debug!(url = %url, "Fetching SSH auth method");

        let response = self.http_client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(AuthMethod::default());
        }

        let setting: SettingValue = response.error_for_status()?.json().await?;
        setting.value.parse()
    }

    pub async fn list_tmux_sessions(
        &self,
        credential: ResolvedCredential,
    ) -> Result<TmuxSessionList> {
        let body = TmuxListRequest {
            private_key: credential.private_key(),
        };
        let list: TmuxSessionList = self.post(TMUX_SESSIONS_PATH, &body).await?;

        debug!(
            installed = list.installed,
            count = list.sessions.len(),
            "Listed tmux sessions"
        );
        Ok(list)
    }

    /// Kill the named tmux sessions. An empty list is rejected without a
    /// request.
    pub async fn kill_tmux_sessions(
        &self,
        credential: ResolvedCredential,
        names: &[String],
    ) -> Result<TmuxKillResult> {
        if names.is_empty() {
            return Err(WicketError::InvalidInput(
                "At least one session name is required".into(),
            ));
        }

        let body = TmuxKillRequest {
            private_key: credential.private_key(),
            session_names: names,
        };
        let result: TmuxKillResult = self.post(TMUX_KILL_PATH, &body).await?;

        info!(killed = result.killed.len(), "Killed tmux sessions");
        Ok(result)
    }

    /// List a directory on the host. `None` lists the server's default root.
    pub async fn list_host_directory(
        &self,
        credential: ResolvedCredential,
        path: Option<&str>,
    ) -> Result<DirectoryListing> {
        let body = HostListRequest {
            path,
            private_key: credential.private_key(),
        };
        self.post(HOST_LIST_PATH, &body).await
    }

    /// POST a JSON body and unwrap the status envelope. Bodies may carry key
    /// material and are never logged.
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = endpoint::join(&self.base, path);
        debug!(url = %url, "POST");

        let response = self.http_client.post(url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<Reply<T>>(&bytes) {
            Ok(reply) => reply.into_result(),
            Err(_) if !status.is_success() => {
                Err(WicketError::Http(format!("{path} returned {status}")))
            }
            Err(e) => Err(WicketError::Internal(format!(
                "Unexpected reply from {path}: {e}"
            ))),
        }
    }
}
