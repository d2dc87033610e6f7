//! Configuration for Wicket
//!
//! CLI arguments and environment variable handling using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::auth::AuthMethod;
use crate::endpoint;

/// Wicket - passphrase-sealed SSH keys and remote terminal sessions
#[derive(Parser, Debug, Clone)]
#[command(name = "wicket")]
#[command(about = "Unlock a stored SSH key and open terminal sessions through a gateway")]
pub struct Args {
    /// Gateway base URL (http or https)
    #[arg(long, env = "WICKET_GATEWAY_URL", default_value = "http://localhost:8000", global = true)]
    pub gateway_url: String,

    /// Directory holding the sealed key store (default: $HOME/.wicket)
    #[arg(long, env = "WICKET_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// SSH auth method override; asked from the gateway when unset
    #[arg(long, env = "WICKET_AUTH_METHOD", value_enum, global = true)]
    pub auth_method: Option<AuthMethod>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// WebSocket connect timeout in milliseconds
    #[arg(long, env = "WICKET_CONNECT_TIMEOUT_MS", default_value = "10000", global = true)]
    pub connect_timeout_ms: u64,

    /// HTTP request timeout in milliseconds
    #[arg(long, env = "WICKET_REQUEST_TIMEOUT_MS", default_value = "30000", global = true)]
    pub request_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage the stored SSH key
    #[command(subcommand)]
    Key(KeyCommand),

    /// Open an interactive terminal session (Ctrl-] to disconnect)
    Connect(ConnectArgs),

    /// Manage tmux sessions on the host
    #[command(subcommand)]
    Tmux(TmuxCommand),

    /// Browse the host filesystem
    #[command(subcommand)]
    Fs(FsCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum KeyCommand {
    /// Seal a private key with a passphrase and store it
    Save {
        /// Display label for the key
        #[arg(long)]
        label: String,
        /// Path to the private key file
        #[arg(long)]
        file: PathBuf,
    },
    /// Show whether a key is stored
    Status,
    /// Delete the stored key
    Clear,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ConnectArgs {
    /// Terminal rows (default: current terminal size)
    #[arg(long)]
    pub rows: Option<u16>,

    /// Terminal columns (default: current terminal size)
    #[arg(long)]
    pub cols: Option<u16>,

    /// Use this private key file for the session without storing it
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TmuxCommand {
    /// List tmux sessions
    List,
    /// Kill one or more tmux sessions
    Kill {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FsCommand {
    /// List a directory (default: the gateway's root)
    Ls { path: Option<String> },
}

impl Args {
    /// Effective state directory.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".wicket"),
            None => PathBuf::from(".wicket"),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        endpoint::parse_base(&self.gateway_url).map_err(|e| e.to_string())?;

        if self.connect_timeout_ms == 0 {
            return Err("WICKET_CONNECT_TIMEOUT_MS must be greater than 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("WICKET_REQUEST_TIMEOUT_MS must be greater than 0".to_string());
        }

        if let Command::Connect(connect) = &self.command {
            if connect.rows == Some(0) || connect.cols == Some(0) {
                return Err("--rows and --cols must be greater than 0".to_string());
            }
        }

        Ok(())
    }
}
