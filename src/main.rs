//! Wicket - passphrase-sealed SSH keys and remote terminal sessions

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use reqwest::Url;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use wicket::{
    auth::{AuthMethod, CredentialRequest, CredentialRequirement, CredentialResolver},
    config::{Args, Command, ConnectArgs, FsCommand, KeyCommand, TmuxCommand},
    endpoint, logging,
    remote::RemoteSessionClient,
    session::{Geometry, SessionConfig, SessionGateway, SessionState, SessionUpdate, WsConnector},
    terminal::{self, RawModeGuard},
    vault::{CredentialVault, FileStore, Passphrase, SecretKey},
    WicketError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let base = endpoint::parse_base(&args.gateway_url)?;
    let store = FileStore::open(args.state_dir())
        .with_context(|| format!("Failed to open state directory {}", args.state_dir().display()))?;
    info!(path = %store.path().display(), "Using credential store");

    let vault = CredentialVault::new(Arc::new(store));
    let resolver = Arc::new(CredentialResolver::new(vault));
    let client = RemoteSessionClient::with_timeout(base.clone(), args.request_timeout());

    match &args.command {
        Command::Key(command) => key_command(command, resolver.vault()).await,
        Command::Connect(connect) => {
            connect_command(&args, connect, &base, resolver, &client).await
        }
        Command::Tmux(command) => tmux_command(&args, command, &resolver, &client).await,
        Command::Fs(command) => fs_command(&args, command, &resolver, &client).await,
    }
}

// =============================================================================
// key
// =============================================================================

async fn key_command(command: &KeyCommand, vault: &CredentialVault) -> anyhow::Result<()> {
    match command {
        KeyCommand::Save { label, file } => {
            let key = read_key_file(file).await?;
            let passphrase = prompt_passphrase("New passphrase: ").await?;
            let confirm = prompt_passphrase("Repeat passphrase: ").await?;
            if passphrase.expose() != confirm.expose() {
                bail!("Passphrases do not match");
            }

            let record = vault.save_key(label, key, passphrase).await?;
            println!("Saved key '{}' at {}", record.label, record.saved_at);
        }
        KeyCommand::Status => match vault.load_record()? {
            Some(record) => println!(
                "Stored key: '{}' (saved {})",
                record.label,
                record.saved_at
            ),
            None => println!("No key stored"),
        },
        KeyCommand::Clear => {
            vault.clear()?;
            println!("Stored key removed");
        }
    }
    Ok(())
}

// =============================================================================
// connect
// =============================================================================

async fn connect_command(
    args: &Args,
    connect: &ConnectArgs,
    base: &Url,
    resolver: Arc<CredentialResolver>,
    client: &RemoteSessionClient,
) -> anyhow::Result<()> {
    let (term_cols, term_rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let geometry = Geometry::new(
        connect.rows.unwrap_or(term_rows),
        connect.cols.unwrap_or(term_cols),
    );

    let in_memory = match &connect.key_file {
        Some(path) => Some(read_key_file(path).await?),
        None => None,
    };
    let method = auth_method(args, client).await?;
    let request = credential_request(&resolver, method, in_memory).await?;

    let config = SessionConfig::for_gateway(base, geometry)?;
    let connector = Arc::new(WsConnector::new().with_timeout(args.connect_timeout()));
    let (session, mut updates) = SessionGateway::spawn(config, connector, resolver, request);

    eprintln!("Connecting to {} (Ctrl-] to disconnect)", base);

    let raw_mode = RawModeGuard::enable()?;
    let mut events = EventStream::new();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(SessionUpdate::Output(text)) => {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.flush().await?;
                }
                Some(SessionUpdate::State(state)) if state.is_terminal() => break,
                Some(SessionUpdate::State(_)) => {}
                None => break,
            },
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if terminal::is_detach_key(&key) => {
                    session.disconnect().await;
                    break;
                }
                Some(Ok(Event::Key(key))) => {
                    if let Some(input) = terminal::key_to_input(&key) {
                        if terminal::forward_input(&session, input).is_break() {
                            break;
                        }
                    }
                }
                Some(Ok(Event::Paste(text))) => {
                    if terminal::forward_input(&session, text).is_break() {
                        break;
                    }
                }
                Some(Ok(Event::Resize(cols, rows))) => {
                    session.resize(rows, cols);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    session.disconnect().await;
                    drop(raw_mode);
                    return Err(e).context("Failed to read terminal input");
                }
                None => {
                    session.disconnect().await;
                    break;
                }
            },
        }
    }

    let state = session.closed().await;
    drop(raw_mode);

    match state {
        SessionState::Errored(failure) => Err(WicketError::from(failure).into()),
        _ => {
            eprintln!("\nConnection closed");
            Ok(())
        }
    }
}

// =============================================================================
// tmux / fs
// =============================================================================

async fn tmux_command(
    args: &Args,
    command: &TmuxCommand,
    resolver: &CredentialResolver,
    client: &RemoteSessionClient,
) -> anyhow::Result<()> {
    let method = auth_method(args, client).await?;
    let request = credential_request(resolver, method, None).await?;
    let credential = resolver.resolve(request).await?;

    match command {
        TmuxCommand::List => {
            let list = client.list_tmux_sessions(credential).await?;
            if !list.installed {
                println!("tmux is not installed on the host");
            } else if list.sessions.is_empty() {
                println!("No tmux sessions");
            } else {
                println!("{:<24} {:>8} {:>8}", "NAME", "ATTACHED", "WINDOWS");
                for session in list.sessions {
                    println!("{:<24} {:>8} {:>8}", session.name, session.attached, session.windows);
                }
            }
        }
        TmuxCommand::Kill { names } => {
            let result = client.kill_tmux_sessions(credential, names).await?;
            for name in result.killed {
                println!("Killed {name}");
            }
        }
    }
    Ok(())
}

async fn fs_command(
    args: &Args,
    command: &FsCommand,
    resolver: &CredentialResolver,
    client: &RemoteSessionClient,
) -> anyhow::Result<()> {
    let FsCommand::Ls { path } = command;

    let method = auth_method(args, client).await?;
    let request = credential_request(resolver, method, None).await?;
    let credential = resolver.resolve(request).await?;

    let listing = client.list_host_directory(credential, path.as_deref()).await?;
    println!("{}", listing.path);
    for entry in &listing.entries {
        let kind = if entry.is_dir { 'd' } else { '-' };
        let read = if entry.readable { 'r' } else { '-' };
        let write = if entry.writable { 'w' } else { '-' };
        println!("{kind}{read}{write} {}", entry.name);
    }
    if listing.truncated {
        println!("(listing truncated)");
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Configured override, else the gateway's setting.
async fn auth_method(args: &Args, client: &RemoteSessionClient) -> anyhow::Result<AuthMethod> {
    match args.auth_method {
        Some(method) => Ok(method),
        None => Ok(client.auth_method().await?),
    }
}

/// Build a resolver request, prompting for the passphrase only when the
/// stored key will actually be opened.
async fn credential_request(
    resolver: &CredentialResolver,
    method: AuthMethod,
    in_memory: Option<SecretKey>,
) -> anyhow::Result<CredentialRequest> {
    let mut request = CredentialRequest::new(method);

    match resolver.requirement(method, in_memory.is_some())? {
        CredentialRequirement::NotRequired => {}
        CredentialRequirement::InMemory => {
            if let Some(key) = in_memory {
                request = request.with_in_memory(key);
            }
        }
        CredentialRequirement::Passphrase { label } => {
            let passphrase = prompt_passphrase(&format!("Passphrase for '{label}': ")).await?;
            request = request.with_passphrase(passphrase);
        }
    }
    Ok(request)
}

async fn prompt_passphrase(prompt: &str) -> anyhow::Result<Passphrase> {
    let prompt = prompt.to_string();
    let passphrase = tokio::task::spawn_blocking(move || terminal::read_secret(&prompt))
        .await
        .context("Passphrase prompt task failed")??;
    Ok(passphrase)
}

async fn read_key_file(path: &Path) -> anyhow::Result<SecretKey> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read key file {}", path.display()))?;
    Ok(SecretKey::new(contents))
}
