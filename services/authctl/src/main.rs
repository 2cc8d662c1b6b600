//! authctl
//!
//! Command-line client for an API that authenticates with short-lived bearer
//! tokens. Credentials are persisted in a local file; a 401 triggers one
//! shared reissue and the request is replayed. When the reissue fails the
//! stored session is wiped and a forced logout is reported.

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use session_client::{AuthClient, CredentialPair, FileStore, SessionEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Logs go to stderr; stdout carries response bodies.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = Cli::parse(&args)?;

    let config_path = Config::resolve_path(cli.config_path.as_deref());
    debug!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        refresh_path = %config.refresh.path,
        store = %config.store.path.display(),
        exempt = config.exempt.patterns.len(),
        "configuration loaded"
    );

    let store = FileStore::load(config.store.path.clone())
        .await
        .with_context(|| format!("failed to open credential store {}", config.store.path.display()))?;
    let client = AuthClient::new(config.client_config(), Arc::new(store))
        .context("failed to build API client")?;
    let mut signal = client.subscribe();

    let outcome = run(&client, cli.command).await;
    report_forced_logout(&mut signal);
    outcome
}

async fn run(client: &AuthClient, command: Command) -> Result<()> {
    match command {
        Command::Login { access, refresh } => {
            client.login(CredentialPair::new(access, refresh)).await?;
            println!("signed in");
        }
        Command::Logout => {
            client.logout().await?;
            println!("signed out");
        }
        Command::Status => {
            let signed_in = client.tokens().credential_pair().await?.is_some();
            let identity = client.tokens().user_identity().await?;
            match (signed_in, identity) {
                (true, Some(user)) => println!("signed in as {user}"),
                (true, None) => println!("signed in"),
                (false, _) => println!("signed out"),
            }
        }
        Command::Get { path } => {
            let response = client.send(client.get(&path)).await?;
            print_response(response).await?;
        }
        Command::Post { path, body } => {
            let mut request = client.post(&path);
            if let Some(raw) = body {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).context("request body is not valid JSON")?;
                request = request.json(&value)?;
            }
            let response = client.send(request).await?;
            print_response(response).await?;
        }
    }
    Ok(())
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context("failed to read response body")?;
    println!("{}", status.as_u16());
    if !body.is_empty() {
        println!("{body}");
    }
    Ok(())
}

fn report_forced_logout(signal: &mut broadcast::Receiver<SessionEvent>) {
    if let Ok(SessionEvent::ForcedLogout) = signal.try_recv() {
        warn!("session invalidated by failed credential refresh");
        eprintln!("session expired: signed out, run `authctl login` again");
    }
}
