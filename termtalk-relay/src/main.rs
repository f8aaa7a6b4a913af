//! termtalk relay daemon.
//!
//! Serves the websocket endpoint terminal clients attach to, and ships a
//! small keygen utility so clients have a keypair to authenticate with.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use termtalk_auth::identity::{KeyKind, PrivateKey};
use tracing_subscriber::EnvFilter;

use termtalk_relay::config::RelayConfig;
use termtalk_relay::gateway::{self, RelayState};
use termtalk_relay::registry::IdentityRegistry;
use termtalk_relay::session::SessionManager;

/// termtalk relay - key-authenticated terminal chat
#[derive(Parser)]
#[command(name = "termtalk-relay", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server (default if no command given)
    Serve,

    /// Generate a client keypair as PEM files
    Keygen {
        /// Key algorithm
        #[arg(long, value_enum, default_value = "ed25519")]
        algorithm: KeyAlgorithm,

        /// Private key output path; the public key lands beside it as
        /// `<path>.pub`
        #[arg(long, default_value = "termtalk_key.pem")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyAlgorithm {
    Ed25519,
    Rsa,
}

impl From<KeyAlgorithm> for KeyKind {
    fn from(value: KeyAlgorithm) -> Self {
        match value {
            KeyAlgorithm::Ed25519 => KeyKind::Ed25519,
            KeyAlgorithm::Rsa => KeyKind::Rsa,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Keygen { algorithm, out }) => cmd_keygen(algorithm, &out),
        Some(Commands::Serve) | None => cmd_serve().await,
    }
}

/// Generate a keypair for a terminal client.
fn cmd_keygen(algorithm: KeyAlgorithm, out: &Path) -> anyhow::Result<()> {
    let key = PrivateKey::generate(algorithm.into());

    std::fs::write(out, key.to_pem().as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(out, std::fs::Permissions::from_mode(0o600))?;
    }

    let public = key.public_key();
    let mut public_path = out.as_os_str().to_owned();
    public_path.push(".pub");
    let public_path = PathBuf::from(public_path);
    std::fs::write(&public_path, public.to_pem())?;

    println!("Private key: {}", out.display());
    println!("Public key:  {}", public_path.display());
    println!("Fingerprint: {}", public.fingerprint());
    Ok(())
}

/// Start the relay server.
async fn cmd_serve() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env()?;

    tracing::info!(path = %config.database_path, "Opening identity registry");
    let registry = Arc::new(IdentityRegistry::open(&config.database_path).await?);

    let sessions = SessionManager::new(registry, config.challenge_ttl_seconds);
    let state = Arc::new(RelayState::new(sessions, config.clone()));

    let addr: std::net::SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, ttl = config.challenge_ttl_seconds, "termtalk relay listening");
    tracing::info!("WebSocket endpoint: ws://{}/ws", addr);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received, draining connections");
    };

    axum::serve(listener, gateway::router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Relay shutdown complete");
    Ok(())
}
