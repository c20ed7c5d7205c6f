// CLI entry point for the Rookery game server.
//
// Loads an optional JSON config, applies flag overrides, seeds the in-memory
// identity service and game directory from it, and serves until killed.
// See `server.rs` for the networking architecture and `dispatcher.rs` for
// command handling.
//
// Logging goes through `env_logger`; set `RUST_LOG=debug` for per-command
// traces.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;
use rookery_server::{
    MemoryGameDirectory, MemoryIdentityService, ServerConfig, Services, provision, start_server,
};

#[derive(Parser, Debug)]
#[command(name = "rookery-server", about = "Two-player game server with observers")]
struct Args {
    /// JSON config file (accounts, games, timeouts)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port; overrides the config file (0 picks a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Bind address; overrides the config file
    #[arg(long)]
    bind: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let identity = Arc::new(MemoryIdentityService::new());
    let directory = Arc::new(MemoryGameDirectory::new());
    let games = provision(&config, &identity, &directory).context("provisioning games")?;
    info!(
        "{} account(s), {} game(s) provisioned",
        config.accounts.len(),
        games.len()
    );

    let (handle, addr) = start_server(
        &config,
        Services {
            identity,
            directory,
        },
    )
    .with_context(|| format!("binding {}", config.listen_addr()))?;
    println!("Rookery server listening on {addr}");

    handle.wait();
    Ok(())
}
