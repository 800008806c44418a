//! dungeon-world-server binary
//!
//! Starts the gameplay kernel behind a WebSocket gateway.
//!
//! ## Configuration (env / TOML via `config` crate, CLI overlays both)
//!
//! | Key                          | Default       | Description                         |
//! |-------------------------------|--------------|--------------------------------------|
//! | `DUNGEON_WORLD_LISTEN_ADDR`    | `0.0.0.0:8080` | Listen address                     |
//! | `DUNGEON_WORLD_WS_PATH`        | `/ws`          | WebSocket route                    |
//! | `DUNGEON_WORLD_ALLOWED_ORIGINS`| `*`            | Comma-separated allowed origins    |
//! | `DUNGEON_WORLD_MOVE_COOLDOWN_MS` | `500`        | Move cooldown (ms)                 |
//! | `DUNGEON_WORLD_TURN_COOLDOWN_MS` | `150`        | Turn cooldown (ms)                 |
//! | `DUNGEON_WORLD_WORLD_SEED_OVERRIDE` | unset     | Force a world seed                 |
//! | `DUNGEON_WORLD_GENERATOR_VERSION` | `maze`       | `maze` or `bsp_v4`                 |

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dungeon_world::config::WorldConfig;
use dungeon_world::discovery::InMemoryDiscoveryStore;
use dungeon_world::gateway::{router, AppState, GatewayMetrics};
use dungeon_world::storage::{InMemoryCharacterStore, InMemorySessionStore, InMemoryWorldRecordStore};
use dungeon_world::time::SystemClock;
use parking_lot::Mutex;

#[derive(Parser, Debug)]
#[command(name = "dungeon-world-server", about = "Grid dungeon gameplay kernel", version)]
struct Args {
    #[arg(long, env = "DUNGEON_WORLD_LISTEN_ADDR")]
    listen_addr: Option<String>,

    #[arg(long, env = "DUNGEON_WORLD_WS_PATH")]
    ws_path: Option<String>,

    #[arg(long, env = "DUNGEON_WORLD_WORLD_SEED_OVERRIDE")]
    world_seed_override: Option<u32>,

    #[arg(long, env = "DUNGEON_WORLD_GENERATOR_VERSION")]
    generator_version: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dungeon_world=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = WorldConfig::load()?;
    if let Some(addr) = args.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(path) = args.ws_path {
        config.ws_path = path;
    }
    if let Some(seed) = args.world_seed_override {
        config.world_seed_override = Some(seed);
    }
    if let Some(generator) = args.generator_version {
        config.generator_version = generator;
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        ws_path = %config.ws_path,
        generator = %config.generator_version,
        "starting dungeon-world-server",
    );

    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(AppState {
        clock: Arc::new(SystemClock),
        sessions: Arc::new(InMemorySessionStore::new()),
        characters: Arc::new(InMemoryCharacterStore::new()),
        worlds: Arc::new(InMemoryWorldRecordStore::new()),
        discovery: Arc::new(InMemoryDiscoveryStore::new()),
        world_models: Mutex::new(Default::default()),
        metrics: Mutex::new(GatewayMetrics::default()),
        config,
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
