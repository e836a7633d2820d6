//! KeyGuard entry point.
//!
//! A minimal host for the interception engine: loads the configuration,
//! starts the keyboard hook, and keeps it installed until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()               -- %APPDATA%\KeyGuard\config.toml or defaults
//!  └─ save_config()               -- writes the defaults on first run
//!  └─ host_bridge::init()         -- process-wide HookLifecycle
//!  └─ HookSession::start()        -- installs WH_KEYBOARD_LL on the pump thread
//!  └─ ctrl_c().await
//!  └─ drop(HookSession)           -- uninstalls the hook before exit
//! ```

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keyguard::infrastructure::host_bridge::{self, BridgeOptions, HookSession};
use keyguard::infrastructure::storage::config::{load_config, save_config, AppConfig};
use keyguard_core::BLOCKED_SHORTCUTS;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config is read before logging exists; report a load failure right after.
    let (config, config_error) = match load_config() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.guard.log_level)),
        )
        .init();

    match config_error {
        Some(e) => warn!("using default configuration: {e}"),
        None => match save_config(&config) {
            Ok(Some(path)) => info!(path = %path.display(), "wrote default configuration"),
            Ok(None) => {}
            Err(e) => warn!("could not write default configuration: {e}"),
        },
    }

    info!("KeyGuard starting");

    host_bridge::init(BridgeOptions::from(&config.guard));
    let session = HookSession::start().context("failed to start keyboard interception")?;

    let blocked: Vec<&str> = BLOCKED_SHORTCUTS.iter().map(|s| s.label()).collect();
    info!("blocking shortcuts: {}", blocked.join(", "));
    info!("KeyGuard active.  Press Ctrl-C to exit.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");

    drop(session);
    info!("KeyGuard stopped");
    Ok(())
}
