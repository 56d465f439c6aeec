// Tombola server entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr)
// 2. Load config
// 3. Build the application state and the first round
// 4. Bind the WebSocket listener
// 5. Spawn WebSocket server and app logic tasks
// 6. Wait for Ctrl+C or the app loop to end, then clean up

use tombola_server::app;
use tombola_server::config;
use tombola_server::ws_server;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Tombola server starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: numbers {}..={}, touches_to_win={}, winners_per_round={}",
        config.round.min,
        config.round.max,
        config.round.touches_to_win,
        config.round.winners_per_round
    );

    let app_state = app::AppState::new(config.clone())?;

    let listener = ws_server::bind(&config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;

    let (ws_tx, ws_rx) = mpsc::channel(256);

    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ws_tx).await {
            error!("WebSocket server error: {}", e);
        }
    });

    let mut app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    info!("Application ready");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown requested");
            app_handle.abort();
        }
        _ = &mut app_handle => {
            info!("Application loop finished");
        }
    }

    // The accept loop runs until the process exits.
    ws_handle.abort();

    info!("Tombola server shut down cleanly");
    Ok(())
}

/// Initialize tracing to stderr, filtered by `RUST_LOG` when set.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tombola_server=info,tombola_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
