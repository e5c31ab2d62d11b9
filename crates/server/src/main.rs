use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use bridge::{
    session::SWEEP_INTERVAL, BridgeConfig, ConfigStore, EventDispatcher, NoteScheduler,
    SessionStore,
};
use clap::Parser;
use tracing::{error, info, warn};
use trigger::{open_port, SystemPaths, TracingPort, TriggerPort};

mod api;
mod app_state;
mod config;
mod ws;

use api::build_router;
use app_state::AppState;
use config::{spawn_config_watcher, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(cli.env_filter())
        .init();

    let config = Arc::new(
        ConfigStore::open(&cli.config)
            .with_context(|| format!("failed to load config {}", cli.config.display()))?,
    );
    let initial = config.get();
    info!(
        port = initial.server.port,
        midi_port = %initial.midi.port_name,
        channel = %initial.midi.channel,
        "starting remote midi server"
    );

    let output: Arc<dyn TriggerPort> = if cli.dry_run {
        warn!("dry run: notes are logged, not sent");
        Arc::new(TracingPort::new(initial.midi.port_name.clone()))
    } else {
        let port = open_port(&initial.midi.port_name, &SystemPaths::default())
            .await
            .with_context(|| format!("failed to open midi output '{}'", initial.midi.port_name))?;
        Arc::new(port)
    };

    let sessions = Arc::new(SessionStore::new(initial.server.password.clone()));
    let _sweeper = sessions.spawn_sweeper(SWEEP_INTERVAL);

    let scheduler = Arc::new(NoteScheduler::new(Arc::clone(&output)));
    register_reload_hooks(&config, Arc::clone(&initial));
    let _watcher = match spawn_config_watcher(Arc::clone(&config), cli.reload_debounce()) {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            warn!(%error, "config hot reload disabled");
            None
        }
    };

    let dispatcher = EventDispatcher::new(
        Arc::clone(&config),
        Arc::clone(&sessions),
        Arc::clone(&scheduler),
    );
    let state = AppState {
        config: Arc::clone(&config),
        sessions,
        dispatcher,
        static_dir: initial.server.static_dir.clone(),
    };
    let app = build_router(Arc::new(state));

    let listener =
        tokio::net::TcpListener::bind((initial.server.host.as_str(), initial.server.port)).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shutting down");
    if let Err(error) = output.close().await {
        error!(%error, "failed to close midi output");
    }
    Ok(())
}

/// Settings in `next` that only take effect on restart and differ from the
/// ones this process started with. Always compared against the startup
/// values, so the warning repeats on every reload until a restart.
fn restart_required(running: &BridgeConfig, next: &BridgeConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if next.midi.port_name != running.midi.port_name {
        changed.push("midi.port_name");
    }
    if next.server != running.server {
        changed.push("server");
    }
    changed
}

fn register_reload_hooks(config: &ConfigStore, running: Arc<BridgeConfig>) {
    config.on_change(move |next| {
        for setting in restart_required(&running, next) {
            warn!(setting, "changed on disk; restart to apply");
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
