//! Process bootstrap: binds the TCP listener, spawns one session task per
//! accepted connection, and runs the heartbeat timer and admin console
//! alongside it. Modeled on the teacher's `run_server` — a handful of
//! cooperating tasks sharing one `Arc`, torn down by a `CancellationToken`
//! rather than by killing the process out from under open sockets.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ServerConfig, HEARTBEAT_INTERVAL};
use crate::coordinator::MatchController;
use crate::session::run_session;

const LOG_TARGET: &str = "hascill::server";

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let controller = Arc::new(MatchController::new(&config));
    let shutdown = controller.shutdown.clone();

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(target: LOG_TARGET, addr = %config.bind, "listening");

    let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(&controller), shutdown.clone()));

    let admin_controller = Arc::clone(&controller);
    let admin_shutdown = shutdown.clone();
    let admin = tokio::task::spawn_blocking(move || {
        crate::admin::run_repl(admin_controller, admin_shutdown);
    });

    let accept_shutdown = shutdown.clone();
    let accept_loop = async {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(target: LOG_TARGET, error = %e, "accept failed");
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!(target: LOG_TARGET, error = %e, "failed to set TCP_NODELAY");
            }
            info!(target: LOG_TARGET, %peer, "accepted connection");

            let (reader, writer) = stream.into_split();
            let session_controller = Arc::clone(&controller);
            tokio::spawn(async move {
                run_session(reader, writer, session_controller).await;
            });
        }
    };

    tokio::select! {
        _ = accept_loop => {}
        _ = accept_shutdown.cancelled() => {
            info!(target: LOG_TARGET, "shutdown requested, no longer accepting connections");
        }
        _ = tokio::signal::ctrl_c() => {
            info!(target: LOG_TARGET, "ctrl-c received");
            shutdown.cancel();
        }
    }

    heartbeat.abort();
    admin.abort();
    let _ = heartbeat.await;

    info!(target: LOG_TARGET, "server shut down");
    Ok(())
}

async fn heartbeat_loop(controller: Arc<MatchController>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.heartbeat_tick();
            }
            _ = shutdown.cancelled() => {
                break;
            }
        }
    }
}
