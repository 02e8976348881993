use std::sync::Arc;

use actix_web::dev::ServerHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::db::JobRepository;

/// Owns everything `serve` started and tears it down in order once a
/// shutdown signal arrives: HTTP server first, then workers (which finish
/// their in-flight jobs), then the job store.
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    worker_handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    repo: Arc<dyn JobRepository>,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        worker_handles: Vec<JoinHandle<()>>,
        shutdown_tx: watch::Sender<bool>,
        repo: Arc<dyn JobRepository>,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            worker_handles,
            shutdown_tx,
            repo,
        }
    }

    /// Block until CTRL+C or SIGTERM (Unix only), then shut down.
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        tokio::select! {
            _ = ctrl_c() => info!("Received CTRL+C signal, initiating graceful shutdown..."),
            _ = terminate() => info!("Received SIGTERM signal, initiating graceful shutdown..."),
        }

        self.shutdown().await
    }

    async fn shutdown(self) -> Result<(), std::io::Error> {
        let ShutdownCoordinator {
            server_handle,
            server_task,
            worker_handles,
            shutdown_tx,
            repo,
        } = self;

        info!("Stopping HTTP server (no longer accepting new requests)...");
        server_handle.stop(true).await;

        info!("Signaling workers to stop claiming jobs...");
        if let Err(e) = shutdown_tx.send(true) {
            error!("Failed to send shutdown signal to workers: {:?}", e);
        }
        stop_workers(worker_handles).await;

        match server_task.await {
            Ok(Ok(_)) => info!("HTTP server shut down successfully"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        repo.close().await;
        info!("Job store closed, shutdown complete");
        Ok(())
    }
}

async fn stop_workers(handles: Vec<JoinHandle<()>>) {
    let total = handles.len();
    info!("Waiting for {} workers to finish in-flight jobs...", total);

    for (i, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!("Worker {} failed to stop: {:?}", i + 1, e);
        }
    }
    info!("All workers stopped");
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {:?}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM signal handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
