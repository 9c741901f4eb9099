//! The `serve` command
//!
//! Runs the HTTP API and the consumer pool side by side on one runtime. Both
//! stop on the same cancellation token: ctrl-c (or SIGTERM) cancels it, the
//! server finishes its in-flight requests, and every worker completes the
//! record it is processing before the reports are collected.

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Ledger;
use crate::api::create_router;
use crate::stream::{join_workers, total_stats, ConsumerStats};
use crate::types::LedgerError;

/// Bind `host:port` and serve until a shutdown signal arrives
pub async fn serve(ledger: &Ledger, host: &str, port: u16) -> Result<ConsumerStats, LedgerError> {
    let address = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| LedgerError::IoError {
            message: format!("Failed to bind {}: {}", address, e),
        })?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    serve_on(ledger, listener, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is cancelled
///
/// # Returns
///
/// The summed counters of the consumer workers.
pub async fn serve_on(
    ledger: &Ledger,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<ConsumerStats, LedgerError> {
    let workers = ledger.pool().spawn(shutdown.clone());

    if let Ok(address) = listener.local_addr() {
        info!(%address, topic = %ledger.topic().name(), "card ledger listening");
    }

    let router = create_router(ledger.app_state());
    let stopped = shutdown.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { stopped.cancelled().await })
        .await;

    // The server may also stop on its own error; the workers must stop too
    shutdown.cancel();
    let stats = total_stats(&join_workers(workers).await);
    info!(
        processed = stats.processed,
        errors = stats.errors,
        lag = ledger.pool().lag(),
        "card ledger stopped"
    );

    served?;
    Ok(stats)
}

/// Completes on ctrl-c, or on SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("ctrl-c received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CommitStrategyType;
    use crate::core::test_support::instant_settlement;
    use crate::core::MemoryStore;
    use crate::stream::{ConsumerConfig, PartitionedTopic};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn ledger() -> Ledger {
        Ledger::new(
            Arc::new(MemoryStore::new()),
            instant_settlement(0.0),
            Arc::new(PartitionedTopic::new("payments", 2)),
            CommitStrategyType::Ack,
            ConsumerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_serves_until_cancelled() {
        let ledger = ledger();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let server = {
            let ledger = ledger.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { serve_on(&ledger, listener, shutdown).await })
        };

        let mut stream = TcpStream::connect(address).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("\"status\":\"healthy\""));

        shutdown.cancel();
        let stats = server.await.unwrap().unwrap();
        assert_eq!(stats, ConsumerStats::default());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let ledger = ledger();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = serve(&ledger, "127.0.0.1", port).await;
        assert!(matches!(result, Err(LedgerError::IoError { .. })));
    }
}
