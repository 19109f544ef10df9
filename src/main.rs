use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anon_gateway::service::TokenService;
use anon_gateway::store::MemoryTokenStore;
use anon_gateway::{api, cli, config, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// `RUST_LOG` filter with a fmt layer; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "anon_gateway=debug,tower_http=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let store = Arc::new(MemoryTokenStore::new());
    let tokens = Arc::new(TokenService::new(store, cfg.token_policy()));
    tracing::info!(
        ttl_hours = cfg.token_ttl_hours,
        max_requests = cfg.max_requests_per_token,
        "token service initialized"
    );

    let cancel = CancellationToken::new();
    let cleanup = jobs::cleanup::spawn(tokens.clone(), cfg.cleanup_schedule(), cancel.clone());

    let state = Arc::new(AppState {
        tokens,
        config: cfg,
    });
    let app = api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("anonymous token gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // Server has drained; make sure the sweeper stops even if the signal
    // future was never polled to completion.
    cancel.cancel();
    if let Err(e) = cleanup.await {
        tracing::warn!("cleanup job ended abnormally: {}", e);
    }

    Ok(())
}

/// Resolves on ctrl-c or SIGTERM and cancels background jobs.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    cancel.cancel();
}
