// Supervisor module
// Brings the service up in a fixed order and tears it down on interrupt

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::https::{ConnectionSettings, HttpsServer};
use super::listener::create_listener;
use super::rpc::RpcServer;
use super::signal::InterruptSignal;
use super::tls::{TlsError, TlsMaterial};
use crate::config::Config;
use crate::handler::Multiplexer;
use crate::logger;
use crate::service::BlogApi;
use crate::store::{mongo, MongoBlogStore, StoreError};

/// Fatal errors raised before the service is fully up
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database connection failed: {0}")]
    Database(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("gRPC server setup failed: {0}")]
    Rpc(#[from] tonic::transport::Error),

    #[error("reflection service setup failed: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error("failed to register interrupt handler: {0}")]
    Signal(std::io::Error),
}

/// Start every component, wait for the interrupt, then shut down in order
pub async fn run(config: Config) -> Result<(), StartupError> {
    let rpc_addr = config.get_rpc_socket_addr().map_err(StartupError::Config)?;
    let http_addr = config.get_http_socket_addr().map_err(StartupError::Config)?;
    let mut interrupt = InterruptSignal::register().map_err(StartupError::Signal)?;

    logger::log_startup_step(1, "Connecting to MongoDB...");
    let client = mongo::connect(&config.database).await?;

    logger::log_startup_step(2, "Opening blog collection...");
    let store = MongoBlogStore::new(&client, &config.database.name, &config.database.collection);
    let api = BlogApi::new(Arc::new(store), config.service.list_throttle());

    logger::log_startup_step(3, &format!("Binding gRPC listener on {rpc_addr}..."));
    let rpc_listener = create_listener(rpc_addr).map_err(|source| StartupError::Bind {
        addr: rpc_addr,
        source,
    })?;

    logger::log_startup_step(4, "Loading TLS certificate and key...");
    let tls = TlsMaterial::load(&config.tls)?;

    logger::log_startup_step(5, "Starting gRPC server...");
    let rpc = RpcServer::spawn(
        rpc_listener,
        tls.identity(),
        api.clone(),
        config.service.reflection,
    )?;

    logger::log_startup_step(6, &format!("Starting HTTPS server on {http_addr}..."));
    let http_listener = match create_listener(http_addr) {
        Ok(listener) => listener,
        Err(source) => {
            let grace = config.shutdown.grace_period();
            rpc.stop_accepting();
            if let Err(e) = rpc.close(grace).await {
                logger::log_error(&format!("[STARTUP] {e}"));
            }
            close_database(client, grace).await;
            return Err(StartupError::Bind {
                addr: http_addr,
                source,
            });
        }
    };
    let mux = Multiplexer::new(api, &config.http);
    let https = HttpsServer::spawn(
        http_listener,
        tls.acceptor(),
        mux,
        ConnectionSettings::from_config(&config),
    );

    logger::log_server_start(&rpc_addr, &http_addr, &config);

    interrupt.recv().await;

    let grace = config.shutdown.grace_period();
    shutdown(rpc, close_database(client, grace), https, grace).await;
    Ok(())
}

/// Ordered teardown; every step runs whatever happened in the one before
async fn shutdown<F>(rpc: RpcServer, close_database: F, https: HttpsServer, grace: Duration)
where
    F: Future<Output = ()>,
{
    logger::log_shutdown_step(1, "Stopping gRPC server...");
    rpc.stop_accepting();

    logger::log_shutdown_step(2, "Closing gRPC listener...");
    if let Err(e) = rpc.close(grace).await {
        logger::log_error(&format!("[SHUTDOWN] {e}"));
    }

    logger::log_shutdown_step(3, "Closing MongoDB connection...");
    close_database.await;

    logger::log_shutdown_step(4, "Stopping HTTPS server...");
    if let Err(e) = https.close(grace).await {
        logger::log_error(&format!("[SHUTDOWN] {e}"));
    }

    logger::log_info("Server shut down");
}

async fn close_database(client: mongodb::Client, grace: Duration) {
    if tokio::time::timeout(grace, client.shutdown().immediate(true))
        .await
        .is_err()
    {
        logger::log_error("[SHUTDOWN] MongoDB client did not close in time");
    }
}
