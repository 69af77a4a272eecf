//! Process entry point shared by the decoy binaries.

use crate::config::Config;
use crate::protocols::ProtocolType;
use crate::server::Server;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Load configuration, set up logging and serve `protocol` until Ctrl-C.
///
/// Exits 0 after a clean shutdown and 1 if configuration fails or the
/// port cannot be bound.
pub fn launch(protocol: ProtocolType) -> ExitCode {
    let config = match Config::load(protocol) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        protocol = %config.protocol,
        host = %config.host,
        port = config.port,
        max_connections = ?config.max_connections,
        read_chunk_size = config.read_chunk_size,
        "Starting {} decoy",
        protocol.display_name()
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let server = Server::from_config(&config)?;
        server.run().await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
