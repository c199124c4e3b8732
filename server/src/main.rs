use clap::Parser;
use log::info;
use server::config::{ServerArgs, ServerConfig};
use server::network::Server;

/// Parses configuration, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = ServerArgs::parse();
    let config = ServerConfig::try_from(args)?;
    info!(
        "Admission policy {:?}, rate limit {}/s, heartbeat {:?}",
        config.admission, config.rate_limit.max_messages, config.heartbeat_interval
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
