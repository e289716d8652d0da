#[macro_use]
extern crate log;

use anyhow::Result;
use clap::Parser;
use totp_api::{config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;
  let config = Config::parse();
  debug!("{:?}", config);

  let listener = tokio::net::TcpListener::bind(config.listen).await?;
  let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
  info!("2FA API server listening on {} ({} worker threads)", listener.local_addr()?, workers);
  info!("endpoints:");
  info!("  GET  /api/totp?secret=YOUR_SECRET");
  info!("  POST /api/totp {{\"secret\":\"YOUR_SECRET\"}}");
  info!("  GET  /health");

  server::serve(listener, config, server::shutdown_signal()).await?;
  info!("server stopped");
  Ok(())
}
