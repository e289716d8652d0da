#[macro_use]
extern crate log;

use anyhow::Result;
use clap::Parser;
use totp_api::rfc6238;

/// Prints the current code of each secret, the way an authenticator app would.
#[derive(Debug, Parser)]
struct Cli {
  /// unix time to compute the codes at, defaults to now
  #[arg(long)]
  at: Option<u64>,
  /// treat secrets as raw key bytes instead of base32
  #[arg(long)]
  raw: bool,
  #[arg(required = true)]
  secrets: Vec<String>,
}

fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  let _logger = flexi_logger::Logger::try_with_env_or_str("warn")?.start()?;
  let args = Cli::parse();
  let at = args.at.unwrap_or_else(rfc6238::unix_now);
  debug!("computing {} code(s) at {}", args.secrets.len(), at);

  let mut failed = 0;
  for secret in &args.secrets {
    let secret = if args.raw { rfc6238::base32_encode(secret.as_bytes()) } else { secret.clone() };
    match rfc6238::generate(&secret, at) {
      Ok(totp) => println!("{} ({}s)", totp.code, totp.remaining),
      Err(e) => {
        eprintln!("{}", e);
        failed += 1;
      }
    }
  }
  if failed > 0 {
    anyhow::bail!("{} of {} secrets rejected", failed, args.secrets.len());
  }
  Ok(())
}
