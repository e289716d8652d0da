use std::{net::SocketAddr, time::Duration};

use clap::Parser;

/// Listening configuration of the HTTP service.
///
/// Every flag falls back to an environment variable, so a `.env` file loaded
/// through `dotenvy` works as well.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "TOTP code API")]
pub struct Config {
  #[arg(long, env = "TOTP_LISTEN", default_value = "0.0.0.0:7842")]
  pub listen: SocketAddr,
  /// time allowed for reading a request and producing its response
  #[arg(long, env = "TOTP_REQUEST_TIMEOUT_SECS", default_value_t = 5)]
  pub request_timeout_secs: u64,
  #[arg(long, env = "TOTP_MAX_BODY_BYTES", default_value_t = 1 << 20)]
  pub max_body_bytes: usize,
}

impl Config {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      listen: SocketAddr::from(([0, 0, 0, 0], 7842)),
      request_timeout_secs: 5,
      max_body_bytes: 1 << 20,
    }
  }
}

#[test]
fn test_parse_config() {
  let config = Config::default();
  assert_eq!(config.listen, SocketAddr::from(([0, 0, 0, 0], 7842)));
  assert_eq!(config.request_timeout(), Duration::from_secs(5));
  assert_eq!(config.max_body_bytes, 1048576);

  // every flag given, so TOTP_* variables in the environment cannot leak in
  let config = Config::try_parse_from([
    "totp_api", "--listen", "127.0.0.1:8000", "--request-timeout-secs", "2", "--max-body-bytes", "4096",
  ]).unwrap();
  assert_eq!(config.listen, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
  assert_eq!(config.request_timeout(), Duration::from_secs(2));
  assert_eq!(config.max_body_bytes, 4096);

  assert!(Config::try_parse_from(["totp_api", "--listen", "nowhere"]).is_err());
}
