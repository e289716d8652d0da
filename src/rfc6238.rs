use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::{DecodeError, Encoding, BASE32_NOPAD};
use hmac::{digest::FixedOutput, Hmac, Mac};

/// Seconds a code stays valid.
pub const PERIOD: u64 = 30;
/// Length of the rendered code.
pub const DIGITS: usize = 6;

const MODULUS: u32 = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
  #[error("invalid secret key: {0}")]
  Decode(#[from] DecodeError),
  #[error("invalid secret key: empty key")]
  Empty,
}

/// A code together with the window it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totp {
  pub code: String,
  pub counter: u64,
  /// seconds until `counter` moves on, in `1..=PERIOD`
  pub remaining: u64,
}

/// Unpadded RFC 4648 base32 which, unlike `BASE32_NOPAD`, tolerates non-zero
/// trailing bits. Authenticator apps hand out 26 and 52 character secrets that
/// depend on this.
fn secret_encoding() -> &'static Encoding {
  static ENCODING: OnceLock<Encoding> = OnceLock::new();
  ENCODING.get_or_init(|| {
    let mut spec = BASE32_NOPAD.specification();
    spec.check_trailing_bits = false;
    spec.encoding().expect("base32 specification is valid")
  })
}

pub fn base32_encode(secret: &[u8]) -> String {
  BASE32_NOPAD.encode(secret)
}

/// Strips the spaces people group secrets with and uppercases the rest.
/// Only ASCII is case-mapped, anything else is left for the decoder to reject.
pub fn normalize_secret(secret: &str) -> String {
  secret.chars().filter(|&c| c != ' ').collect::<String>().to_ascii_uppercase()
}

pub fn decode_secret(secret: &str) -> Result<Vec<u8>, SecretError> {
  let key = secret_encoding().decode(normalize_secret(secret).as_bytes())?;
  if key.is_empty() {
    return Err(SecretError::Empty);
  }
  Ok(key)
}

/// Seconds since the epoch on the host clock, 0 if the clock is before it.
pub fn unix_now() -> u64 {
  match SystemTime::now().duration_since(UNIX_EPOCH) {
    Ok(n) => n.as_secs(),
    Err(_) => 0,
  }
}

pub fn time_tick(unix_seconds: u64) -> u64 {
  unix_seconds / PERIOD
}

pub fn remaining(unix_seconds: u64) -> u64 {
  PERIOD - unix_seconds % PERIOD
}

/// HOTP value (RFC 4226) of `counter` under the raw `key`.
pub fn generate_otp(key: &[u8], counter: u64) -> String {
  let mut mac = Hmac::<sha1::Sha1>::new_from_slice(key).expect("HMAC takes keys of any length");
  mac.update(&counter.to_be_bytes());
  let signature = mac.finalize_fixed();

  // dynamic truncation, RFC 4226 section 5.3
  let offset = (signature[signature.len() - 1] & 0x0f) as usize;
  let bytes = [signature[offset], signature[offset + 1], signature[offset + 2], signature[offset + 3]];
  let code = u32::from_be_bytes(bytes) & 0x7fff_ffff;

  format!("{:0width$}", code % MODULUS, width = DIGITS)
}

/// Code for `secret` (base32, any case, spaces allowed) at `unix_seconds`.
pub fn generate(secret: &str, unix_seconds: u64) -> Result<Totp, SecretError> {
  let key = decode_secret(secret)?;
  let counter = time_tick(unix_seconds);
  Ok(Totp {
    code: generate_otp(&key, counter),
    counter,
    remaining: remaining(unix_seconds),
  })
}
