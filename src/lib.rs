#[macro_use]
extern crate log;

pub mod config;
pub mod rfc6238;
pub mod server;
