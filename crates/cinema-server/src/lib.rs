//! Server implementation: command line, socket setup, serving loop.
//!
//! The binary lives in `main.rs`; the pieces are exported here so the
//! integration harness can run the real serving loop in-process on an
//! ephemeral port.
#![warn(missing_docs)]

mod opts;
mod server;

pub use opts::Opts;
pub use server::Server;
