//! The client error types.
//!
//! Only conditions the client cannot retry its way out of become errors.
//! Invalid inbound packets are logged and dropped without one, and a
//! nonzero hook exit code is a domain signal consumed by the state machine.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Every configured medium was rejected by the MEDIUM hook.
    #[error("No valid media types for {0}")]
    NoValidMedia(String),
    /// The client must not keep running without its persistent lease state.
    #[error("Lease database failure: {0}")]
    LeaseDatabase(#[source] io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;
