use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyrdError {
    #[error("failed to set up the counter socket at {}: {source}", .path.display())]
    ChannelSetup { path: PathBuf, source: io::Error },
    #[error("failed to assign seat {seat} to the input backend")]
    AssignSeat { seat: String },
    #[error("failed to wait for input readiness: {0}")]
    Wait(io::Error),
    #[error("failed to drain input events: {0}")]
    Drain(io::Error),
}

impl KeyrdError {
    /// The process exit code for this failure: a distinct small nonzero
    /// integer per failure point, so a supervisor can tell socket setup
    /// problems from a backend that died at runtime.
    pub fn exit_code(&self) -> u8 {
        match self {
            KeyrdError::ChannelSetup { .. } => 1,
            KeyrdError::AssignSeat { .. } => 2,
            KeyrdError::Wait(_) => 3,
            KeyrdError::Drain(_) => 4,
        }
    }
}
