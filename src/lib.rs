//! A small daemon that counts key presses at the input-device level and
//! serves the tally to local clients over a unix socket.
//!
//! The [`EventSource`] watches every keyboard on one seat through the
//! libinput/udev backend; the [`Daemon`] multiplexes input readiness and
//! client connections on a single task, adding one to its counter per press.
//! A client connects, sends nothing, and receives the accumulated count as
//! one little-endian `u32`; the counter resets only once the reply went out
//! in full, so each client gets a non-overlapping slice of activity.
//!
//! # Example
//!
//! Running the daemon requires access to `/dev/input` (root or the `input`
//! group).
//!
//! ```no_run
//! use keyrd::{Daemon, DirectAccess, EventSource, KeyrdError, LiveSource, Seat};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), KeyrdError> {
//!     let source = EventSource::new(DirectAccess, &Seat::from_env())?;
//!     let daemon = Daemon::bind(keyrd::socket_path(), LiveSource::new(source)?)?;
//!
//!     daemon.run().await
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("This crate only works on Linux");

mod client;
mod counter;
mod daemon;
mod error;
mod source;

pub use client::fetch_count;
pub use daemon::{socket_path, Channel, Daemon, SOCKET_PATH};
pub use error::KeyrdError;
pub use source::{DeviceAccess, DirectAccess, EventSource, KeyEvent, KeySource, LiveSource, Seat};

pub type KeyrdResult<T> = Result<T, KeyrdError>;
