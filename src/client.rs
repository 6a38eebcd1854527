use crate::counter::WIRE_LEN;
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;

/// Connect to a running daemon at `path` and read one count delivery.
///
/// Each successful call consumes the delta: the daemon resets its counter
/// once the reply is fully written, so back-to-back calls return the presses
/// since the previous call, then zero.
pub async fn fetch_count(path: impl AsRef<Path>) -> io::Result<u32> {
    let mut stream = UnixStream::connect(path).await?;

    let mut count = [0u8; WIRE_LEN];
    stream.read_exact(&mut count).await?;

    Ok(u32::from_le_bytes(count))
}
