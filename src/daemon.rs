use crate::counter::{Counter, WIRE_LEN};
use crate::error::KeyrdError;
use crate::source::KeySource;
use crate::KeyrdResult;
use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

/// The well-known address clients connect to.
pub const SOCKET_PATH: &str = "/tmp/keyrd.socket";

const SOCKET_ENV: &str = "KEYRD_SOCKET";

/// The socket path to serve on: `KEYRD_SOCKET` when set, [`SOCKET_PATH`]
/// otherwise.
pub fn socket_path() -> PathBuf {
    env::var_os(SOCKET_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SOCKET_PATH))
}

/// Removes the bound socket path when dropped. Tolerates the path already
/// being gone.
#[derive(Debug)]
struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// The bound listening channel, before an input source is attached.
///
/// Binding comes first so that a channel failure is reported as such even
/// when the input backend would have failed too; dropping an unattached
/// channel already removes the socket path.
pub struct Channel {
    guard: SocketGuard,
    listener: UnixListener,
}

impl Channel {
    /// Bind the counter socket at `path`.
    ///
    /// A stale socket file left behind by an unclean exit is removed before
    /// binding. The socket is made world-connectable: reading the count
    /// requires no privilege.
    pub fn bind(path: impl Into<PathBuf>) -> KeyrdResult<Channel> {
        let path = path.into();

        let listener = remove_stale_socket(&path)
            .and_then(|()| UnixListener::bind(&path))
            .and_then(|listener| {
                fs::set_permissions(&path, fs::Permissions::from_mode(0o666))?;
                Ok(listener)
            })
            .map_err(|source| KeyrdError::ChannelSetup {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), "listening");

        Ok(Channel {
            guard: SocketGuard { path },
            listener,
        })
    }

    /// Attach the input source, completing the counting loop.
    pub fn attach<S: KeySource>(self, source: S) -> Daemon<S> {
        Daemon {
            _guard: self.guard,
            listener: self.listener,
            source,
            counter: Counter::new(),
        }
    }
}

/// The counting loop: one press counter, one listening socket, one input
/// source, serviced by a single task.
#[derive(Debug)]
pub struct Daemon<S> {
    // Field order is the cleanup order on every exit path: remove the
    // socket path, close the listener, release the input source.
    _guard: SocketGuard,
    listener: UnixListener,
    source: S,
    counter: Counter,
}

impl<S: KeySource> Daemon<S> {
    /// [`Channel::bind`] and [`Channel::attach`] in one step.
    pub fn bind(path: impl Into<PathBuf>, source: S) -> KeyrdResult<Self> {
        Ok(Channel::bind(path)?.attach(source))
    }

    /// Run until a fatal error or until `accept` fails.
    ///
    /// Each wake-up services the input source before the listener, so a
    /// client racing a burst of presses receives the count including that
    /// burst. An `accept` failure stops the loop gracefully; the delivery
    /// itself failing is recoverable and keeps the undelivered delta.
    pub async fn run(mut self) -> KeyrdResult<()> {
        loop {
            tokio::select! {
                biased;

                events = self.source.next_events() => {
                    for event in events? {
                        self.counter.record(event);
                    }
                }
                conn = self.listener.accept() => {
                    let (mut stream, _) = match conn {
                        Ok(conn) => conn,
                        Err(err) => {
                            info!(error = %err, "accept failed, stopping");
                            return Ok(());
                        }
                    };

                    match deliver(&mut self.counter, &mut stream).await {
                        Ok(()) => debug!("delivered count"),
                        Err(err) => warn!(error = %err, "delivery failed, keeping the count"),
                    }
                    // The connection is single-use; closed on drop.
                }
            }
        }
    }
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed stale socket");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Write the current count to one client connection.
///
/// The counter resets only when the full wire form went out; a short or
/// failed write leaves it untouched, so the delta reaches the next client
/// instead of being lost.
async fn deliver<W>(counter: &mut Counter, conn: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = conn.write(&counter.encode()).await?;

    if written == WIRE_LEN {
        counter.reset();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::KeyEvent::Press;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// An [`AsyncWrite`] that accepts at most `cap` bytes in total, or fails
    /// outright.
    struct WriteSink {
        cap: usize,
        buf: Vec<u8>,
        broken: bool,
    }

    impl WriteSink {
        fn with_capacity(cap: usize) -> Self {
            WriteSink {
                cap,
                buf: Vec::new(),
                broken: false,
            }
        }

        fn broken() -> Self {
            WriteSink {
                cap: 0,
                buf: Vec::new(),
                broken: true,
            }
        }
    }

    impl AsyncWrite for WriteSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            data: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.broken {
                return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
            }

            let room = self.cap - self.buf.len();
            let accepted = data.len().min(room);
            self.buf.extend_from_slice(&data[..accepted]);

            Poll::Ready(Ok(accepted))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn counter_at(value: u32) -> Counter {
        let mut counter = Counter::new();
        for _ in 0..value {
            counter.record(Press);
        }
        counter
    }

    #[tokio::test]
    async fn full_delivery_resets_the_counter() {
        let mut counter = counter_at(9);
        let mut sink = WriteSink::with_capacity(8);

        deliver(&mut counter, &mut sink).await.unwrap();

        assert_eq!(sink.buf, 9u32.to_le_bytes());
        assert_eq!(counter.value(), 0);
    }

    #[tokio::test]
    async fn short_delivery_keeps_the_counter() {
        let mut counter = counter_at(9);
        let mut sink = WriteSink::with_capacity(2);

        deliver(&mut counter, &mut sink).await.unwrap();

        assert_eq!(counter.value(), 9);
    }

    #[tokio::test]
    async fn failed_delivery_keeps_the_counter() {
        let mut counter = counter_at(9);
        let mut sink = WriteSink::broken();

        deliver(&mut counter, &mut sink).await.unwrap_err();

        assert_eq!(counter.value(), 9);
    }

    #[tokio::test]
    async fn delta_survives_until_a_delivery_succeeds() {
        let mut counter = counter_at(4);

        deliver(&mut counter, &mut WriteSink::broken()).await.unwrap_err();
        for _ in 0..3 {
            counter.record(Press);
        }

        let mut sink = WriteSink::with_capacity(WIRE_LEN);
        deliver(&mut counter, &mut sink).await.unwrap();

        assert_eq!(sink.buf, 7u32.to_le_bytes());
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn guard_tolerates_a_missing_path() {
        let dir = tempfile::tempdir().unwrap();

        let guard = SocketGuard {
            path: dir.path().join("never-created.socket"),
        };
        drop(guard);
    }

    #[test]
    fn guard_removes_the_bound_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyrd.socket");
        fs::File::create(&path).unwrap();

        drop(SocketGuard { path: path.clone() });

        assert!(!path.exists());
    }
}
