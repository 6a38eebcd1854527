mod device;

use crate::error::KeyrdError;
use crate::KeyrdResult;
use input::event::keyboard::{KeyboardEvent, KeyboardEventTrait, KeyState};
use input::event::Event;
use input::Libinput;
use std::env;
use std::os::fd::{AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

use device::AccessBridge;
pub use device::{DeviceAccess, DirectAccess};

const SEAT_ENV: &str = "XDG_SEAT";
const DEFAULT_SEAT: &str = "seat0";

/// The seat whose input devices feed the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat(String);

impl Seat {
    /// Seat selection: `XDG_SEAT` when set, `seat0` otherwise.
    pub fn from_env() -> Self {
        Self::from_override(env::var(SEAT_ENV).ok())
    }

    fn from_override(name: Option<String>) -> Self {
        Seat(name.unwrap_or_else(|| DEFAULT_SEAT.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A key-transition event, reduced to the state change.
///
/// Which key moved is deliberately not recorded; the daemon only tallies
/// presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press,
    Release,
}

impl KeyEvent {
    fn from_backend(event: Event) -> Option<Self> {
        let Event::Keyboard(KeyboardEvent::Key(key)) = event else {
            return None;
        };

        match key.key_state() {
            KeyState::Pressed => Some(KeyEvent::Press),
            KeyState::Released => Some(KeyEvent::Release),
        }
    }
}

/// An open connection to the input backend, bound to one seat.
///
/// The backend multiplexes every device on the seat behind a single file
/// descriptor; dropping the source releases the backend context and every
/// device descriptor it requested.
pub struct EventSource {
    context: Libinput,
}

impl EventSource {
    /// Create the backend context over udev and bind it to `seat`.
    ///
    /// Device nodes are opened through `access`. On failure all partially
    /// acquired backend resources are released before returning.
    pub fn new<A>(access: A, seat: &Seat) -> KeyrdResult<Self>
    where
        A: DeviceAccess + 'static,
    {
        let mut context = Libinput::new_with_udev(AccessBridge(access));

        context
            .udev_assign_seat(seat.name())
            .map_err(|()| KeyrdError::AssignSeat {
                seat: seat.name().to_string(),
            })?;

        Ok(EventSource { context })
    }

    /// Dispatch the backend and collect every queued key-transition event.
    ///
    /// Fails if the backend connection broke, e.g. the udev context went
    /// away. Non-keyboard events are discarded here.
    pub fn drain(&mut self) -> KeyrdResult<Vec<KeyEvent>> {
        self.context.dispatch().map_err(KeyrdError::Drain)?;

        Ok(self
            .context
            .by_ref()
            .filter_map(KeyEvent::from_backend)
            .collect())
    }
}

impl AsRawFd for EventSource {
    /// The backend descriptor, stable for the lifetime of the source.
    fn as_raw_fd(&self) -> RawFd {
        self.context.as_raw_fd()
    }
}

/// What the counting loop needs from its input side: one batch of key
/// transitions per readiness of the source.
#[allow(async_fn_in_trait)]
pub trait KeySource {
    async fn next_events(&mut self) -> KeyrdResult<Vec<KeyEvent>>;
}

/// [`KeySource`] over a live [`EventSource`], driven by readiness of the
/// backend descriptor.
pub struct LiveSource {
    fd: AsyncFd<EventSource>,
}

impl LiveSource {
    pub fn new(source: EventSource) -> KeyrdResult<Self> {
        let fd = AsyncFd::with_interest(source, Interest::READABLE).map_err(KeyrdError::Wait)?;

        Ok(LiveSource { fd })
    }
}

impl KeySource for LiveSource {
    async fn next_events(&mut self) -> KeyrdResult<Vec<KeyEvent>> {
        loop {
            let mut guard = self.fd.readable_mut().await.map_err(KeyrdError::Wait)?;

            // Dispatch consumes the descriptor's readiness, so clear it
            // before handing the batch over; the next press re-arms it.
            let drained = guard.get_inner_mut().drain();
            guard.clear_ready();

            match drained {
                Ok(events) if events.is_empty() => continue,
                drained => return drained,
            }
        }
    }
}
