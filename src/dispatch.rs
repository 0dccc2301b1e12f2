//! Event dispatcher.
//!
//! Reads the display connection on its own thread and forwards typed
//! [`DisplayEvent`]s to the manager.

use crate::cancel::CancelToken;
use crate::traits::{DisplayEvent, EventSource, Received};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The display connection was lost.  Fatal.
#[derive(Debug, thiserror::Error)]
#[error("display connection lost: {0}")]
pub struct ConnectionLost<E>(#[source] pub E);

/// Forward events from `source` to `sink` until the connection closes, the
/// sink goes away or `cancel` fires.
///
/// Protocol errors are logged and skipped.
pub fn dispatch<S: EventSource>(
    source: &mut S,
    sink: &Sender<DisplayEvent>,
    cancel: &CancelToken,
) -> Result<(), ConnectionLost<S::Error>> {
    while !cancel.is_cancelled() {
        match source.next().map_err(ConnectionLost)? {
            Received::Event(event) => {
                debug!("event {:?}", event);
                if sink.send(event).is_err() {
                    debug!("event sink closed");
                    return Ok(());
                }
            }
            Received::Ignored => {}
            Received::ProtocolError(msg) => warn!("display error: {}", msg),
            Received::Closed => {
                info!("display connection closed");
                return Ok(());
            }
        }
    }
    Ok(())
}

/// A [`dispatch`] loop running on its own thread.
pub struct Dispatcher<E> {
    thread: JoinHandle<Result<(), ConnectionLost<E>>>,
    done: Receiver<()>,
}

/// Run [`dispatch`] on a dedicated thread.
pub fn spawn<S: EventSource + 'static>(
    mut source: S,
    sink: Sender<DisplayEvent>,
    cancel: CancelToken,
) -> std::io::Result<Dispatcher<S::Error>> {
    let (done_tx, done) = bounded::<()>(0);
    let thread = thread::Builder::new().name("dispatch".into()).spawn(move || {
        let _done = done_tx;
        dispatch(&mut source, &sink, &cancel)
    })?;
    Ok(Dispatcher { thread, done })
}

impl<E> Dispatcher<E> {
    /// Wait up to `timeout` for the loop to finish and return its result.
    ///
    /// `None` means the loop is still blocked reading the display; the
    /// thread is left detached.  `Some(Err(_))` means it panicked.
    pub fn join_timeout(
        self,
        timeout: Duration,
    ) -> Option<thread::Result<Result<(), ConnectionLost<E>>>> {
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => None,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Some(self.thread.join()),
        }
    }
}

//  Tests
