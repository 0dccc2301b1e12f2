//! Cancellation signal shared by every blocking call.
//!
//! A [`CancelToken`] wraps the receiving end of a channel nobody ever sends
//! on.  [`Canceller::cancel`] drops the sending end, which disconnects every
//! clone of the token at once, so the token can sit in any
//! [`crossbeam_channel::select!`] next to the operation it guards:
//!
//! ```ignore
//! select! {
//!     send(commands, cmd) -> res => res.map_err(|_| PlayerError::Closed),
//!     recv(token.receiver()) -> _ => Err(PlayerError::Cancelled),
//! }
//! ```

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

/// Cancels every [`CancelToken`] created alongside it.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

/// Observes a [`Canceller`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
    // Held by tokens that can never fire.
    _keep: Option<Arc<Sender<()>>>,
}

/// Create a connected canceller/token pair.
pub fn cancel_pair() -> (Canceller, CancelToken) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (
        Canceller {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        CancelToken { rx, _keep: None },
    )
}

impl Canceller {
    /// Fire the signal.  Idempotent.
    pub fn cancel(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            rx,
            _keep: Some(Arc::new(tx)),
        }
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel that becomes ready (disconnected) on cancellation.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_reaches_every_clone() {
        let (canceller, token) = cancel_pair();
        let other = token.clone();
        assert!(!token.is_cancelled());
        canceller.cancel();
        assert!(token.is_cancelled());
        assert!(other.is_cancelled());
        canceller.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_stays_live() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
        assert!(token
            .receiver()
            .recv_timeout(Duration::from_millis(20))
            .is_err());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_blocked_select() {
        let (canceller, token) = cancel_pair();
        let waiter = std::thread::spawn(move || {
            let (_tx, idle) = crossbeam_channel::bounded::<()>(0);
            crossbeam_channel::select! {
                recv(idle) -> _ => false,
                recv(token.receiver()) -> _ => true,
            }
        });
        std::thread::sleep(Duration::from_millis(50));
        canceller.cancel();
        assert!(waiter.join().unwrap());
    }
}
