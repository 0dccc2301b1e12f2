//! Single/double click classification.
//!
//! The display server timestamps every button press.  [`ClickClassifier`]
//! holds at most one pending press; a second press of the same button
//! within the click window turns it into a double click, anything else
//! flushes it as a single click.  A pending press that sees no follow-up is
//! flushed when the classifier's timer expires, which the owner drives by
//! waiting until [`ClickClassifier::deadline`] and calling
//! [`ClickClassifier::expire`].
//!
//! Every press yields exactly one [`Click`], in press order.

use crate::traits::SurfaceId;
use std::time::{Duration, Instant};

/// Default double-click window.
pub const DEFAULT_CLICK_WINDOW: Duration = Duration::from_millis(500);

/// A pointer button press as reported by the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Press {
    /// Pointer button (1 = left, 2 = middle, 3 = right).
    pub button: u8,
    /// Server timestamp in milliseconds.  Wraps around.
    pub time: u32,
    /// Child surface of the root under the pointer.
    pub child: SurfaceId,
}

/// A classified click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Single(Press),
    Double(Press),
}

#[derive(Debug)]
struct Pending {
    press: Press,
    deadline: Instant,
}

/// Timing state machine turning presses into [`Click`]s.
#[derive(Debug)]
pub struct ClickClassifier {
    window: Duration,
    pending: Option<Pending>,
}

impl Default for ClickClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CLICK_WINDOW)
    }
}

impl ClickClassifier {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Feed a press observed at local time `now`.
    ///
    /// Returns the double click completed by this press, or the previously
    /// pending press flushed as a single click.  `None` means the press is
    /// now pending.
    pub fn press(&mut self, press: Press, now: Instant) -> Option<Click> {
        let Some(pending) = self.pending.take() else {
            self.hold(press, now);
            return None;
        };

        let previous = pending.press;
        let elapsed = press.time.wrapping_sub(previous.time) as u128;
        if press.button == previous.button && elapsed < self.window.as_millis() {
            return Some(Click::Double(press));
        }

        self.hold(press, now);
        Some(Click::Single(previous))
    }

    /// Flush the pending press if its timer has run out.
    pub fn expire(&mut self, now: Instant) -> Option<Click> {
        match &self.pending {
            Some(pending) if now >= pending.deadline => {
                self.pending.take().map(|p| Click::Single(p.press))
            }
            _ => None,
        }
    }

    /// When the pending press should be flushed, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    fn hold(&mut self, press: Press, now: Instant) {
        self.pending = Some(Pending {
            press,
            deadline: now + self.window,
        });
    }
}

//  Tests
