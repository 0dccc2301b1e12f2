//! [`EventSource`] implementation over an X11 connection.

use super::X11Error;
use crate::click::Press;
use crate::traits::{DisplayEvent, EventSource, Received, SurfaceId};
use std::io::ErrorKind;
use std::sync::Arc;
use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

/// Blocking reader of X11 events.
pub struct X11EventSource {
    conn: Arc<RustConnection>,
}

impl X11EventSource {
    pub fn new(conn: Arc<RustConnection>) -> Self {
        Self { conn }
    }
}

/// Translate one X11 event.
pub fn translate(event: Event) -> Received {
    match event {
        Event::ConfigureNotify(e) => Received::Event(DisplayEvent::Configure {
            surface: SurfaceId(e.window),
            width: e.width.into(),
            height: e.height.into(),
        }),
        Event::ButtonPress(e) => Received::Event(DisplayEvent::Button(Press {
            button: e.detail,
            time: e.time,
            child: SurfaceId(e.child),
        })),
        Event::KeyPress(e) => Received::Event(DisplayEvent::Key(e.detail)),
        Event::DestroyNotify(e) => Received::Event(DisplayEvent::Destroyed(SurfaceId(e.window))),
        Event::Error(e) => Received::ProtocolError(format!("{:?}", e)),
        _ => Received::Ignored,
    }
}

impl EventSource for X11EventSource {
    type Error = X11Error;

    fn next(&mut self) -> Result<Received, X11Error> {
        match self.conn.wait_for_event() {
            Ok(event) => Ok(translate(event)),
            Err(ConnectionError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                Ok(Received::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }
}

//  Tests
