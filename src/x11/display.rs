//! [`Display`] implementation over an X11 connection.

use super::events::X11EventSource;
use super::X11Error;
use crate::layout::Rect;
use crate::resources::{BoxError, Closer};
use crate::traits::{Display, SurfaceId};
use log::{debug, info};
use std::sync::Arc;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, StackMode, Window,
    WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::COPY_DEPTH_FROM_PARENT;
use x11rb::COPY_FROM_PARENT;

/// The mosaic's top-level window on an X11 display.
///
/// Every request is checked, so errors surface at the call that caused
/// them.
pub struct X11Display {
    conn: Arc<RustConnection>,
    root: Window,
    black: u32,
    size: (u32, u32),
}

impl X11Display {
    /// Connect to `$DISPLAY`, create and map a black window covering the
    /// screen and return it together with an event source for the same
    /// connection.
    pub fn open() -> Result<(Self, X11EventSource), X11Error> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or(X11Error::NoScreen(screen_num))?;
        let (parent, black) = (screen.root, screen.black_pixel);
        let (width, height) = (screen.width_in_pixels, screen.height_in_pixels);
        let depth = screen.root_depth;
        let visual = screen.root_visual;

        let root = conn.generate_id()?;
        let aux = CreateWindowAux::new().background_pixel(black).event_mask(
            EventMask::STRUCTURE_NOTIFY | EventMask::KEY_PRESS | EventMask::BUTTON_PRESS,
        );
        conn.create_window(
            depth,
            root,
            parent,
            0,
            0,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &aux,
        )?
        .check()?;
        if let Err(e) = conn.map_window(root)?.check() {
            let _ = conn.destroy_window(root);
            let _ = conn.flush();
            return Err(e.into());
        }
        info!("created {}x{} window {:#x}", width, height, root);

        let conn = Arc::new(conn);
        let display = Self {
            conn: conn.clone(),
            root,
            black,
            size: (width.into(), height.into()),
        };
        Ok((display, X11EventSource::new(conn)))
    }

    /// Release step that destroys the top-level window.  Destroying it
    /// also wakes the event source with a destroy notification.
    pub fn root_closer(&self) -> Closer {
        let conn = self.conn.clone();
        let root = self.root;
        Box::new(move || -> Result<(), BoxError> {
            conn.destroy_window(root)?.check()?;
            Ok(())
        })
    }
}

fn window(surface: SurfaceId) -> Window {
    surface.0
}

fn clamp16(v: u32) -> u16 {
    v.min(u16::MAX as u32) as u16
}

impl Display for X11Display {
    type Error = X11Error;

    fn root(&self) -> SurfaceId {
        SurfaceId(self.root)
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn create_surface(&self) -> Result<SurfaceId, X11Error> {
        let wid = self.conn.generate_id()?;
        let aux = CreateWindowAux::new().background_pixel(self.black);
        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                wid,
                self.root,
                0,
                0,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                COPY_FROM_PARENT,
                &aux,
            )?
            .check()?;
        if let Err(e) = self.conn.map_window(wid)?.check() {
            let _ = self.conn.destroy_window(wid);
            return Err(e.into());
        }
        debug!("created window {:#x}", wid);
        Ok(SurfaceId(wid))
    }

    fn configure(&self, surface: SurfaceId, rect: Rect) -> Result<(), X11Error> {
        let aux = ConfigureWindowAux::new()
            .x(rect.x.min(i32::MAX as u32) as i32)
            .y(rect.y.min(i32::MAX as u32) as i32)
            .width(u32::from(clamp16(rect.width.max(1))))
            .height(u32::from(clamp16(rect.height.max(1))));
        self.conn.configure_window(window(surface), &aux)?.check()?;
        Ok(())
    }

    fn raise(&self, surface: SurfaceId) -> Result<(), X11Error> {
        let aux = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        self.conn.configure_window(window(surface), &aux)?.check()?;
        Ok(())
    }

    fn destroy_surface(&self, surface: SurfaceId) -> Result<(), X11Error> {
        self.conn.destroy_window(window(surface))?.check()?;
        debug!("destroyed window {}", surface);
        Ok(())
    }
}
