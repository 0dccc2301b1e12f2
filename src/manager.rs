//! The window manager that ties the display, the players and the mosaic
//! state together.
//!
//! [`Manager`] owns every pane: its surface, its stream and its player.  It
//! turns [`DisplayEvent`]s into mosaic [`Input`]s, runs
//! [`Mosaic::step`] and executes the resulting [`Effect`]s against the
//! [`Display`] and the [`Player`]s, in order.
//!
//! All surface calls and state changes happen on the thread that calls
//! [`Manager::run`].  Players run on their own threads and are only reached
//! through [`Player`] calls.
//!
//! # Typical usage
//!
//! ```ignore
//! let mut manager = Manager::new(display, factory, streams, options, cancel);
//! manager.start()?;
//! manager.run(&events);
//! manager.release()?;
//! ```

use crate::cancel::CancelToken;
use crate::click::{Click, ClickClassifier, Press};
use crate::command::Hotkey;
use crate::config::{Config, ConfigError, StreamConfig};
use crate::layout::Rect;
use crate::mosaic::{Arrangement, Effect, Input, Mode, Mosaic};
use crate::player::PlayerError;
use crate::resources::TeardownError;
use crate::traits::{Display, DisplayEvent, Player, PlayerFactory, SurfaceId};
use crossbeam_channel::{at, never, select, Receiver};
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

const BUTTON_LEFT: u8 = 1;
const BUTTON_RIGHT: u8 = 3;

/// Possible errors from the manager.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The display refused a request.
    #[error("display error: {0}")]
    Display(String),
    /// A player could not be created.
    #[error("player for {stream}: {source}")]
    Player {
        stream: String,
        #[source]
        source: PlayerError,
    },
    /// A player creation thread panicked.
    #[error("player creation for {0} panicked")]
    Panicked(String),
}

/// Manager settings.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub arrangement: Arrangement,
    /// Keep background panes playing muted while one is fullscreen.
    pub background: bool,
    pub click_window: Duration,
}

impl Options {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            arrangement: config.arrangement()?,
            background: config.background,
            click_window: config.click_window(),
        })
    }
}

/// Whether the event loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One on-screen pane.
pub struct Pane<P> {
    pub surface: SurfaceId,
    pub stream: StreamConfig,
    /// Last rectangle applied to the surface.
    pub rect: Option<Rect>,
    /// Last mute state the player accepted.
    pub muted: bool,
    /// Last URL the player accepted.
    pub url: Option<String>,
    player: P,
}

/// Owns the panes and drives them from display events.
pub struct Manager<D: Display, F: PlayerFactory> {
    display: D,
    factory: F,
    streams: Vec<StreamConfig>,
    next_stream: usize,
    panes: Vec<Pane<F::Player>>,
    mosaic: Mosaic,
    clicks: ClickClassifier,
    cancel: CancelToken,
}

impl<D: Display, F: PlayerFactory> Manager<D, F> {
    /// Create a manager with no panes.
    ///
    /// `cancel` aborts player calls that are still waiting when the process
    /// shuts down.
    pub fn new(
        display: D,
        factory: F,
        streams: Vec<StreamConfig>,
        options: Options,
        cancel: CancelToken,
    ) -> Self {
        let (width, height) = display.size();
        Self {
            display,
            factory,
            streams,
            next_stream: 0,
            panes: Vec::new(),
            mosaic: Mosaic::new(options.arrangement, options.background, width, height),
            clicks: ClickClassifier::new(options.click_window),
            cancel,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn mosaic(&self) -> &Mosaic {
        &self.mosaic
    }

    pub fn panes(&self) -> &[Pane<F::Player>] {
        &self.panes
    }

    pub fn pane(&self, surface: SurfaceId) -> Option<&Pane<F::Player>> {
        self.panes.iter().find(|p| p.surface == surface)
    }

    /// Attach the initial panes: one per configured stream, up to what the
    /// arrangement can hold.
    pub fn start(&mut self) -> Result<(), ManagerError> {
        let count = self
            .mosaic
            .arrangement()
            .capacity()
            .map_or(self.streams.len(), |cap| cap.min(self.streams.len()));
        let streams = self.streams[..count].to_vec();
        self.next_stream = if self.streams.is_empty() {
            0
        } else {
            count % self.streams.len()
        };
        info!("starting {} of {} streams", count, self.streams.len());
        self.attach_batch(&streams)
    }

    /// Attach several panes at once.
    ///
    /// Surfaces are created first, then all players concurrently.  If any
    /// player fails, every player of the batch that did start is closed and
    /// every surface of the batch destroyed before the error is returned.
    pub fn attach_batch(&mut self, streams: &[StreamConfig]) -> Result<(), ManagerError> {
        if streams.is_empty() {
            return Ok(());
        }
        let mut surfaces = Vec::with_capacity(streams.len());
        for _ in streams {
            match self.display.create_surface() {
                Ok(surface) => surfaces.push(surface),
                Err(e) => {
                    self.destroy_surfaces(&surfaces);
                    return Err(ManagerError::Display(e.to_string()));
                }
            }
        }

        let factory = &self.factory;
        let results: Vec<Result<F::Player, ManagerError>> = thread::scope(|scope| {
            let workers: Vec<_> = surfaces
                .iter()
                .zip(streams)
                .map(|(&surface, stream)| {
                    let worker = scope.spawn(move || factory.create(surface, stream));
                    (stream, worker)
                })
                .collect();
            workers
                .into_iter()
                .map(|(stream, worker)| match worker.join() {
                    Ok(result) => result.map_err(|source| ManagerError::Player {
                        stream: stream.id.clone(),
                        source,
                    }),
                    Err(_) => Err(ManagerError::Panicked(stream.id.clone())),
                })
                .collect()
        });

        let mut players = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(player) => players.push(player),
                Err(e) if failure.is_none() => failure = Some(e),
                Err(e) => warn!("{}", e),
            }
        }
        if let Some(e) = failure {
            let never = CancelToken::never();
            for player in &players {
                if let Err(e) = player.close(&never) {
                    warn!("failed to release player: {}", e);
                }
            }
            self.destroy_surfaces(&surfaces);
            return Err(e);
        }

        for ((surface, stream), player) in surfaces.iter().zip(streams).zip(players) {
            info!("attached {} as {}", stream.id, surface);
            self.panes.push(Pane {
                surface: *surface,
                stream: stream.clone(),
                rect: None,
                muted: false,
                url: None,
                player,
            });
        }
        self.apply(Input::Attach(surfaces));
        Ok(())
    }

    /// Attach one pane.  The surface is destroyed again if its player
    /// cannot be created.
    pub fn attach(&mut self, stream: StreamConfig) -> Result<SurfaceId, ManagerError> {
        let surface = self
            .display
            .create_surface()
            .map_err(|e| ManagerError::Display(e.to_string()))?;
        let player = match self.factory.create(surface, &stream) {
            Ok(player) => player,
            Err(source) => {
                self.destroy_surfaces(&[surface]);
                return Err(ManagerError::Player {
                    stream: stream.id,
                    source,
                });
            }
        };
        info!("attached {} as {}", stream.id, surface);
        self.panes.push(Pane {
            surface,
            stream,
            rect: None,
            muted: false,
            url: None,
            player,
        });
        self.apply(Input::Attach(vec![surface]));
        Ok(surface)
    }

    /// Release a pane's player, destroy its surface and lay out the rest.
    pub fn detach(&mut self, surface: SurfaceId) {
        let Some(index) = self.panes.iter().position(|p| p.surface == surface) else {
            debug!("detach: {} is not a pane", surface);
            return;
        };
        let pane = self.panes.remove(index);
        if let Err(e) = pane.player.close(&CancelToken::never()) {
            warn!("{}: failed to release player: {}", pane.stream.id, e);
        }
        self.destroy_surfaces(&[surface]);
        info!("detached {} ({})", pane.stream.id, surface);
        self.apply(Input::Detach(surface));
    }

    /// React to one display event observed at local time `now`.
    pub fn handle(&mut self, event: DisplayEvent, now: Instant) -> Flow {
        match event {
            DisplayEvent::Configure {
                surface,
                width,
                height,
            } if surface == self.display.root() => {
                debug!("root is {}x{}", width, height);
                self.apply(Input::Resize { width, height });
            }
            DisplayEvent::Configure { .. } => {}
            DisplayEvent::Destroyed(surface) if surface == self.display.root() => {
                info!("root surface destroyed");
                return Flow::Quit;
            }
            DisplayEvent::Destroyed(surface) => self.forget(surface),
            DisplayEvent::Key(keycode) => match Hotkey::from_keycode(keycode) {
                Some(hotkey) => return self.hotkey(hotkey),
                None => debug!("unbound key {}", keycode),
            },
            DisplayEvent::Button(press) => {
                if let Some(click) = self.clicks.press(press, now) {
                    self.click(click);
                }
            }
        }
        Flow::Continue
    }

    /// Flush a pending single click whose timer ran out.
    pub fn expire_clicks(&mut self, now: Instant) {
        if let Some(click) = self.clicks.expire(now) {
            self.click(click);
        }
    }

    /// Process events until quit, the end of the event stream or
    /// cancellation.
    pub fn run(&mut self, events: &Receiver<DisplayEvent>) {
        let cancel = self.cancel.clone();
        loop {
            let deadline = self.clicks.deadline().map_or_else(never, at);
            select! {
                recv(events) -> event => match event {
                    Ok(event) => {
                        if self.handle(event, Instant::now()) == Flow::Quit {
                            info!("quit");
                            return;
                        }
                    }
                    Err(_) => {
                        info!("event stream ended");
                        return;
                    }
                },
                recv(deadline) -> _ => self.expire_clicks(Instant::now()),
                recv(cancel.receiver()) -> _ => {
                    info!("shutting down");
                    return;
                }
            }
        }
    }

    /// Close every player and destroy every pane surface.  Each pane is
    /// released exactly once; later calls do nothing.
    pub fn release(&mut self) -> Result<(), TeardownError> {
        let never = CancelToken::never();
        let mut errors = TeardownError::default();
        for pane in self.panes.drain(..) {
            if let Err(e) = pane.player.close(&never) {
                errors.push(&pane.stream.id, e);
            }
            if let Err(e) = self.display.destroy_surface(pane.surface) {
                errors.push(&format!("surface {}", pane.surface), e);
            }
        }
        errors.into_result()
    }

    fn hotkey(&mut self, hotkey: Hotkey) -> Flow {
        debug!("hotkey {}", hotkey);
        match hotkey {
            Hotkey::Quit => return Flow::Quit,
            Hotkey::Fullscreen(index) => self.apply(Input::SelectIndex(index)),
            Hotkey::Cycle(direction) => self.apply(Input::Cycle(direction)),
            Hotkey::Clear => self.apply(Input::Clear),
            Hotkey::AddPane => self.add_next(),
            Hotkey::RemovePane => {
                let target = match self.mosaic.mode() {
                    Mode::Fullscreen(surface) => Some(surface),
                    Mode::Normal => self
                        .mosaic
                        .focused()
                        .or_else(|| self.mosaic.panes().last().copied()),
                };
                if let Some(surface) = target {
                    self.detach(surface);
                }
            }
        }
        Flow::Continue
    }

    fn click(&mut self, click: Click) {
        debug!("{:?}", click);
        match click {
            Click::Single(Press {
                button: BUTTON_RIGHT,
                ..
            })
            | Click::Double(Press {
                button: BUTTON_RIGHT,
                ..
            }) => self.apply(Input::Clear),
            Click::Single(Press {
                button: BUTTON_LEFT,
                child,
                ..
            }) => self.apply(Input::Focus(child)),
            Click::Double(Press {
                button: BUTTON_LEFT,
                child,
                ..
            }) => self.apply(Input::ToggleFullscreen(child)),
            Click::Single(_) | Click::Double(_) => {}
        }
    }

    /// Attach the next configured stream, round-robin.
    fn add_next(&mut self) {
        if self.streams.is_empty() {
            return;
        }
        if !self.mosaic.has_room() {
            info!("layout is full");
            return;
        }
        let stream = self.streams[self.next_stream].clone();
        self.next_stream = (self.next_stream + 1) % self.streams.len();
        if let Err(e) = self.attach(stream) {
            warn!("failed to add pane: {}", e);
        }
    }

    /// Drop a pane whose surface is already gone.
    fn forget(&mut self, surface: SurfaceId) {
        let Some(index) = self.panes.iter().position(|p| p.surface == surface) else {
            return;
        };
        let pane = self.panes.remove(index);
        warn!("{}: surface {} destroyed externally", pane.stream.id, surface);
        if let Err(e) = pane.player.close(&CancelToken::never()) {
            warn!("{}: failed to release player: {}", pane.stream.id, e);
        }
        self.apply(Input::Detach(surface));
    }

    fn destroy_surfaces(&self, surfaces: &[SurfaceId]) {
        for &surface in surfaces {
            if let Err(e) = self.display.destroy_surface(surface) {
                warn!("failed to destroy {}: {}", surface, e);
            }
        }
    }

    fn apply(&mut self, input: Input) {
        let (next, effects) = self.mosaic.step(&input);
        if next.mode() != self.mosaic.mode() {
            info!("mode: {}", next.mode());
        }
        self.mosaic = next;
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        let Some(index) = self.panes.iter().position(|p| {
            p.surface
                == match effect {
                    Effect::Configure { surface, .. }
                    | Effect::Raise(surface)
                    | Effect::Play { surface, .. }
                    | Effect::Stop(surface)
                    | Effect::Mute { surface, .. } => surface,
                }
        }) else {
            return;
        };
        let pane = &mut self.panes[index];
        let result = match effect {
            Effect::Configure { surface, rect } => {
                match self.display.configure(surface, rect) {
                    Ok(()) => pane.rect = Some(rect),
                    Err(e) => warn!("configure {}: {}", surface, e),
                }
                return;
            }
            Effect::Raise(surface) => {
                if let Err(e) = self.display.raise(surface) {
                    warn!("raise {}: {}", surface, e);
                }
                return;
            }
            Effect::Play { source, .. } => {
                let url = pane.stream.url(source).to_string();
                pane.player
                    .play(&url, &self.cancel)
                    .map(|()| pane.url = Some(url))
            }
            Effect::Stop(_) => pane.player.stop(&self.cancel).map(|()| pane.url = None),
            Effect::Mute { mute, .. } => pane.player.mute(mute, &self.cancel).map(|()| pane.muted = mute),
        };
        match result {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("{}: {:?} cancelled", pane.stream.id, effect),
            Err(e) => warn!("{}: {}", pane.stream.id, e),
        }
    }
}

impl<D: Display, F: PlayerFactory> Drop for Manager<D, F> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("{}", e);
        }
    }
}

//  Tests
