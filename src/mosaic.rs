//! Mosaic state machine.
//!
//! [`Mosaic`] is the pure part of the window manager: the root size, pane
//! order, fullscreen mode and audio focus.  [`Mosaic::step`] applies one
//! [`Input`] and returns the next state together with the [`Effect`]s the
//! manager must carry out, in order.  No surface or player is touched here.

use crate::command::{Direction, Source};
use crate::layout::{Layout, NormalizedRect, Rect};
use crate::traits::SurfaceId;
use std::fmt;

/// How panes are arranged outside fullscreen.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Arrangement {
    /// Grid sized to the pane count.
    #[default]
    Auto,
    /// Fixed rectangles; pane `i` uses rectangle `i`.
    Manual(Vec<NormalizedRect>),
}

impl Arrangement {
    /// Maximum number of panes, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Arrangement::Auto => None,
            Arrangement::Manual(rects) => Some(rects.len()),
        }
    }

    /// Layout for `count` panes.
    pub fn layout_for(&self, count: usize) -> Layout {
        match self {
            Arrangement::Auto => Layout::Grid(count),
            Arrangement::Manual(rects) => Layout::Manual(rects.iter().take(count).copied().collect()),
        }
    }
}

/// Display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Fullscreen(SurfaceId),
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Fullscreen(surface) => write!(f, "fullscreen {}", surface),
        }
    }
}

/// Everything that can change the mosaic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The root surface changed size.
    Resize { width: u32, height: u32 },
    /// Double click on a pane.
    ToggleFullscreen(SurfaceId),
    /// Return to the mosaic.
    Clear,
    /// Single click on a pane.
    Focus(SurfaceId),
    /// Fullscreen the pane at this index.
    SelectIndex(usize),
    /// Move the fullscreen pane.
    Cycle(Direction),
    /// New panes, appended in order.
    Attach(Vec<SurfaceId>),
    /// A pane went away.
    Detach(SurfaceId),
}

/// A side effect requested by [`Mosaic::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Configure { surface: SurfaceId, rect: Rect },
    Raise(SurfaceId),
    Play { surface: SurfaceId, source: Source },
    Stop(SurfaceId),
    Mute { surface: SurfaceId, mute: bool },
}

/// Mosaic state.
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    width: u32,
    height: u32,
    panes: Vec<SurfaceId>,
    mode: Mode,
    focused: Option<SurfaceId>,
    background: bool,
    arrangement: Arrangement,
    layout: Layout,
}

impl Mosaic {
    /// An empty mosaic.  `background` keeps non-fullscreen panes playing
    /// muted instead of stopping them.
    pub fn new(arrangement: Arrangement, background: bool, width: u32, height: u32) -> Self {
        let layout = arrangement.layout_for(0);
        Self {
            width,
            height,
            panes: Vec::new(),
            mode: Mode::Normal,
            focused: None,
            background,
            arrangement,
            layout,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn panes(&self) -> &[SurfaceId] {
        &self.panes
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn focused(&self) -> Option<SurfaceId> {
        self.focused
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    /// Whether another pane fits the arrangement.
    pub fn has_room(&self) -> bool {
        self.arrangement
            .capacity()
            .map_or(true, |cap| self.panes.len() < cap)
    }

    pub fn contains(&self, surface: SurfaceId) -> bool {
        self.panes.contains(&surface)
    }

    /// Apply `input`, returning the next state and the effects to run.
    pub fn step(&self, input: &Input) -> (Mosaic, Vec<Effect>) {
        let mut next = self.clone();
        let effects = next.apply(input);
        (next, effects)
    }

    fn apply(&mut self, input: &Input) -> Vec<Effect> {
        match input {
            Input::Resize { width, height } => {
                if (*width, *height) == (self.width, self.height) {
                    return Vec::new();
                }
                self.width = *width;
                self.height = *height;
                self.arrange()
            }
            Input::ToggleFullscreen(surface) => match self.mode {
                Mode::Fullscreen(_) => self.enter(Mode::Normal),
                Mode::Normal if self.contains(*surface) => self.enter(Mode::Fullscreen(*surface)),
                Mode::Normal => Vec::new(),
            },
            Input::Clear => match self.mode {
                Mode::Fullscreen(_) => self.enter(Mode::Normal),
                Mode::Normal => Vec::new(),
            },
            Input::Focus(surface) => self.focus(*surface),
            Input::SelectIndex(index) => match self.panes.get(*index) {
                Some(&surface) if self.mode != Mode::Fullscreen(surface) => {
                    self.enter(Mode::Fullscreen(surface))
                }
                _ => Vec::new(),
            },
            Input::Cycle(direction) => match self.cycle_target(*direction) {
                Some(surface) if self.mode != Mode::Fullscreen(surface) => {
                    self.enter(Mode::Fullscreen(surface))
                }
                _ => Vec::new(),
            },
            Input::Attach(surfaces) => {
                if surfaces.is_empty() {
                    return Vec::new();
                }
                self.panes.extend(surfaces.iter().copied());
                self.layout = self.arrangement.layout_for(self.panes.len());
                self.update()
            }
            Input::Detach(surface) => {
                let Some(index) = self.panes.iter().position(|s| s == surface) else {
                    return Vec::new();
                };
                self.panes.remove(index);
                if self.mode == Mode::Fullscreen(*surface) {
                    self.mode = Mode::Normal;
                }
                if self.focused == Some(*surface) {
                    self.focused = None;
                }
                self.layout = self.arrangement.layout_for(self.panes.len());
                self.update()
            }
        }
    }

    fn enter(&mut self, mode: Mode) -> Vec<Effect> {
        if let Mode::Fullscreen(surface) = mode {
            self.focused = Some(surface);
        }
        self.mode = mode;
        self.update()
    }

    fn focus(&mut self, surface: SurfaceId) -> Vec<Effect> {
        if !self.contains(surface) || self.focused == Some(surface) {
            return Vec::new();
        }
        let previous = self.focused.replace(surface);
        if self.mode != Mode::Normal {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(previous) = previous.filter(|p| self.contains(*p)) {
            effects.push(Effect::Mute {
                surface: previous,
                mute: true,
            });
        }
        effects.push(Effect::Mute {
            surface,
            mute: false,
        });
        effects
    }

    fn cycle_target(&self, direction: Direction) -> Option<SurfaceId> {
        let len = self.panes.len();
        if len == 0 {
            return None;
        }
        let index = match (self.mode, direction) {
            (Mode::Normal, Direction::Left) => len - 1,
            (Mode::Normal, Direction::Right) => 0,
            (Mode::Fullscreen(current), _) => {
                let at = self.panes.iter().position(|s| *s == current)?;
                match direction {
                    Direction::Left => (at + len - 1) % len,
                    Direction::Right => (at + 1) % len,
                }
            }
        };
        Some(self.panes[index])
    }

    /// Geometry effects: layout rectangles for every pane, the full root for
    /// the fullscreen pane, which is then raised.
    fn arrange(&self) -> Vec<Effect> {
        let rects = self.layout.apply(self.width, self.height);
        let mut effects: Vec<Effect> = self
            .panes
            .iter()
            .zip(rects)
            .map(|(&surface, rect)| match self.mode {
                Mode::Fullscreen(full) if full == surface => Effect::Configure {
                    surface,
                    rect: Rect::new(0, 0, self.width, self.height),
                },
                _ => Effect::Configure { surface, rect },
            })
            .collect();
        if let Mode::Fullscreen(surface) = self.mode {
            effects.push(Effect::Raise(surface));
        }
        effects
    }

    /// Geometry followed by playback for every pane.
    fn update(&self) -> Vec<Effect> {
        let mut effects = self.arrange();
        for &surface in &self.panes {
            match self.mode {
                Mode::Fullscreen(full) if full == surface => {
                    effects.push(Effect::Play {
                        surface,
                        source: Source::Main,
                    });
                    effects.push(Effect::Mute {
                        surface,
                        mute: false,
                    });
                }
                Mode::Fullscreen(_) if !self.background => effects.push(Effect::Stop(surface)),
                Mode::Fullscreen(_) => {
                    effects.push(Effect::Mute {
                        surface,
                        mute: true,
                    });
                    effects.push(Effect::Play {
                        surface,
                        source: Source::Sub,
                    });
                }
                Mode::Normal => {
                    let mute = self.focused != Some(surface);
                    effects.push(Effect::Mute { surface, mute });
                    effects.push(Effect::Play {
                        surface,
                        source: Source::Sub,
                    });
                }
            }
        }
        effects
    }
}

//  Tests
