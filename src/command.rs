//! Commands and types used throughout xmosaic.
//!
//! This module defines the vocabulary that all components share:
//! [`Hotkey`] describes every keyboard action the manager reacts to,
//! [`PlayerCommand`] every instruction a player accepts, and
//! [`Direction`] / [`Source`] provide the supporting data types.
//!
//! Hotkeys are bound to fixed X11 keycodes of a US QWERTY keyboard on the
//! evdev driver.  They are not remappable.

use std::fmt;

/// Direction for cycling the fullscreen pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// Which of a stream's two URLs a pane should play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Full quality stream, used fullscreen.
    Main,
    /// Preview stream, used in the mosaic.
    Sub,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Main => write!(f, "main"),
            Source::Sub => write!(f, "sub"),
        }
    }
}

/// Keyboard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hotkey {
    /// Release every player and exit.
    Quit,
    /// Make the pane at this 0-based index fullscreen.
    Fullscreen(usize),
    /// Move the fullscreen pane one step in pane order.
    Cycle(Direction),
    /// Return to the mosaic.
    Clear,
    /// Attach the next configured stream as a new pane.
    AddPane,
    /// Detach the fullscreen, focused, or last pane.
    RemovePane,
}

const KEY_ESCAPE: u8 = 9;
const KEY_1: u8 = 10;
const KEY_9: u8 = 18;
const KEY_BACKSPACE: u8 = 22;
const KEY_Q: u8 = 24;
const KEY_SPACE: u8 = 65;
const KEY_LEFT: u8 = 113;
const KEY_RIGHT: u8 = 114;
const KEY_DELETE: u8 = 119;

impl Hotkey {
    /// Map an X11 keycode to a hotkey.
    pub fn from_keycode(keycode: u8) -> Option<Hotkey> {
        match keycode {
            KEY_Q => Some(Hotkey::Quit),
            KEY_1..=KEY_9 => Some(Hotkey::Fullscreen((keycode - KEY_1) as usize)),
            KEY_LEFT => Some(Hotkey::Cycle(Direction::Left)),
            KEY_RIGHT => Some(Hotkey::Cycle(Direction::Right)),
            KEY_BACKSPACE | KEY_ESCAPE => Some(Hotkey::Clear),
            KEY_SPACE => Some(Hotkey::AddPane),
            KEY_DELETE => Some(Hotkey::RemovePane),
            _ => None,
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hotkey::Quit => write!(f, "quit"),
            Hotkey::Fullscreen(index) => write!(f, "fullscreen {}", index),
            Hotkey::Cycle(dir) => write!(f, "cycle {}", dir),
            Hotkey::Clear => write!(f, "clear"),
            Hotkey::AddPane => write!(f, "add pane"),
            Hotkey::RemovePane => write!(f, "remove pane"),
        }
    }
}

/// Every instruction a player accepts over its command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Load and play this URL.  No-op if it is already loaded.
    Play(String),
    /// Stop playback.  No-op if nothing is loaded.
    Stop,
    /// Mute or unmute audio.  No-op if already in that state.
    Mute(bool),
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Play(url) => write!(f, "play {}", url),
            PlayerCommand::Stop => write!(f, "stop"),
            PlayerCommand::Mute(true) => write!(f, "mute"),
            PlayerCommand::Mute(false) => write!(f, "unmute"),
        }
    }
}
