//! Windows, input events and the application loop.
//!
//! Native input is normalized into [`Event`]s and handed to the
//! [`WindowCallback`] of the window it belongs to. Presentation is not done
//! here; [`WinitSystem::raw_window_handle`] exposes what a swapchain needs.

use thiserror::Error;

pub mod event;
pub use event::{dispatch, Event, KeyEvent, MouseButton, MouseEvent, WHEEL_DELTA};

pub mod keys;
pub use keys::{Key, KeyTable, KeyTranslator};

pub mod registry;
pub use registry::{WindowEntry, WindowRegistry};

#[cfg(feature = "fresco-winit")]
pub mod winit_system;
#[cfg(feature = "fresco-winit")]
pub use winit_system::WinitSystem;

/// Identifies a window for as long as it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowMode {
    #[default]
    Normal,
    Minimized,
    Maximized,
    FullScreen,
}

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("unable to create window: {0}")]
    UnableToCreateWindow(String),
    #[error("window {0:?} is not registered")]
    UnknownWindow(WindowId),
    #[error("event loop: {0}")]
    EventLoop(String),
}

/// Per-window event sink. Only `on_render` is required.
pub trait WindowCallback {
    fn on_render(&mut self, win: WindowId);
    fn on_resize(&mut self, _win: WindowId, _width: u32, _height: u32) {}
    fn on_mouse_down(&mut self, _win: WindowId, _e: &MouseEvent) {}
    fn on_mouse_up(&mut self, _win: WindowId, _e: &MouseEvent) {}
    fn on_mouse_move(&mut self, _win: WindowId, _e: &MouseEvent) {}
    fn on_mouse_wheel(&mut self, _win: WindowId, _e: &MouseEvent) {}
    fn on_key_down(&mut self, _win: WindowId, _e: &KeyEvent) {}
    fn on_key_up(&mut self, _win: WindowId, _e: &KeyEvent) {}
}

pub trait AppCallback {
    /// Called once per loop iteration. Returning 0 reports an idle tick and
    /// the loop sleeps for a millisecond.
    fn on_timer(&mut self) -> u64;
}
