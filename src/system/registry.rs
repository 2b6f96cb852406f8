use std::collections::BTreeMap;

use super::event::{self, Event};
use super::{SystemError, WindowCallback, WindowId};

pub struct WindowEntry<W> {
    pub window: W,
    pub callback: Box<dyn WindowCallback>,
    /// Last cursor position seen by a mouse event.
    pub cursor: (i32, i32),
}

/// Live windows of one windowing system, in creation order.
pub struct WindowRegistry<W> {
    next: u64,
    windows: BTreeMap<WindowId, WindowEntry<W>>,
}

impl<W> Default for WindowRegistry<W> {
    fn default() -> Self {
        Self {
            next: 1,
            windows: BTreeMap::new(),
        }
    }
}

impl<W> WindowRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, window: W, callback: Box<dyn WindowCallback>) -> WindowId {
        let id = WindowId::from_raw(self.next);
        self.next += 1;
        self.windows.insert(
            id,
            WindowEntry {
                window,
                callback,
                cursor: (0, 0),
            },
        );
        id
    }

    pub fn deregister(&mut self, id: WindowId) -> Result<W, SystemError> {
        self.windows
            .remove(&id)
            .map(|e| e.window)
            .ok_or(SystemError::UnknownWindow(id))
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn window(&self, id: WindowId) -> Result<&W, SystemError> {
        self.windows
            .get(&id)
            .map(|e| &e.window)
            .ok_or(SystemError::UnknownWindow(id))
    }

    pub fn window_mut(&mut self, id: WindowId) -> Result<&mut W, SystemError> {
        self.windows
            .get_mut(&id)
            .map(|e| &mut e.window)
            .ok_or(SystemError::UnknownWindow(id))
    }

    pub fn cursor(&self, id: WindowId) -> Option<(i32, i32)> {
        self.windows.get(&id).map(|e| e.cursor)
    }

    pub fn find(&self, pred: impl Fn(&W) -> bool) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|(_, e)| pred(&e.window))
            .map(|(id, _)| *id)
    }

    pub fn dispatch(&mut self, id: WindowId, event: Event) -> Result<(), SystemError> {
        let entry = self
            .windows
            .get_mut(&id)
            .ok_or(SystemError::UnknownWindow(id))?;
        if let Some(m) = event.mouse() {
            entry.cursor = (m.x, m.y);
        }
        event::dispatch(entry.callback.as_mut(), id, event);
        Ok(())
    }

    /// Send `Render` to every live window once.
    pub fn render_all(&mut self) {
        for (id, entry) in self.windows.iter_mut() {
            event::dispatch(entry.callback.as_mut(), *id, Event::Render);
        }
    }
}
