use super::keys::Key;
use super::{WindowCallback, WindowId};

/// Wheel units per line, as reported by Win32.
pub const WHEEL_DELTA: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    None,
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

/// Cursor position in window pixels. `delta` is only set for wheel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    MouseDown(MouseEvent),
    MouseUp(MouseEvent),
    MouseMove(MouseEvent),
    MouseWheel(MouseEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    Resize { width: u32, height: u32 },
    Render,
}

impl Event {
    pub fn mouse(&self) -> Option<&MouseEvent> {
        match self {
            Event::MouseDown(e) | Event::MouseUp(e) | Event::MouseMove(e) | Event::MouseWheel(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Route `event` to the matching callback method.
///
/// A resize to a zero dimension comes from minimizing and is dropped.
pub fn dispatch<C: WindowCallback + ?Sized>(cb: &mut C, win: WindowId, event: Event) {
    match event {
        Event::MouseDown(e) => cb.on_mouse_down(win, &e),
        Event::MouseUp(e) => cb.on_mouse_up(win, &e),
        Event::MouseMove(e) => cb.on_mouse_move(win, &e),
        Event::MouseWheel(e) => cb.on_mouse_wheel(win, &e),
        Event::KeyDown(e) => cb.on_key_down(win, &e),
        Event::KeyUp(e) => cb.on_key_up(win, &e),
        Event::Resize { width, height } => {
            if width > 0 && height > 0 {
                cb.on_resize(win, width, height);
            }
        }
        Event::Render => cb.on_render(win),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl WindowCallback for Log {
        fn on_render(&mut self, _win: WindowId) {
            self.0.push("render".into());
        }

        fn on_resize(&mut self, _win: WindowId, w: u32, h: u32) {
            self.0.push(format!("resize {}x{}", w, h));
        }

        fn on_key_down(&mut self, _win: WindowId, e: &KeyEvent) {
            self.0.push(format!("down {:?}", e.key));
        }

        fn on_mouse_wheel(&mut self, _win: WindowId, e: &MouseEvent) {
            self.0.push(format!("wheel {}", e.delta));
        }
    }

    #[test]
    fn events_reach_their_method() {
        let mut log = Log::default();
        let win = WindowId::from_raw(1);
        dispatch(&mut log, win, Event::KeyDown(KeyEvent { key: Key::A }));
        dispatch(
            &mut log,
            win,
            Event::MouseWheel(MouseEvent {
                delta: -WHEEL_DELTA,
                ..Default::default()
            }),
        );
        dispatch(&mut log, win, Event::Render);
        dispatch(&mut log, win, Event::MouseMove(MouseEvent::default()));
        assert_eq!(log.0, vec!["down A", "wheel -120", "render"]);
    }

    #[test]
    fn zero_sized_resize_is_dropped() {
        let mut log = Log::default();
        let win = WindowId::from_raw(1);
        dispatch(&mut log, win, Event::Resize { width: 0, height: 600 });
        dispatch(&mut log, win, Event::Resize { width: 800, height: 0 });
        dispatch(&mut log, win, Event::Resize { width: 640, height: 480 });
        assert_eq!(log.0, vec!["resize 640x480"]);
    }
}
