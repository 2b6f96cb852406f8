use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::{Fullscreen, Window, WindowBuilder};

use super::{
    AppCallback, Event, KeyEvent, KeyTable, KeyTranslator, MouseButton, MouseEvent, ShowMode,
    SystemError, WindowCallback, WindowId, WindowRegistry, WHEEL_DELTA,
};
use crate::gpu::driver::Rect;

const DEFAULT_SIZE: (u32, u32) = (800, 600);

pub fn mouse_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        winit::event::MouseButton::Other(8) => MouseButton::Back,
        winit::event::MouseButton::Other(9) => MouseButton::Forward,
        winit::event::MouseButton::Other(_) => MouseButton::None,
    }
}

/// Wheel movement in [`WHEEL_DELTA`] units per line.
pub fn wheel_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => (y * WHEEL_DELTA as f32) as i32,
        MouseScrollDelta::PixelDelta(pos) => pos.y as i32,
    }
}

fn translate(event: &WindowEvent, keys: &KeyTranslator, cursor: (i32, i32)) -> Option<Event> {
    let (x, y) = cursor;
    let ev = match event {
        WindowEvent::Resized(size) => Event::Resize {
            width: size.width,
            height: size.height,
        },
        WindowEvent::CursorMoved { position, .. } => Event::MouseMove(MouseEvent {
            x: position.x as i32,
            y: position.y as i32,
            ..Default::default()
        }),
        WindowEvent::MouseInput { state, button, .. } => {
            let e = MouseEvent {
                x,
                y,
                button: mouse_button(*button),
                delta: 0,
            };
            match state {
                ElementState::Pressed => Event::MouseDown(e),
                ElementState::Released => Event::MouseUp(e),
            }
        }
        WindowEvent::MouseWheel { delta, .. } => Event::MouseWheel(MouseEvent {
            x,
            y,
            button: MouseButton::None,
            delta: wheel_delta(*delta),
        }),
        WindowEvent::KeyboardInput { input, .. } => {
            let key = input
                .virtual_keycode
                .map(|vk| keys.translate(vk as u32))
                .unwrap_or_default();
            let e = KeyEvent { key };
            match input.state {
                ElementState::Pressed => Event::KeyDown(e),
                ElementState::Released => Event::KeyUp(e),
            }
        }
        _ => return None,
    };
    Some(ev)
}

/// Deliver one native event to its window. Returns true once the last
/// window has closed.
fn route<W>(
    event: winit::event::Event<'_, ()>,
    registry: &mut WindowRegistry<W>,
    native_ids: &mut HashMap<winit::window::WindowId, WindowId>,
    keys: &KeyTranslator,
) -> bool {
    let (window_id, ev) = match event {
        winit::event::Event::RedrawRequested(window_id) => (window_id, Some(Event::Render)),
        winit::event::Event::WindowEvent {
            window_id,
            event: WindowEvent::CloseRequested,
        } => {
            let Some(id) = native_ids.remove(&window_id) else {
                return false;
            };
            if registry.deregister(id).is_ok() {
                log::info!("window {:?} closed", id);
            }
            return registry.is_empty();
        }
        winit::event::Event::WindowEvent { window_id, event } => {
            let cursor = native_ids
                .get(&window_id)
                .and_then(|id| registry.cursor(*id))
                .unwrap_or_default();
            (window_id, translate(&event, keys, cursor))
        }
        _ => return false,
    };
    if let (Some(&id), Some(ev)) = (native_ids.get(&window_id), ev) {
        if let Err(err) = registry.dispatch(id, ev) {
            log::warn!("dropping event: {}", err);
        }
    }
    false
}

/// Windowing system on top of `winit`.
///
/// Must be created and run on the main thread.
pub struct WinitSystem {
    event_loop: EventLoop<()>,
    registry: WindowRegistry<Window>,
    native_ids: HashMap<winit::window::WindowId, WindowId>,
    keys: KeyTranslator,
    exit: Arc<AtomicBool>,
}

impl Default for WinitSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WinitSystem {
    pub fn new() -> Self {
        Self {
            event_loop: EventLoop::new(),
            registry: WindowRegistry::new(),
            native_ids: HashMap::new(),
            keys: KeyTranslator::new(KeyTable::winit()),
            exit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn create_window(
        &mut self,
        callback: Box<dyn WindowCallback>,
        width: u32,
        height: u32,
    ) -> Result<WindowId, SystemError> {
        self.build_window(callback, (width, height), ShowMode::Normal)
    }

    pub fn create_window_with_mode(
        &mut self,
        callback: Box<dyn WindowCallback>,
        mode: ShowMode,
    ) -> Result<WindowId, SystemError> {
        self.build_window(callback, DEFAULT_SIZE, mode)
    }

    fn build_window(
        &mut self,
        callback: Box<dyn WindowCallback>,
        size: (u32, u32),
        mode: ShowMode,
    ) -> Result<WindowId, SystemError> {
        let mut builder = WindowBuilder::new()
            .with_title("fresco")
            .with_inner_size(PhysicalSize::new(size.0, size.1));
        match mode {
            ShowMode::Maximized => builder = builder.with_maximized(true),
            ShowMode::FullScreen => {
                builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)))
            }
            ShowMode::Normal | ShowMode::Minimized => {}
        }
        let window = builder
            .build(&self.event_loop)
            .map_err(|e| SystemError::UnableToCreateWindow(e.to_string()))?;
        if mode == ShowMode::Minimized {
            window.set_minimized(true);
        }

        let native = window.id();
        let id = self.registry.register(window, callback);
        self.native_ids.insert(native, id);
        log::info!("created window {:?} ({:?}, {}x{})", id, mode, size.0, size.1);
        Ok(id)
    }

    pub fn destroy_window(&mut self, id: WindowId) -> Result<(), SystemError> {
        let window = self.registry.deregister(id)?;
        self.native_ids.remove(&window.id());
        log::info!("destroyed window {:?}", id);
        Ok(())
    }

    /// Flag that stops [`exec`](Self::exec) when set, from any thread.
    pub fn exit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exit)
    }

    pub fn exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    /// Run until [`exit`](Self::exit) is called or the last window closes.
    ///
    /// Each iteration drains pending native events, calls `on_timer` and
    /// then renders every live window once.
    pub fn exec(&mut self, app: &mut dyn AppCallback) -> Result<(), SystemError> {
        if self.registry.is_empty() {
            return Err(SystemError::EventLoop("no window to run".into()));
        }
        log::debug!("entering event loop");
        while !self.exit.load(Ordering::Acquire) {
            self.pump();
            if self.exit.load(Ordering::Acquire) {
                break;
            }
            if app.on_timer() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            self.registry.render_all();
        }
        log::debug!("event loop exited");
        Ok(())
    }

    fn pump(&mut self) {
        let Self {
            event_loop,
            registry,
            native_ids,
            keys,
            exit,
        } = self;
        event_loop.run_return(|event, _target, control_flow| {
            *control_flow = ControlFlow::Exit;
            if route(event, registry, native_ids, keys) {
                exit.store(true, Ordering::Release);
            }
        });
    }

    pub fn width(&self, id: WindowId) -> Result<u32, SystemError> {
        Ok(self.registry.window(id)?.inner_size().width)
    }

    pub fn height(&self, id: WindowId) -> Result<u32, SystemError> {
        Ok(self.registry.window(id)?.inner_size().height)
    }

    /// Client area in screen coordinates.
    pub fn client_rect(&self, id: WindowId) -> Result<Rect, SystemError> {
        let window = self.registry.window(id)?;
        let size = window.inner_size();
        let pos = window.inner_position().unwrap_or_default();
        Ok(Rect::new(pos.x, pos.y, size.width as i32, size.height as i32))
    }

    pub fn set_fullscreen(&mut self, id: WindowId, fullscreen: bool) -> Result<(), SystemError> {
        let window = self.registry.window(id)?;
        window.set_fullscreen(fullscreen.then(|| Fullscreen::Borderless(None)));
        Ok(())
    }

    pub fn is_fullscreen(&self, id: WindowId) -> Result<bool, SystemError> {
        Ok(self.registry.window(id)?.fullscreen().is_some())
    }

    pub fn set_cursor_position(&mut self, id: WindowId, x: i32, y: i32) -> Result<(), SystemError> {
        let window = self.registry.window(id)?;
        if let Err(err) = window.set_cursor_position(PhysicalPosition::new(x, y)) {
            log::warn!("set_cursor_position: {}", err);
        }
        Ok(())
    }

    pub fn show_cursor(&mut self, id: WindowId, show: bool) -> Result<(), SystemError> {
        self.registry.window(id)?.set_cursor_visible(show);
        Ok(())
    }

    /// Native handle for creating a presentation surface.
    pub fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle, SystemError> {
        Ok(self.registry.window(id)?.raw_window_handle())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn extra_buttons_map_to_back_and_forward() {
        assert_eq!(mouse_button(winit::event::MouseButton::Other(8)), MouseButton::Back);
        assert_eq!(mouse_button(winit::event::MouseButton::Other(9)), MouseButton::Forward);
        assert_eq!(mouse_button(winit::event::MouseButton::Other(3)), MouseButton::None);
        assert_eq!(mouse_button(winit::event::MouseButton::Middle), MouseButton::Middle);
    }

    #[test]
    fn wheel_lines_scale_to_wheel_delta() {
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, 1.0)), 120);
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, -2.0)), -240);
        assert_eq!(
            wheel_delta(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 33.0))),
            33
        );
    }

    #[test]
    fn resize_is_translated() {
        let keys = KeyTranslator::new(KeyTable::winit());
        let ev = translate(&WindowEvent::Resized(PhysicalSize::new(640, 480)), &keys, (0, 0));
        assert_eq!(
            ev,
            Some(Event::Resize {
                width: 640,
                height: 480
            })
        );
        assert_eq!(translate(&WindowEvent::Focused(true), &keys, (0, 0)), None);
    }

    #[test]
    fn redraw_requests_reach_on_render() {
        struct Renders(Rc<Cell<u32>>);
        impl WindowCallback for Renders {
            fn on_render(&mut self, _win: WindowId) {
                self.0.set(self.0.get() + 1);
            }
        }

        let renders = Rc::new(Cell::new(0));
        let keys = KeyTranslator::new(KeyTable::winit());
        let mut registry = WindowRegistry::new();
        let id = registry.register((), Box::new(Renders(renders.clone())));
        let native = unsafe { winit::window::WindowId::dummy() };
        let mut native_ids = HashMap::from([(native, id)]);

        let closed = route(
            winit::event::Event::RedrawRequested(native),
            &mut registry,
            &mut native_ids,
            &keys,
        );
        assert!(!closed);
        assert_eq!(renders.get(), 1);

        let closed = route(
            winit::event::Event::WindowEvent {
                window_id: native,
                event: WindowEvent::CloseRequested,
            },
            &mut registry,
            &mut native_ids,
            &keys,
        );
        assert!(closed);
        assert!(registry.is_empty());

        // Redraws for a closed window are dropped.
        route(
            winit::event::Event::RedrawRequested(native),
            &mut registry,
            &mut native_ids,
            &keys,
        );
        assert_eq!(renders.get(), 1);
    }
}
