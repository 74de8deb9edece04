use std::time::Duration;

use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::Window;

/// How long `wait_events` blocks for window messages before re-checking the size.
const EVENT_WAIT: Duration = Duration::from_millis(16);

/// What the renderer needs from the window it presents to.
pub trait WindowSurface {
    /// Current framebuffer size in pixels; `(0, 0)` while minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Returns whether a resize happened since the last call, clearing it.
    fn take_resized(&mut self) -> bool;

    /// Blocks until the window system has delivered pending changes.
    fn wait_events(&mut self);
}

/// A winit window plus the event loop that feeds it.
///
/// Events are pumped rather than run, so the renderer can dispatch them from
/// inside a frame while it waits out a minimized window.
pub struct WinitSurface {
    event_loop: EventLoop<()>,
    window: Window,
    resized: bool,
    close_requested: bool,
}

impl WinitSurface {
    pub fn new(event_loop: EventLoop<()>, window: Window) -> Self {
        Self {
            event_loop,
            window,
            resized: false,
            close_requested: false,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn is_minimized(&self) -> bool {
        let (width, height) = self.framebuffer_size();
        width == 0 || height == 0
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Dispatches queued window events, waiting up to `timeout` for the first.
    pub fn pump(&mut self, timeout: Option<Duration>) {
        let Self {
            event_loop,
            resized,
            close_requested,
            ..
        } = self;

        let status = event_loop.pump_events(timeout, |event, _| {
            if let Event::WindowEvent { event, .. } = event {
                match event {
                    WindowEvent::Resized(_) => *resized = true,
                    WindowEvent::CloseRequested => *close_requested = true,
                    _ => {}
                }
            }
        });

        if let PumpStatus::Exit(_) = status {
            *close_requested = true;
        }
    }
}

impl WindowSurface for WinitSurface {
    fn framebuffer_size(&self) -> (u32, u32) {
        let PhysicalSize { width, height } = self.window.inner_size();
        (width, height)
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn wait_events(&mut self) {
        self.pump(Some(EVENT_WAIT));
    }
}
