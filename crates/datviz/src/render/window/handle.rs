//! Window handle with lazy native creation
//!
//! The native window is only created when something actually needs it, so a
//! viewer can be constructed (and configured) before any windowing work.

use crate::config::WindowConfig;
use crate::render::device::GraphicsDevice;
use crate::render::window::backend::{Key, Platform, WindowBackend, WindowEvent, WindowResult};

/// A platform plus at most one native window
pub struct Window {
    platform: Box<dyn Platform>,
    config: WindowConfig,
    backend: Option<Box<dyn WindowBackend>>,
    close_requested: bool,
}

impl Window {
    /// Prepare a window; nothing native is created yet.
    pub fn new(platform: Box<dyn Platform>, config: WindowConfig) -> Self {
        Self {
            platform,
            config,
            backend: None,
            close_requested: false,
        }
    }

    /// Whether the native window exists
    pub fn is_created(&self) -> bool {
        self.backend.is_some()
    }

    /// Configuration the window was (or will be) created with
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    fn get_or_create(&mut self) -> WindowResult<&mut dyn WindowBackend> {
        let backend = match self.backend.take() {
            Some(backend) => backend,
            None => {
                let backend = self.platform.create_window(&self.config)?;
                log::debug!(
                    "created window \"{}\" ({}x{})",
                    self.config.title,
                    self.config.width,
                    self.config.height
                );
                backend
            }
        };
        Ok(&mut **self.backend.insert(backend))
    }

    /// Make the window's context current, creating the window if needed
    pub fn make_context_current(&mut self) -> WindowResult<()> {
        self.get_or_create()?.make_current();
        Ok(())
    }

    /// Set the title bar text
    pub fn set_title(&mut self, title: &str) -> WindowResult<()> {
        self.config.title = title.to_owned();
        self.get_or_create()?.set_title(title);
        Ok(())
    }

    /// Client area size in screen coordinates
    pub fn size(&mut self) -> WindowResult<(i32, i32)> {
        Ok(self.get_or_create()?.size())
    }

    /// Drawable size in pixels
    pub fn framebuffer_size(&mut self) -> WindowResult<(i32, i32)> {
        Ok(self.get_or_create()?.framebuffer_size())
    }

    /// Make the context current and load a graphics device for it
    pub fn create_device(&mut self) -> WindowResult<Box<dyn GraphicsDevice>> {
        let backend = self.get_or_create()?;
        backend.make_current();
        backend.create_device()
    }

    /// Pump the platform and return this window's new events.
    ///
    /// A close request or Escape latches [`should_close`](Self::should_close).
    pub fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.platform.poll_events();

        let Some(backend) = self.backend.as_mut() else {
            return Vec::new();
        };

        let events = backend.drain_events();
        for event in &events {
            match event {
                WindowEvent::CloseRequested | WindowEvent::KeyPressed(Key::Escape) => {
                    log::debug!("window close requested by {event:?}");
                    self.close_requested = true;
                    backend.set_should_close(true);
                }
                _ => {}
            }
        }
        events
    }

    /// Whether a close was requested. Stays `true` once set.
    pub fn should_close(&mut self) -> bool {
        if !self.close_requested {
            self.close_requested = self.backend.as_ref().is_some_and(|b| b.should_close());
        }
        self.close_requested
    }

    /// Present the back buffer; does nothing before the window exists
    pub fn swap_buffers(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.swap_buffers();
        }
    }

    /// Destroy the native window, keeping the handle reusable
    pub fn close(&mut self) {
        if self.backend.take().is_some() {
            log::debug!("destroyed window \"{}\"", self.config.title);
        }
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("config", &self.config)
            .field("created", &self.backend.is_some())
            .field("close_requested", &self.close_requested)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::headless::HeadlessPlatform;
    use crate::render::window::backend::WindowError;

    fn window() -> (Window, crate::backends::headless::HeadlessProbe) {
        let (platform, probe) = HeadlessPlatform::new();
        (Window::new(Box::new(platform), WindowConfig::default()), probe)
    }

    #[test]
    fn test_window_is_created_lazily() {
        let (mut window, probe) = window();
        assert!(!window.is_created());
        assert_eq!(probe.stats().windows_created, 0);

        window.swap_buffers();
        assert_eq!(probe.stats().swaps, 0);

        let size = window.size().unwrap();
        assert!(window.is_created());
        assert_eq!(size, (640, 480));
        assert_eq!(probe.stats().windows_created, 1);

        window.size().unwrap();
        assert_eq!(probe.stats().windows_created, 1);
    }

    #[test]
    fn test_set_title_reaches_native_window() {
        let (mut window, probe) = window();
        window.set_title("points").unwrap();
        assert_eq!(probe.stats().title, "points");
        assert_eq!(window.config().title, "points");
    }

    #[test]
    fn test_close_request_is_sticky() {
        let (mut window, probe) = window();
        window.make_context_current().unwrap();
        assert!(!window.should_close());

        probe.push_event(WindowEvent::CloseRequested);
        window.poll_events();
        assert!(window.should_close());

        window.poll_events();
        assert!(window.should_close());
    }

    #[test]
    fn test_escape_requests_close() {
        let (mut window, probe) = window();
        window.make_context_current().unwrap();

        probe.push_event(WindowEvent::KeyPressed(Key::Other));
        window.poll_events();
        assert!(!window.should_close());

        probe.push_event(WindowEvent::KeyPressed(Key::Escape));
        let events = window.poll_events();
        assert_eq!(events, vec![WindowEvent::KeyPressed(Key::Escape)]);
        assert!(window.should_close());
    }

    #[test]
    fn test_creation_failure_is_reported() {
        let (mut window, probe) = window();
        probe.fail_window_creation();

        let err = window.make_context_current().unwrap_err();
        assert!(matches!(err, WindowError::CreationFailed(_)));
        assert!(!window.is_created());
    }
}
