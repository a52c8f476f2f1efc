//! GLFW windowing backend
//!
//! GLFW must be initialized and used from one thread. The library handle
//! lives in a thread-local slot filled by [`init`] and emptied by
//! [`terminate`]; platforms pick it up from there when they first need it.

use std::cell::RefCell;
use std::ffi::c_void;

use glfw::Context;

use crate::backends::gles::GlesDevice;
use crate::config::WindowConfig;
use crate::render::device::GraphicsDevice;
use crate::render::window::{
    Key, MouseButton, Platform, WindowBackend, WindowError, WindowEvent, WindowResult,
};

thread_local! {
    static GLFW: RefCell<Option<glfw::Glfw>> = const { RefCell::new(None) };
}

/// Initialize GLFW for the calling thread. Does nothing if already done.
pub fn init() -> WindowResult<()> {
    GLFW.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            log::debug!("GLFW already initialized");
            return Ok(());
        }

        let glfw = glfw::init(glfw::log_errors)
            .map_err(|err| WindowError::InitializationFailed(format!("{err:?}")))?;
        log::info!("initialized GLFW {}", glfw::get_version_string());
        *slot = Some(glfw);
        Ok(())
    })
}

/// Release the thread's GLFW handle
pub fn terminate() {
    GLFW.with(|slot| {
        if slot.borrow_mut().take().is_some() {
            log::info!("released GLFW");
        }
    });
}

/// Whether [`init`] has run on this thread without a matching [`terminate`]
pub fn is_initialized() -> bool {
    GLFW.with(|slot| slot.borrow().is_some())
}

/// [`Platform`] over the thread's GLFW handle
#[derive(Default)]
pub struct GlfwPlatform {
    glfw: Option<glfw::Glfw>,
}

impl GlfwPlatform {
    /// Create a platform; GLFW is looked up on first window creation.
    pub fn new() -> Self {
        Self::default()
    }

    fn glfw(&mut self) -> WindowResult<&mut glfw::Glfw> {
        if self.glfw.is_none() {
            self.glfw = GLFW.with(|slot| slot.borrow().clone());
        }
        self.glfw.as_mut().ok_or(WindowError::NotInitialized)
    }
}

impl std::fmt::Debug for GlfwPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlfwPlatform")
            .field("initialized", &self.glfw.is_some())
            .finish()
    }
}

impl Platform for GlfwPlatform {
    fn create_window(&mut self, config: &WindowConfig) -> WindowResult<Box<dyn WindowBackend>> {
        let glfw = self.glfw()?;

        glfw.default_window_hints();
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::OpenGlEs));
        glfw.window_hint(glfw::WindowHint::ContextVersion(3, 0));
        glfw.window_hint(glfw::WindowHint::Samples(config.samples));
        glfw.window_hint(glfw::WindowHint::Maximized(config.maximized));
        glfw.window_hint(glfw::WindowHint::Visible(config.visible));

        let (mut window, events) = glfw
            .create_window(
                config.width,
                config.height,
                &config.title,
                glfw::WindowMode::Windowed,
            )
            .ok_or_else(|| {
                WindowError::CreationFailed("GLFW could not create an OpenGL ES 3.0 window".into())
            })?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_mouse_button_polling(true);
        window.set_scroll_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Box::new(GlfwWindow { window, events }))
    }

    fn poll_events(&mut self) {
        if let Some(glfw) = self.glfw.as_mut() {
            glfw.poll_events();
        }
    }
}

/// GLFW window with an OpenGL ES context
pub struct GlfwWindow {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

fn translate_event(event: glfw::WindowEvent) -> Option<WindowEvent> {
    match event {
        glfw::WindowEvent::Close => Some(WindowEvent::CloseRequested),
        glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => {
            Some(WindowEvent::KeyPressed(match key {
                glfw::Key::Escape => Key::Escape,
                _ => Key::Other,
            }))
        }
        glfw::WindowEvent::CursorPos(x, y) => Some(WindowEvent::CursorMoved { x, y }),
        glfw::WindowEvent::MouseButton(button, action, _) => Some(WindowEvent::MouseButton {
            button: match button {
                glfw::MouseButton::Button1 => MouseButton::Left,
                glfw::MouseButton::Button2 => MouseButton::Right,
                glfw::MouseButton::Button3 => MouseButton::Middle,
                _ => MouseButton::Other,
            },
            pressed: action != glfw::Action::Release,
        }),
        glfw::WindowEvent::Scroll(_, delta) => Some(WindowEvent::Scrolled { delta }),
        glfw::WindowEvent::FramebufferSize(width, height) => {
            Some(WindowEvent::FramebufferResized { width, height })
        }
        _ => None,
    }
}

impl WindowBackend for GlfwWindow {
    fn should_close(&self) -> bool {
        self.window.should_close()
    }

    fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    fn drain_events(&mut self) -> Vec<WindowEvent> {
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| translate_event(event))
            .collect()
    }

    fn size(&self) -> (i32, i32) {
        self.window.get_size()
    }

    fn framebuffer_size(&self) -> (i32, i32) {
        self.window.get_framebuffer_size()
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn make_current(&mut self) {
        self.window.make_current();
    }

    fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    fn create_device(&mut self) -> WindowResult<Box<dyn GraphicsDevice>> {
        if !self.window.is_current() {
            return Err(WindowError::CreationFailed(
                "OpenGL ES context is not current".into(),
            ));
        }

        let window = &mut self.window;
        // SAFETY: the context was checked to be current above and is owned by
        // this window, which outlives the device inside the viewer.
        let device =
            unsafe { GlesDevice::from_loader(|symbol| window.get_proc_address(symbol) as *const c_void) };
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_escape_and_close() {
        let escape = glfw::WindowEvent::Key(
            glfw::Key::Escape,
            0,
            glfw::Action::Press,
            glfw::Modifiers::empty(),
        );
        assert_eq!(translate_event(escape), Some(WindowEvent::KeyPressed(Key::Escape)));
        assert_eq!(
            translate_event(glfw::WindowEvent::Close),
            Some(WindowEvent::CloseRequested)
        );
    }

    #[test]
    fn test_translate_ignores_key_release() {
        let release = glfw::WindowEvent::Key(
            glfw::Key::Escape,
            0,
            glfw::Action::Release,
            glfw::Modifiers::empty(),
        );
        assert_eq!(translate_event(release), None);
    }

    #[test]
    fn test_translate_mouse_and_scroll() {
        let press = glfw::WindowEvent::MouseButton(
            glfw::MouseButton::Button1,
            glfw::Action::Press,
            glfw::Modifiers::empty(),
        );
        assert_eq!(
            translate_event(press),
            Some(WindowEvent::MouseButton {
                button: MouseButton::Left,
                pressed: true
            })
        );
        assert_eq!(
            translate_event(glfw::WindowEvent::Scroll(0.0, -2.0)),
            Some(WindowEvent::Scrolled { delta: -2.0 })
        );
    }

    #[test]
    fn test_platform_requires_init() {
        assert!(!is_initialized());
        let mut platform = GlfwPlatform::new();
        let err = platform
            .create_window(&WindowConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, WindowError::NotInitialized);
    }
}
