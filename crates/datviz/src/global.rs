//! Process-wide windowing setup
//!
//! GLFW has to be initialized before the first window is created and torn
//! down after the last one is gone. Both calls are bound to the calling
//! thread, which must be the thread that creates and drives viewers.

use crate::backends::glfw;
use crate::viewer::ViewerResult;

/// Initialize the windowing library for this thread.
///
/// Calling it again while initialized is a no-op.
pub fn global_init() -> ViewerResult<()> {
    glfw::init()?;
    Ok(())
}

/// Release the windowing library for this thread.
///
/// Viewers created afterwards fail to realize until [`global_init`] runs
/// again.
pub fn global_cleanup() {
    glfw::terminate();
}
