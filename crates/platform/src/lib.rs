//! Platform boundary for vkengine.
//!
//! This crate provides:
//! - Window management via winit
//! - Vulkan surface creation through raw window handles
//! - Input events and the per-frame input state derived from them

mod input;
mod window;

pub use input::{InputEvent, InputState, KeyCode};
pub use window::{Surface, Window, required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
