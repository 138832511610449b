//! Camera and render objects.

pub mod camera;
pub mod render_object;

pub use camera::Camera;
pub use render_object::{RenderObject, Scene};
