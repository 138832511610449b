//! Frame scheduling, draw dispatch and the engine lifecycle.
//!
//! - [`scheduler`]: double-buffered acquire / record / submit / present loop
//! - [`dispatch`]: walks render objects with minimal rebinding
//! - [`engine`]: ordered startup and reverse teardown of every GPU object

mod error;

pub mod depth_buffer;
pub mod dispatch;
pub mod engine;
pub mod frame;
pub mod pipelines;
pub mod push_constants;
pub mod scheduler;
pub mod shading;

pub use dispatch::{DrawInputs, DrawRecorder, DrawStats, draw_objects};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, FrameError, FrameResult, SyncStage};
pub use push_constants::MeshPushConstants;
pub use scheduler::{FRAME_OVERLAP, FrameBackend, FrameInfo, FrameScheduler};
pub use shading::{ShadingMode, ShadingSelector};
