//! Core utilities shared by every vkengine crate.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Engine configuration
//! - The deletion queue that orders GPU teardown

mod config;
mod deletion_queue;
mod error;
mod logging;
mod timer;

pub use config::EngineConfig;
pub use deletion_queue::DeletionQueue;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameClock;
