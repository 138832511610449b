//! Error types for frame scheduling and engine lifecycle.

use std::fmt;

use thiserror::Error;
use vkengine_resources::ResourceError;
use vkengine_rhi::RhiError;

/// Bounded wait that can expire during a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStage {
    /// Waiting on a slot's render fence.
    RenderFence,
    /// Waiting for the swapchain to hand out an image.
    ImageAcquire,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::RenderFence => write!(f, "render fence"),
            SyncStage::ImageAcquire => write!(f, "swapchain image"),
        }
    }
}

/// Fatal failure while producing a frame.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A bounded wait expired. The GPU is hung or the device was lost.
    #[error("Timed out waiting for {stage} on frame slot {slot}")]
    SyncTimeout { stage: SyncStage, slot: usize },

    /// The swapchain no longer matches the surface. It is not recreated.
    #[error("Swapchain is out of date or suboptimal")]
    SwapchainOutOfDate,

    #[error(transparent)]
    Rhi(#[from] RhiError),
}

/// Startup failure of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Platform(#[from] vkengine_core::Error),

    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A registry lookup during scene setup came back empty.
    #[error("Missing resource '{0}'")]
    MissingResource(String),
}

pub type FrameResult<T> = Result<T, FrameError>;
pub type EngineResult<T> = Result<T, EngineError>;
