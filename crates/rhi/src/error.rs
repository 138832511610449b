//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Device memory could not satisfy an allocation
    #[error("Allocation error: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    /// The allocator was used after it was shut down
    #[error("Allocator already shut down")]
    AllocatorShutDown,

    /// No GPU passed the selection filter
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required instance or device extension is missing
    #[error("Missing required extension: {0}")]
    MissingExtension(String),

    /// Shader bytecode could not be read or was malformed
    #[error("Shader error: {0}")]
    Shader(String),

    /// Swapchain setup error
    #[error("Swapchain error: {0}")]
    Swapchain(String),

    /// Pipeline configuration was incomplete or rejected by the driver
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
