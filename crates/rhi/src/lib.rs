//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! A thin layer over `ash` and `gpu-allocator`:
//! - Instance, GPU selection and logical device
//! - Device memory allocation for buffers and images
//! - Swapchain, render pass and framebuffers
//! - Command recording and synchronization primitives
//! - Shader modules and the graphics pipeline builder
//!
//! Apart from the root handles ([`instance::Instance`], [`device::Device`]),
//! every object created here registers its own destruction in a
//! [`vkengine_core::DeletionQueue`].

mod error;

pub mod allocator;
pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
