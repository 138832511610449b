//! Per-draw push constant block.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use vkengine_rhi::vk;

/// Push constants consumed by the mesh vertex shader.
///
/// # Memory Layout
///
/// Matches the shader's `layout(push_constant)` block:
/// - Offset 0: data (16 bytes), frame heartbeat in `x`
/// - Offset 16: render_matrix (64 bytes), projection * view * model
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshPushConstants {
    pub data: Vec4,
    pub render_matrix: Mat4,
}

impl MeshPushConstants {
    pub const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;

    pub fn new(data: Vec4, render_matrix: Mat4) -> Self {
        Self {
            data,
            render_matrix,
        }
    }

    /// Range covering the whole block, for pipeline layout creation.
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: Self::STAGES,
            offset: 0,
            size: std::mem::size_of::<Self>() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<MeshPushConstants>(), 80);
        assert_eq!(std::mem::offset_of!(MeshPushConstants, render_matrix), 16);
        // Vulkan guarantees at least 128 bytes of push constants.
        assert!(MeshPushConstants::range().size <= 128);
    }
}
