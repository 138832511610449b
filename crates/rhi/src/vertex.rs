//! Vertex layout shared by meshes and pipelines.

use std::mem::offset_of;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Mesh vertex: position, normal and color.
///
/// # Memory Layout
///
/// `#[repr(C)]`, tightly packed:
/// - Offset 0: position (12 bytes), location 0
/// - Offset 12: normal (12 bytes), location 1
/// - Offset 24: color (12 bytes), location 2
/// - Total size: 36 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    /// Size of one vertex record in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Binding 0, advanced per vertex.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: Self::size() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        let attribute = |location: u32, offset: usize| vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset as u32,
        };

        [
            attribute(0, offset_of!(Vertex, position)),
            attribute(1, offset_of!(Vertex, normal)),
            attribute(2, offset_of!(Vertex, color)),
        ]
    }
}
