//! Materials: a pipeline and the layout it was built with.

use vkengine_rhi::vk;

/// Pipeline state used to draw a mesh.
///
/// Both handles are owned by the deletion queue; a `Material` only refers
/// to them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Material {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl Material {
    pub fn new(pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> Self {
        Self { pipeline, layout }
    }
}
