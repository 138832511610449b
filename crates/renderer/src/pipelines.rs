//! Mesh pipelines, one per [`ShadingMode`].

use std::path::Path;

use tracing::info;
use vkengine_core::DeletionQueue;
use vkengine_resources::Material;
use vkengine_rhi::RhiResult;
use vkengine_rhi::pipeline::{
    CompareOp, PipelineBuilder, create_pipeline_layout, register_pipeline,
};
use vkengine_rhi::shader::{ShaderModule, ShaderStage};
use vkengine_rhi::vertex::Vertex;
use vkengine_rhi::vk;

use crate::push_constants::MeshPushConstants;
use crate::shading::ShadingMode;

/// Vertex shader shared by every mesh pipeline.
pub const MESH_VERTEX_SHADER: &str = "mesh.vert.spv";

/// Builds one depth-tested mesh pipeline per [`ShadingMode`].
///
/// All pipelines share a single layout carrying [`MeshPushConstants`]. The
/// shader modules are destroyed once the pipelines exist; the layout and
/// pipelines are registered in `deletion_queue`.
pub fn build_mesh_materials(
    device: &ash::Device,
    shader_dir: &Path,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    deletion_queue: &mut DeletionQueue,
) -> RhiResult<Vec<(ShadingMode, Material)>> {
    let vertex = ShaderModule::from_file(
        device,
        &shader_dir.join(MESH_VERTEX_SHADER),
        ShaderStage::Vertex,
    )?;

    let layout = create_pipeline_layout(device, &[MeshPushConstants::range()], deletion_queue)?;

    let base = PipelineBuilder::new()
        .vertex_input(
            &[Vertex::binding_description()],
            &Vertex::attribute_descriptions(),
        )
        .viewport_and_scissor_for(extent)
        .depth_testing(true, true, CompareOp::LessOrEqual)
        .pipeline_layout(layout);

    let mut materials = Vec::with_capacity(ShadingMode::ALL.len());
    for mode in ShadingMode::ALL {
        let fragment = ShaderModule::from_file(
            device,
            &shader_dir.join(mode.fragment_shader()),
            ShaderStage::Fragment,
        )?;

        let pipeline = base
            .clone()
            .add_shader_stage(ShaderStage::Vertex, vertex.handle())
            .add_shader_stage(ShaderStage::Fragment, fragment.handle())
            .build(device, render_pass)?;
        register_pipeline(device, pipeline, deletion_queue);

        materials.push((mode, Material::new(pipeline, layout)));
    }

    info!("Built {} mesh pipelines", materials.len());
    Ok(materials)
}
