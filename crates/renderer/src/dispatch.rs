//! Draw dispatch for a list of render objects.
//!
//! [`draw_objects`] walks the scene in order, binding a pipeline or vertex
//! buffer only when it differs from the one bound for the previous object.

use glam::{Mat4, Vec4};
use tracing::{error, trace};
use vkengine_resources::{Material, MaterialId, Mesh, MeshId, Registry};
use vkengine_rhi::vk;
use vkengine_scene::{Camera, RenderObject};

use crate::push_constants::MeshPushConstants;
use crate::shading::ShadingSelector;

/// Command recording used by the dispatcher.
pub trait DrawRecorder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer);

    fn push_constants(&mut self, layout: vk::PipelineLayout, constants: &MeshPushConstants);

    /// Non-indexed draw of `vertex_count` vertices from the bound buffer.
    fn draw(&mut self, vertex_count: u32);
}

/// Everything one dispatch reads.
pub struct DrawInputs<'a> {
    pub camera: &'a Camera,
    pub aspect: f32,
    pub objects: &'a [RenderObject],
    pub meshes: &'a Registry<Mesh>,
    pub materials: &'a Registry<Material>,
    pub shading: &'a ShadingSelector,
    /// Copied into every object's push constants.
    pub data: Vec4,
}

/// Counters from one dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub pipeline_binds: u32,
    pub vertex_buffer_binds: u32,
    pub draw_calls: u32,
    /// Objects whose mesh or material could not be resolved.
    pub skipped: u32,
}

/// Records one draw per object.
///
/// Objects referring to a missing mesh or material, or to a mesh that was
/// never uploaded, are logged and skipped.
pub fn draw_objects<R: DrawRecorder>(recorder: &mut R, inputs: &DrawInputs<'_>) -> DrawStats {
    let view_projection = inputs.camera.view_projection(inputs.aspect);

    let mut stats = DrawStats::default();
    let mut bound_pipeline: Option<vk::Pipeline> = None;
    let mut bound_mesh: Option<MeshId> = None;

    for (index, object) in inputs.objects.iter().enumerate() {
        let material_id: MaterialId = inputs.shading.resolve(object.material);
        let Some(material) = inputs.materials.get(material_id) else {
            error!("Render object {} refers to a missing material", index);
            stats.skipped += 1;
            continue;
        };
        let Some((mesh, buffer)) = inputs
            .meshes
            .get(object.mesh)
            .and_then(|mesh| mesh.vertex_buffer().map(|buffer| (mesh, buffer)))
        else {
            error!("Render object {} refers to a missing or unloaded mesh", index);
            stats.skipped += 1;
            continue;
        };

        if bound_pipeline != Some(material.pipeline) {
            recorder.bind_pipeline(material.pipeline);
            bound_pipeline = Some(material.pipeline);
            stats.pipeline_binds += 1;
        }

        if bound_mesh != Some(object.mesh) {
            recorder.bind_vertex_buffer(buffer);
            bound_mesh = Some(object.mesh);
            stats.vertex_buffer_binds += 1;
        }

        let render_matrix: Mat4 = view_projection * object.transform;
        recorder.push_constants(
            material.layout,
            &MeshPushConstants::new(inputs.data, render_matrix),
        );

        recorder.draw(mesh.vertex_count());
        stats.draw_calls += 1;
    }

    trace!(
        "Dispatched {} draws ({} pipeline binds, {} vertex buffer binds)",
        stats.draw_calls, stats.pipeline_binds, stats.vertex_buffer_binds
    );
    stats
}
