//! Graphics pipeline construction.
//!
//! [`PipelineBuilder`] collects the facets of a graphics pipeline through
//! consuming setters and turns them into a `vk::Pipeline` with one terminal
//! [`build`](PipelineBuilder::build) call. Optional facets fall back to their
//! defaults at build time:
//!
//! | facet | default |
//! |---|---|
//! | topology | triangle list |
//! | polygon mode | fill |
//! | depth test / write / compare | off / off / always |
//! | vertex input | none |
//!
//! Shader stages, viewport, scissor and layout have no default. Building
//! without them fails with [`RhiError::PipelineCreation`] before the driver
//! is called.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use vkengine_rhi::pipeline::{CompareOp, PipelineBuilder};
//! use vkengine_rhi::shader::ShaderStage;
//! use vkengine_rhi::vertex::Vertex;
//!
//! # fn example(
//! #     device: &ash::Device,
//! #     render_pass: vk::RenderPass,
//! #     layout: vk::PipelineLayout,
//! #     vert: vk::ShaderModule,
//! #     frag: vk::ShaderModule,
//! # ) -> vkengine_rhi::RhiResult<()> {
//! let extent = vk::Extent2D { width: 950, height: 700 };
//! let pipeline = PipelineBuilder::new()
//!     .add_shader_stage(ShaderStage::Vertex, vert)
//!     .add_shader_stage(ShaderStage::Fragment, frag)
//!     .vertex_input(&[Vertex::binding_description()], &Vertex::attribute_descriptions())
//!     .viewport_and_scissor_for(extent)
//!     .depth_testing(true, true, CompareOp::LessOrEqual)
//!     .pipeline_layout(layout)
//!     .build(device, render_pass)?;
//! # Ok(())
//! # }
//! ```

use ash::vk;
use tracing::debug;
use vkengine_core::DeletionQueue;

use crate::error::{RhiError, RhiResult};
use crate::shader::{ENTRY_POINT, ShaderStage};

/// How vertices are assembled into primitives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

/// How primitives are rasterized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

impl PolygonMode {
    pub fn to_vk(self) -> vk::PolygonMode {
        match self {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
        }
    }
}

/// Depth comparison function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    #[default]
    Always,
}

impl CompareOp {
    pub fn to_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::Equal => vk::CompareOp::EQUAL,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
            CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

/// Depth test configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: CompareOp,
}

/// Fully resolved pipeline description: every facet has a value.
#[derive(Clone, Debug)]
pub struct PipelineState {
    pub stages: Vec<(ShaderStage, vk::ShaderModule)>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: PrimitiveTopology,
    pub polygon_mode: PolygonMode,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub depth: DepthState,
    pub layout: vk::PipelineLayout,
}

/// Accumulates graphics pipeline settings.
#[derive(Clone, Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<(ShaderStage, vk::ShaderModule)>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    topology: Option<PrimitiveTopology>,
    polygon_mode: Option<PolygonMode>,
    viewport: Option<vk::Viewport>,
    scissor: Option<vk::Rect2D>,
    depth: Option<DepthState>,
    layout: Option<vk::PipelineLayout>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Stages keep the order they were added in.
    pub fn add_shader_stage(mut self, stage: ShaderStage, module: vk::ShaderModule) -> Self {
        self.stages.push((stage, module));
        self
    }

    /// Drops every stage added so far.
    pub fn clear_shader_stages(mut self) -> Self {
        self.stages.clear();
        self
    }

    pub fn vertex_input(
        mut self,
        bindings: &[vk::VertexInputBindingDescription],
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_bindings = bindings.to_vec();
        self.vertex_attributes = attributes.to_vec();
        self
    }

    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.polygon_mode = Some(mode);
        self
    }

    pub fn viewport(mut self, viewport: vk::Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn scissor(mut self, scissor: vk::Rect2D) -> Self {
        self.scissor = Some(scissor);
        self
    }

    /// Full-extent viewport (depth 0..1) and matching scissor.
    pub fn viewport_and_scissor_for(self, extent: vk::Extent2D) -> Self {
        self.viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        })
        .scissor(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
    }

    pub fn depth_testing(mut self, test: bool, write: bool, compare: CompareOp) -> Self {
        self.depth = Some(DepthState {
            test,
            write,
            compare,
        });
        self
    }

    pub fn pipeline_layout(mut self, layout: vk::PipelineLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Applies defaults and checks the mandatory facets.
    ///
    /// # Errors
    ///
    /// [`RhiError::PipelineCreation`] when no stage, viewport, scissor or
    /// layout was given, or the viewport is empty. A negative height is a
    /// Y-flipped viewport (core since Vulkan 1.1) and is accepted.
    pub fn resolve(&self) -> RhiResult<PipelineState> {
        if self.stages.is_empty() {
            return Err(RhiError::PipelineCreation("no shader stages".to_string()));
        }
        let viewport = self
            .viewport
            .ok_or_else(|| RhiError::PipelineCreation("viewport not set".to_string()))?;
        let scissor = self
            .scissor
            .ok_or_else(|| RhiError::PipelineCreation("scissor not set".to_string()))?;
        let layout = self
            .layout
            .ok_or_else(|| RhiError::PipelineCreation("pipeline layout not set".to_string()))?;

        if viewport.width <= 0.0 || viewport.height == 0.0 {
            return Err(RhiError::PipelineCreation(format!(
                "empty viewport {}x{}",
                viewport.width, viewport.height
            )));
        }

        Ok(PipelineState {
            stages: self.stages.clone(),
            vertex_bindings: self.vertex_bindings.clone(),
            vertex_attributes: self.vertex_attributes.clone(),
            topology: self.topology.unwrap_or_default(),
            polygon_mode: self.polygon_mode.unwrap_or_default(),
            viewport,
            scissor,
            depth: self.depth.unwrap_or_default(),
            layout,
        })
    }

    /// Creates the pipeline for subpass 0 of `render_pass`.
    ///
    /// The caller owns the returned handle and is responsible for
    /// registering its destruction.
    ///
    /// # Errors
    ///
    /// [`RhiError::PipelineCreation`] if a mandatory facet is missing or the
    /// driver rejects the combined state.
    pub fn build(self, device: &ash::Device, render_pass: vk::RenderPass) -> RhiResult<vk::Pipeline> {
        let state = self.resolve()?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo<'_>> = state
            .stages
            .iter()
            .map(|&(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.to_vk())
                    .module(module)
                    .name(ENTRY_POINT)
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&state.vertex_bindings)
            .vertex_attribute_descriptions(&state.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(state.topology.to_vk())
            .primitive_restart_enable(false);

        let viewports = [state.viewport];
        let scissors = [state.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(state.polygon_mode.to_vk())
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth.test)
            .depth_write_enable(state.depth.write)
            .depth_compare_op(if state.depth.test {
                state.depth.compare.to_vk()
            } else {
                vk::CompareOp::ALWAYS
            })
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op(vk::LogicOp::COPY)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .layout(state.layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| RhiError::PipelineCreation(format!("driver rejected pipeline: {:?}", e)))?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineCreation("driver returned no pipeline".to_string()))?;

        debug!(
            "Graphics pipeline created ({} stages, {:?}, depth {:?})",
            state.stages.len(),
            state.topology,
            state.depth
        );
        Ok(pipeline)
    }
}

/// Creates a pipeline layout with only push constant ranges and registers
/// its destruction.
pub fn create_pipeline_layout(
    device: &ash::Device,
    push_constant_ranges: &[vk::PushConstantRange],
    deletion_queue: &mut DeletionQueue,
) -> RhiResult<vk::PipelineLayout> {
    let create_info =
        vk::PipelineLayoutCreateInfo::default().push_constant_ranges(push_constant_ranges);
    let layout = unsafe { device.create_pipeline_layout(&create_info, None)? };

    let owner = device.clone();
    deletion_queue.push("pipeline layout", move || unsafe {
        owner.destroy_pipeline_layout(layout, None);
    });

    Ok(layout)
}

/// Registers destruction of a pipeline returned by [`PipelineBuilder::build`].
pub fn register_pipeline(
    device: &ash::Device,
    pipeline: vk::Pipeline,
    deletion_queue: &mut DeletionQueue,
) {
    let owner = device.clone();
    deletion_queue.push("pipeline", move || unsafe {
        owner.destroy_pipeline(pipeline, None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn complete() -> PipelineBuilder {
        PipelineBuilder::new()
            .add_shader_stage(ShaderStage::Vertex, vk::ShaderModule::from_raw(1))
            .add_shader_stage(ShaderStage::Fragment, vk::ShaderModule::from_raw(2))
            .viewport_and_scissor_for(vk::Extent2D {
                width: 950,
                height: 700,
            })
            .pipeline_layout(vk::PipelineLayout::from_raw(3))
    }

    #[test]
    fn test_defaults_applied_at_resolve() {
        let state = complete().resolve().unwrap();
        assert_eq!(state.topology, PrimitiveTopology::TriangleList);
        assert_eq!(state.polygon_mode, PolygonMode::Fill);
        assert_eq!(
            state.depth,
            DepthState {
                test: false,
                write: false,
                compare: CompareOp::Always
            }
        );
        assert!(state.vertex_bindings.is_empty());
        assert_eq!(state.scissor.extent.width, 950);
        assert_eq!(state.viewport.height, 700.0);
    }

    #[test]
    fn test_explicit_facets_win() {
        let state = complete()
            .topology(PrimitiveTopology::LineList)
            .polygon_mode(PolygonMode::Line)
            .depth_testing(true, true, CompareOp::LessOrEqual)
            .resolve()
            .unwrap();
        assert_eq!(state.topology, PrimitiveTopology::LineList);
        assert_eq!(state.polygon_mode, PolygonMode::Line);
        assert!(state.depth.test && state.depth.write);
        assert_eq!(state.depth.compare.to_vk(), vk::CompareOp::LESS_OR_EQUAL);
    }

    #[test]
    fn test_stage_order_preserved() {
        let state = complete().resolve().unwrap();
        let order: Vec<_> = state.stages.iter().map(|(stage, _)| *stage).collect();
        assert_eq!(order, vec![ShaderStage::Vertex, ShaderStage::Fragment]);
    }

    #[test]
    fn test_missing_viewport_fails() {
        let builder = PipelineBuilder::new()
            .add_shader_stage(ShaderStage::Vertex, vk::ShaderModule::from_raw(1))
            .scissor(vk::Rect2D::default())
            .pipeline_layout(vk::PipelineLayout::from_raw(3));
        let err = builder.resolve().unwrap_err();
        assert!(matches!(err, RhiError::PipelineCreation(ref m) if m.contains("viewport")));
    }

    #[test]
    fn test_missing_scissor_fails() {
        let builder = PipelineBuilder::new()
            .add_shader_stage(ShaderStage::Vertex, vk::ShaderModule::from_raw(1))
            .viewport(vk::Viewport {
                width: 10.0,
                height: 10.0,
                max_depth: 1.0,
                ..Default::default()
            })
            .pipeline_layout(vk::PipelineLayout::from_raw(3));
        let err = builder.resolve().unwrap_err();
        assert!(matches!(err, RhiError::PipelineCreation(ref m) if m.contains("scissor")));
    }

    #[test]
    fn test_missing_layout_and_stages_fail() {
        let no_layout = complete().clone();
        let no_layout = PipelineBuilder {
            layout: None,
            ..no_layout
        };
        assert!(matches!(
            no_layout.resolve(),
            Err(RhiError::PipelineCreation(_))
        ));

        let no_stages = complete().clear_shader_stages();
        assert!(matches!(
            no_stages.resolve(),
            Err(RhiError::PipelineCreation(_))
        ));
    }

    #[test]
    fn test_zero_sized_viewport_rejected() {
        let builder = complete().viewport_and_scissor_for(vk::Extent2D {
            width: 0,
            height: 0,
        });
        assert!(builder.resolve().is_err());
    }

    #[test]
    fn test_flipped_viewport_accepted() {
        let flipped = vk::Viewport {
            y: 700.0,
            width: 950.0,
            height: -700.0,
            max_depth: 1.0,
            ..Default::default()
        };
        let state = complete().viewport(flipped).resolve().unwrap();
        assert_eq!(state.viewport.height, -700.0);

        let flat = vk::Viewport {
            height: 0.0,
            ..flipped
        };
        assert!(matches!(
            complete().viewport(flat).resolve(),
            Err(RhiError::PipelineCreation(ref m)) if m.contains("empty viewport")
        ));
    }

    #[test]
    fn test_enum_conversions() {
        assert_eq!(
            PrimitiveTopology::TriangleStrip.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_STRIP
        );
        assert_eq!(PolygonMode::Point.to_vk(), vk::PolygonMode::POINT);
        assert_eq!(CompareOp::Never.to_vk(), vk::CompareOp::NEVER);
        assert_eq!(CompareOp::default(), CompareOp::Always);
    }
}
