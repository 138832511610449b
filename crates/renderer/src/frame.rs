//! Vulkan frame slots and the [`FrameBackend`] built on them.

use tracing::{debug, info};
use vkengine_core::DeletionQueue;
use vkengine_rhi::command::{CommandBuffer, CommandPool};
use vkengine_rhi::swapchain::{AcquireResult, PresentResult, Swapchain};
use vkengine_rhi::sync::{Fence, Semaphore};
use vkengine_rhi::{RhiResult, vk};

use crate::depth_buffer::DEPTH_CLEAR;
use crate::dispatch::DrawRecorder;
use crate::push_constants::MeshPushConstants;
use crate::scheduler::{FRAME_OVERLAP, FrameBackend};

/// Primary command buffer of one frame slot.
///
/// Each slot allocates from its own pool, which the deletion queue destroys.
pub struct FrameCommands {
    buffer: CommandBuffer,
}

impl FrameCommands {
    /// One pool + primary buffer per slot on the graphics family.
    pub fn create_all(
        device: &ash::Device,
        graphics_family: u32,
        deletion_queue: &mut DeletionQueue,
    ) -> RhiResult<Vec<FrameCommands>> {
        (0..FRAME_OVERLAP)
            .map(|_| {
                let pool = CommandPool::new(device, graphics_family, deletion_queue)?;
                let buffer = pool.allocate_command_buffer()?;
                Ok(FrameCommands { buffer })
            })
            .collect()
    }
}

/// Synchronization primitives of one frame slot.
pub struct FrameSync {
    /// Signaled when the acquired image may be rendered to.
    present_semaphore: Semaphore,
    /// Signaled when the slot's commands finished; presentation waits on it.
    render_semaphore: Semaphore,
    /// Signaled when the slot's submission completed. Created signaled.
    render_fence: Fence,
}

impl FrameSync {
    pub fn create_all(
        device: &ash::Device,
        deletion_queue: &mut DeletionQueue,
    ) -> RhiResult<Vec<FrameSync>> {
        (0..FRAME_OVERLAP)
            .map(|_| {
                Ok(FrameSync {
                    render_fence: Fence::new(device, true, deletion_queue)?,
                    present_semaphore: Semaphore::new(device, deletion_queue)?,
                    render_semaphore: Semaphore::new(device, deletion_queue)?,
                })
            })
            .collect()
    }
}

struct FrameSlot {
    commands: FrameCommands,
    sync: FrameSync,
}

/// Records dispatcher output into a slot's command buffer.
pub struct CommandRecorder {
    buffer: CommandBuffer,
}

impl DrawRecorder for CommandRecorder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.buffer.bind_graphics_pipeline(pipeline);
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        self.buffer.bind_vertex_buffer(buffer);
    }

    fn push_constants(&mut self, layout: vk::PipelineLayout, constants: &MeshPushConstants) {
        self.buffer
            .push_constants(layout, MeshPushConstants::STAGES, constants);
    }

    fn draw(&mut self, vertex_count: u32) {
        self.buffer.draw(vertex_count, 0);
    }
}

/// Swapchain, render pass, framebuffers and the frame slots.
///
/// Owns no Vulkan object's lifetime: everything here was registered in the
/// deletion queue when created.
pub struct VulkanFrameBackend {
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    slots: Vec<FrameSlot>,
}

/// Handles [`VulkanFrameBackend::new`] assembles.
pub struct FrameTargets {
    pub swapchain: Swapchain,
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

impl VulkanFrameBackend {
    pub fn new(targets: FrameTargets, commands: Vec<FrameCommands>, sync: Vec<FrameSync>) -> Self {
        let slots: Vec<FrameSlot> = commands
            .into_iter()
            .zip(sync)
            .map(|(commands, sync)| FrameSlot { commands, sync })
            .collect();
        debug_assert_eq!(slots.len(), FRAME_OVERLAP);

        info!(
            "Frame backend ready: {} slots, {} swapchain images",
            slots.len(),
            targets.framebuffers.len()
        );

        Self {
            swapchain: targets.swapchain,
            render_pass: targets.render_pass,
            framebuffers: targets.framebuffers,
            graphics_queue: targets.graphics_queue,
            present_queue: targets.present_queue,
            slots,
        }
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

impl FrameBackend for VulkanFrameBackend {
    type Recorder = CommandRecorder;

    fn wait_for_fence(&mut self, slot: usize, timeout_ns: u64) -> RhiResult<bool> {
        self.slots[slot].sync.render_fence.wait(timeout_ns)
    }

    fn reset_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.slots[slot].sync.render_fence.reset()
    }

    fn signal_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.slots[slot]
            .sync
            .render_fence
            .signal_on(self.graphics_queue)
    }

    fn acquire_image(&mut self, slot: usize, timeout_ns: u64) -> RhiResult<AcquireResult> {
        self.swapchain
            .acquire(self.slots[slot].sync.present_semaphore.handle(), timeout_ns)
    }

    fn begin_commands(&mut self, slot: usize) -> RhiResult<()> {
        let buffer = &self.slots[slot].commands.buffer;
        buffer.reset()?;
        buffer.begin_one_time()
    }

    fn begin_render_pass(&mut self, slot: usize, image_index: u32, clear_color: [f32; 4]) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: DEPTH_CLEAR,
            },
        ];

        // Image indices come from acquire and are always < image count.
        let framebuffer = self.framebuffers[image_index as usize];
        self.slots[slot].commands.buffer.begin_render_pass(
            self.render_pass,
            framebuffer,
            self.swapchain.extent(),
            &clear_values,
        );
    }

    fn recorder(&mut self, slot: usize) -> CommandRecorder {
        CommandRecorder {
            buffer: self.slots[slot].commands.buffer.clone(),
        }
    }

    fn end_commands(&mut self, slot: usize) -> RhiResult<()> {
        let buffer = &self.slots[slot].commands.buffer;
        buffer.end_render_pass();
        buffer.end()
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        let FrameSlot { commands, sync } = &self.slots[slot];
        commands.buffer.submit(
            self.graphics_queue,
            sync.present_semaphore.handle(),
            sync.render_semaphore.handle(),
            sync.render_fence.handle(),
        )
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentResult> {
        let result = self.swapchain.present(
            self.present_queue,
            image_index,
            self.slots[slot].sync.render_semaphore.handle(),
        )?;
        if result != PresentResult::Presented {
            debug!("Present returned {:?}", result);
        }
        Ok(result)
    }
}
