//! Command pool and command buffer recording.
//!
//! Each frame slot owns one [`CommandPool`] with a single primary
//! [`CommandBuffer`]. The pool is destroyed through the deletion queue, which
//! also frees the buffers allocated from it.

use ash::vk;
use bytemuck::Pod;
use tracing::debug;
use vkengine_core::DeletionQueue;

use crate::error::RhiResult;

/// Vulkan command pool.
///
/// Created with `RESET_COMMAND_BUFFER` so the frame's buffer can be reset on
/// its own every time the slot comes around.
#[derive(Clone)]
pub struct CommandPool {
    device: ash::Device,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a pool for `queue_family_index` and registers its destruction.
    pub fn new(
        device: &ash::Device,
        queue_family_index: u32,
        deletion_queue: &mut DeletionQueue,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&create_info, None)? };

        let owner = device.clone();
        deletion_queue.push("command pool", move || unsafe {
            owner.destroy_command_pool(pool, None);
        });

        debug!("Command pool created for queue family {}", queue_family_index);

        Ok(Self {
            device: device.clone(),
            pool,
            queue_family_index,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocates one primary command buffer.
    pub fn allocate_command_buffer(&self) -> RhiResult<CommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info)? };
        let buffer = buffers
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;

        Ok(CommandBuffer {
            device: self.device.clone(),
            buffer,
        })
    }
}

/// Primary command buffer with the recording calls the renderer uses.
#[derive(Clone)]
pub struct CommandBuffer {
    device: ash::Device,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Returns the buffer to the initial state.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    /// Begins recording for a single submission.
    pub fn begin_one_time(&self) -> RhiResult<()> {
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(self.buffer, &begin_info)? };
        Ok(())
    }

    pub fn end(&self) -> RhiResult<()> {
        unsafe { self.device.end_command_buffer(self.buffer)? };
        Ok(())
    }

    /// Begins `render_pass` on `framebuffer` covering the whole `extent`.
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.buffer, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    pub fn end_render_pass(&self) {
        unsafe { self.device.cmd_end_render_pass(self.buffer) };
    }

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Binds `buffer` at binding 0, offset 0.
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[0]);
        }
    }

    /// Pushes `data` at offset 0 for the given stages.
    pub fn push_constants<T: Pod>(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &T,
    ) {
        unsafe {
            self.device.cmd_push_constants(
                self.buffer,
                layout,
                stages,
                0,
                bytemuck::bytes_of(data),
            );
        }
    }

    /// Non-indexed, single-instance draw.
    pub fn draw(&self, vertex_count: u32, first_vertex: u32) {
        unsafe {
            self.device
                .cmd_draw(self.buffer, vertex_count, 1, first_vertex, 0);
        }
    }

    /// Submits this buffer to `queue`.
    ///
    /// Waits on `wait` at the color-attachment-output stage, signals
    /// `signal`, and signals `fence` on completion.
    pub fn submit(
        &self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> RhiResult<()> {
        let wait_semaphores = [wait];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal];
        let command_buffers = [self.buffer];

        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe { self.device.queue_submit(queue, &[submit], fence)? };
        Ok(())
    }
}
