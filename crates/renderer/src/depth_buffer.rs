//! Depth attachment shared by every framebuffer.

use tracing::info;
use vkengine_core::DeletionQueue;
use vkengine_rhi::RhiResult;
use vkengine_rhi::allocator::{AllocatedImage, GpuAllocator, MemoryUsage};
use vkengine_rhi::vk;

/// 32-bit float depth.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth cleared to the far plane every frame.
pub const DEPTH_CLEAR: vk::ClearDepthStencilValue = vk::ClearDepthStencilValue {
    depth: 1.0,
    stencil: 0,
};

/// GPU-only depth image and its view.
#[derive(Clone, Copy, Debug)]
pub struct DepthBuffer {
    image: AllocatedImage,
    view: vk::ImageView,
}

impl DepthBuffer {
    /// Creates the image through the allocator and its view.
    ///
    /// The image is registered in `deletion_queue` before the view, so the
    /// view is destroyed first.
    pub fn new(
        device: &ash::Device,
        allocator: &GpuAllocator,
        extent: vk::Extent2D,
        deletion_queue: &mut DeletionQueue,
    ) -> RhiResult<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = allocator.create_image(&image_info, MemoryUsage::GpuOnly, "depth image")?;
        let owner = allocator.clone();
        deletion_queue.push("depth image", move || owner.destroy_image(image));

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .level_count(1)
                    .layer_count(1),
            );
        let view = unsafe { device.create_image_view(&view_info, None)? };
        let owner = device.clone();
        deletion_queue.push("depth image view", move || unsafe {
            owner.destroy_image_view(view, None);
        });

        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, DEPTH_FORMAT
        );
        Ok(Self { image, view })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format
    }
}
