//! Semaphores and fences.
//!
//! Both are created once per frame slot and released through the deletion
//! queue, so the wrappers here are plain handles plus a device clone; they do
//! not destroy anything on drop.

use ash::vk;
use tracing::debug;
use vkengine_core::DeletionQueue;

use crate::error::RhiResult;

/// GPU-to-GPU ordering signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Semaphore {
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates an unsignaled semaphore and registers its destruction.
    pub fn new(device: &ash::Device, deletion_queue: &mut DeletionQueue) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.create_semaphore(&create_info, None)? };

        let device = device.clone();
        deletion_queue.push("semaphore", move || unsafe {
            device.destroy_semaphore(semaphore, None);
        });

        debug!("Created semaphore");
        Ok(Self { semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

/// GPU-to-CPU completion signal.
#[derive(Clone)]
pub struct Fence {
    device: ash::Device,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence and registers its destruction.
    ///
    /// Frame fences start signaled so the first wait on each slot returns
    /// immediately.
    pub fn new(
        device: &ash::Device,
        signaled: bool,
        deletion_queue: &mut DeletionQueue,
    ) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None)? };

        let owner = device.clone();
        deletion_queue.push("fence", move || unsafe {
            owner.destroy_fence(fence, None);
        });

        debug!("Created fence (signaled: {})", signaled);
        Ok(Self {
            device: device.clone(),
            fence,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits up to `timeout_ns` for the fence.
    ///
    /// Returns `Ok(false)` when the timeout elapsed first.
    pub fn wait(&self, timeout_ns: u64) -> RhiResult<bool> {
        match unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the fence to the unsignaled state.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Submits an empty batch to `queue` that signals the fence once the
    /// queue's earlier work completes.
    pub fn signal_on(&self, queue: vk::Queue) -> RhiResult<()> {
        unsafe { self.device.queue_submit(queue, &[], self.fence)? };
        Ok(())
    }
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence").field("fence", &self.fence).finish()
    }
}
