//! GPU memory allocation for buffers and images.
//!
//! [`GpuAllocator`] wraps `gpu_allocator`'s Vulkan allocator. Callers describe
//! only their access intent with [`MemoryUsage`]; memory-type selection,
//! suballocation and alignment stay inside this module.
//!
//! Buffers and images come back as small `Copy` handle pairs (the Vulkan
//! object plus an [`AllocationId`]) so a deletion-queue closure can capture
//! them by value together with a clone of the allocator.
//!
//! Memory is written through a scoped [`MappedRange`]: creating it is the
//! map, dropping it is the unmap (with a flush when the memory type is not
//! host-coherent).

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// Access intent for an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryUsage {
    /// Written by the CPU, read by the GPU. Persistently mapped.
    CpuToGpu,
    /// Device-local, never touched by the CPU.
    GpuOnly,
}

impl MemoryUsage {
    pub fn location(self) -> MemoryLocation {
        match self {
            MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
            MemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        }
    }

    pub fn is_host_visible(self) -> bool {
        matches!(self, MemoryUsage::CpuToGpu)
    }
}

/// Allocator-side half of a buffer or image handle pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllocationId(u64);

impl AllocationId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A buffer and the allocation backing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub allocation: AllocationId,
    pub size: vk::DeviceSize,
    pub memory: MemoryUsage,
}

/// An image and the allocation backing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatedImage {
    pub image: vk::Image,
    pub allocation: AllocationId,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}

/// Buffer creation, upload and release.
///
/// The Vulkan path is [`GpuAllocator`]; anything that only needs buffers
/// (mesh upload) is generic over this trait.
pub trait BufferAllocator: Clone + 'static {
    /// Creates a buffer of `size` bytes with memory matching `memory`.
    ///
    /// # Errors
    ///
    /// [`RhiError::Allocation`] if device memory cannot satisfy the request.
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory: MemoryUsage,
    ) -> RhiResult<AllocatedBuffer>;

    /// Copies `bytes` to the start of a host-visible buffer through a scoped
    /// map/unmap.
    fn write(&self, buffer: &AllocatedBuffer, bytes: &[u8]) -> RhiResult<()>;

    /// Destroys the buffer and frees its allocation. Errors are logged.
    fn destroy_buffer(&self, buffer: AllocatedBuffer);
}

struct AllocatorState {
    allocator: Option<Allocator>,
    allocations: HashMap<AllocationId, Allocation>,
    next_id: u64,
}

impl AllocatorState {
    fn allocator_mut(&mut self) -> RhiResult<&mut Allocator> {
        self.allocator.as_mut().ok_or(RhiError::AllocatorShutDown)
    }

    fn insert(&mut self, allocation: Allocation) -> AllocationId {
        let id = AllocationId(self.next_id);
        self.next_id += 1;
        self.allocations.insert(id, allocation);
        id
    }

    /// Frees an allocation that never made it into the map. Errors are
    /// logged.
    fn release_untracked(&mut self, allocation: Allocation, what: &str) {
        let freed = self
            .allocator_mut()
            .and_then(|allocator| allocator.free(allocation).map_err(RhiError::from));
        if let Err(e) = freed {
            error!("Failed to free unbound {} allocation: {}", what, e);
        }
    }

    fn free(&mut self, id: AllocationId) -> RhiResult<()> {
        let Some(allocation) = self.allocations.remove(&id) else {
            warn!("Allocation {:?} freed twice or never allocated", id);
            return Ok(());
        };
        self.allocator_mut()?.free(allocation)?;
        Ok(())
    }
}

/// Shared handle to the device memory allocator.
///
/// Clones refer to the same allocator. After [`GpuAllocator::shutdown`] every
/// call fails with [`RhiError::AllocatorShutDown`].
#[derive(Clone)]
pub struct GpuAllocator {
    device: ash::Device,
    state: Arc<Mutex<AllocatorState>>,
    non_coherent_atom_size: vk::DeviceSize,
}

impl GpuAllocator {
    /// Creates the allocator for `device`.
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> RhiResult<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        let limits = unsafe { instance.get_physical_device_properties(physical_device) }.limits;

        info!("GPU memory allocator initialized");

        Ok(Self {
            device: device.clone(),
            state: Arc::new(Mutex::new(AllocatorState {
                allocator: Some(allocator),
                allocations: HashMap::new(),
                next_id: 0,
            })),
            non_coherent_atom_size: limits.non_coherent_atom_size.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AllocatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.lock().allocations.len()
    }

    /// Maps a host-visible buffer for writing.
    ///
    /// The returned guard holds the allocator lock; drop it before creating
    /// or destroying other resources.
    pub fn map(&self, buffer: &AllocatedBuffer) -> RhiResult<MappedRange<'_>> {
        let state = self.lock();
        if state.allocator.is_none() {
            return Err(RhiError::AllocatorShutDown);
        }

        let allocation = state.allocations.get(&buffer.allocation).ok_or_else(|| {
            RhiError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED)
        })?;
        let ptr = allocation
            .mapped_ptr()
            .ok_or(RhiError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED))?
            .cast::<u8>();

        let flush = if allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            None
        } else {
            // SAFETY: the allocation stays in the map while the lock is held.
            let memory = unsafe { allocation.memory() };
            Some(flush_range(
                memory,
                allocation.offset(),
                buffer.size,
                self.non_coherent_atom_size,
            ))
        };

        let len = usize::try_from(buffer.size.min(allocation.size()))
            .map_err(|_| RhiError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED))?;

        Ok(MappedRange {
            _state: state,
            device: &self.device,
            ptr,
            len,
            flush,
        })
    }

    /// Creates an image with memory matching `memory` and binds it.
    pub fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo<'_>,
        memory: MemoryUsage,
        name: &str,
    ) -> RhiResult<AllocatedImage> {
        let image = unsafe { self.device.create_image(create_info, None)? };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let mut state = self.lock();
        let allocated = state.allocator_mut().and_then(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: memory.location(),
                    linear: create_info.tiling == vk::ImageTiling::LINEAR,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) =
            unsafe { self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
        {
            unsafe { self.device.destroy_image(image, None) };
            state.release_untracked(allocation, name);
            return Err(e.into());
        }

        let id = state.insert(allocation);
        debug!("Created image '{}' {:?} ({:?})", name, create_info.extent, id);

        Ok(AllocatedImage {
            image,
            allocation: id,
            format: create_info.format,
            extent: create_info.extent,
        })
    }

    /// Destroys the image and frees its allocation. Errors are logged.
    pub fn destroy_image(&self, image: AllocatedImage) {
        unsafe { self.device.destroy_image(image.image, None) };
        if let Err(e) = self.lock().free(image.allocation) {
            error!("Failed to free image allocation {:?}: {}", image.allocation, e);
        }
    }

    /// Releases the underlying allocator.
    ///
    /// Allocations still alive at this point are reported and freed. Calling
    /// this twice is harmless.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let Some(mut allocator) = state.allocator.take() else {
            return;
        };

        if !state.allocations.is_empty() {
            warn!(
                "Allocator shut down with {} live allocation(s)",
                state.allocations.len()
            );
        }
        for (id, allocation) in state.allocations.drain() {
            if let Err(e) = allocator.free(allocation) {
                error!("Failed to free leaked allocation {:?}: {}", id, e);
            }
        }

        drop(allocator);
        info!("GPU memory allocator shut down");
    }
}

impl BufferAllocator for GpuAllocator {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory: MemoryUsage,
    ) -> RhiResult<AllocatedBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let mut state = self.lock();
        let allocated = state.allocator_mut().and_then(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: "buffer",
                    requirements,
                    location: memory.location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            unsafe { self.device.destroy_buffer(buffer, None) };
            state.release_untracked(allocation, "buffer");
            return Err(e.into());
        }

        let id = state.insert(allocation);
        debug!("Created {:?} buffer: {} bytes ({:?})", memory, size, id);

        Ok(AllocatedBuffer {
            buffer,
            allocation: id,
            size,
            memory,
        })
    }

    fn write(&self, buffer: &AllocatedBuffer, bytes: &[u8]) -> RhiResult<()> {
        let mut range = self.map(buffer)?;
        let dst = range.get_mut(..bytes.len()).ok_or_else(|| {
            RhiError::Vulkan(vk::Result::ERROR_MEMORY_MAP_FAILED)
        })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        unsafe { self.device.destroy_buffer(buffer.buffer, None) };
        if let Err(e) = self.lock().free(buffer.allocation) {
            error!("Failed to free buffer allocation {:?}: {}", buffer.allocation, e);
        }
    }
}

/// Writable view of mapped buffer memory. Dropping it unmaps.
pub struct MappedRange<'a> {
    _state: MutexGuard<'a, AllocatorState>,
    device: &'a ash::Device,
    ptr: NonNull<u8>,
    len: usize,
    flush: Option<vk::MappedMemoryRange<'static>>,
}

impl Deref for MappedRange<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // The lock keeps the allocation alive for the guard's lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for MappedRange<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedRange<'_> {
    fn drop(&mut self) {
        if let Some(range) = self.flush.take()
            && let Err(e) = unsafe { self.device.flush_mapped_memory_ranges(&[range]) }
        {
            error!("Failed to flush mapped memory: {:?}", e);
        }
    }
}

/// Expands `[offset, offset + size)` to `atom`-aligned bounds.
fn flush_range(
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    atom: vk::DeviceSize,
) -> vk::MappedMemoryRange<'static> {
    let start = offset - offset % atom;
    let end = (offset + size).div_ceil(atom) * atom;
    vk::MappedMemoryRange::default()
        .memory(memory)
        .offset(start)
        .size(end - start)
}
