//! Meshes and their vertex buffers.
//!
//! A [`Mesh`] owns a flat, non-indexed list of [`Vertex`] records. Until
//! [`Mesh::upload`] succeeds it is CPU-only and its vertices may be replaced
//! (for instance by [`Mesh::load_from_obj`]); after upload the vertex list is
//! frozen and the mesh refers to a host-visible vertex buffer whose
//! destruction is registered in the deletion queue.

use std::path::Path;

use glam::Vec3;
use tracing::{debug, info, warn};
use vkengine_core::DeletionQueue;
use vkengine_rhi::allocator::{AllocatedBuffer, BufferAllocator, MemoryUsage};
use vkengine_rhi::vertex::Vertex;
use vkengine_rhi::vk;

use crate::error::{ResourceError, ResourceResult};

/// Non-fatal diagnostics from loading an OBJ file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjLoadReport {
    /// Parser quirks that did not prevent loading.
    pub warnings: Vec<String>,
    /// Triangles read from the file.
    pub triangle_count: usize,
}

/// Triangle list with an optional GPU-resident copy.
#[derive(Debug, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    buffer: Option<AllocatedBuffer>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            buffer: None,
        }
    }

    /// Replaces the vertex list with the triangles of an OBJ file.
    ///
    /// Faces are triangulated by the parser. Vertices are emitted face by
    /// face, three per face, in the file's order. The normal is copied into
    /// the color channel.
    ///
    /// On error the current vertex list is left untouched.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::FileNotFound`] if `path` does not exist
    /// - [`ResourceError::ObjLoad`] if the parser rejects the file
    /// - [`ResourceError::NoMeshes`] if no triangles were found
    /// - [`ResourceError::AlreadyUploaded`] if the mesh is on the GPU already
    pub fn load_from_obj(&mut self, path: impl AsRef<Path>) -> ResourceResult<ObjLoadReport> {
        let path = path.as_ref();
        if self.buffer.is_some() {
            return Err(ResourceError::AlreadyUploaded);
        }
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|e| ResourceError::ObjLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut report = ObjLoadReport::default();
        if let Err(e) = materials {
            report.warnings.push(format!("materials not loaded: {}", e));
        }

        let mut vertices = Vec::new();
        for model in &models {
            let added = append_model_vertices(&model.mesh, &mut vertices);
            if added.missing_normals {
                report
                    .warnings
                    .push(format!("shape '{}' has no normals", model.name));
            }
            if added.skipped_faces > 0 {
                report.warnings.push(format!(
                    "shape '{}': {} faces with out-of-range indices skipped",
                    model.name, added.skipped_faces
                ));
            }
        }

        if vertices.is_empty() {
            return Err(ResourceError::NoMeshes(path.to_path_buf()));
        }

        for warning in &report.warnings {
            warn!("{}: {}", path.display(), warning);
        }

        report.triangle_count = vertices.len() / 3;
        info!(
            "Loaded {} ({} triangles, {} shapes)",
            path.display(),
            report.triangle_count,
            models.len()
        );

        self.vertices = vertices;
        Ok(report)
    }

    /// Creates a host-visible vertex buffer, copies the vertices into it and
    /// registers the buffer's destruction.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::AlreadyUploaded`] on a second call; nothing is allocated
    /// - [`ResourceError::EmptyMesh`] if there are no vertices
    /// - [`ResourceError::Gpu`] if the buffer cannot be created or written
    pub fn upload<A: BufferAllocator>(
        &mut self,
        allocator: &A,
        deletion_queue: &mut DeletionQueue,
    ) -> ResourceResult<()> {
        if self.buffer.is_some() {
            return Err(ResourceError::AlreadyUploaded);
        }
        if self.vertices.is_empty() {
            return Err(ResourceError::EmptyMesh);
        }

        let bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let buffer = allocator.create_buffer(
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryUsage::CpuToGpu,
        )?;

        let owner = allocator.clone();
        deletion_queue.push("vertex buffer", move || owner.destroy_buffer(buffer));

        allocator.write(&buffer, bytes)?;

        debug!(
            "Uploaded {} vertices ({} bytes)",
            self.vertices.len(),
            bytes.len()
        );
        self.buffer = Some(buffer);
        Ok(())
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    #[inline]
    pub fn is_uploaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// GPU vertex buffer, once uploaded.
    #[inline]
    pub fn vertex_buffer(&self) -> Option<vk::Buffer> {
        self.buffer.map(|b| b.buffer)
    }
}

struct AppendStats {
    missing_normals: bool,
    skipped_faces: usize,
}

fn append_model_vertices(mesh: &tobj::Mesh, out: &mut Vec<Vertex>) -> AppendStats {
    let read3 = |data: &[f32], index: usize| -> Option<Vec3> {
        data.get(3 * index..3 * index + 3)
            .map(|v| Vec3::new(v[0], v[1], v[2]))
    };

    let missing_normals = mesh.normals.is_empty();
    let mut skipped_faces = 0;

    for face in mesh.indices.chunks_exact(3) {
        let mut triangle = [Vertex::default(); 3];
        let mut complete = true;

        for (slot, &index) in triangle.iter_mut().zip(face) {
            let index = index as usize;
            let Some(position) = read3(&mesh.positions, index) else {
                complete = false;
                break;
            };
            let normal = read3(&mesh.normals, index).unwrap_or(Vec3::ZERO);
            *slot = Vertex::new(position, normal, normal);
        }

        if complete {
            out.extend_from_slice(&triangle);
        } else {
            skipped_faces += 1;
        }
    }

    AppendStats {
        missing_normals,
        skipped_faces,
    }
}

/// Single triangle with every vertex colored green.
pub fn green_triangle() -> Mesh {
    let green = Vec3::new(0.0, 1.0, 0.0);
    Mesh::new(vec![
        Vertex::new(Vec3::new(1.0, 1.0, 0.0), Vec3::ZERO, green),
        Vertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::ZERO, green),
        Vertex::new(Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO, green),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vkengine_rhi::RhiError;
    use vkengine_rhi::allocator::AllocationId;
    use vkengine_rhi::vk::Handle;

    #[derive(Clone, Default)]
    struct RecordingAllocator {
        created: Rc<RefCell<Vec<(vk::DeviceSize, vk::BufferUsageFlags, MemoryUsage)>>>,
        written: Rc<RefCell<Vec<u8>>>,
        destroyed: Rc<RefCell<Vec<u64>>>,
        fail: bool,
    }

    impl BufferAllocator for RecordingAllocator {
        fn create_buffer(
            &self,
            size: vk::DeviceSize,
            usage: vk::BufferUsageFlags,
            memory: MemoryUsage,
        ) -> vkengine_rhi::RhiResult<AllocatedBuffer> {
            if self.fail {
                return Err(RhiError::AllocatorShutDown);
            }
            let mut created = self.created.borrow_mut();
            created.push((size, usage, memory));
            let id = created.len() as u64;
            Ok(AllocatedBuffer {
                buffer: vk::Buffer::from_raw(id),
                allocation: AllocationId::new(id),
                size,
                memory,
            })
        }

        fn write(&self, _buffer: &AllocatedBuffer, bytes: &[u8]) -> vkengine_rhi::RhiResult<()> {
            self.written.borrow_mut().extend_from_slice(bytes);
            Ok(())
        }

        fn destroy_buffer(&self, buffer: AllocatedBuffer) {
            self.destroyed.borrow_mut().push(buffer.allocation.raw());
        }
    }

    #[test]
    fn test_upload_creates_cpu_visible_vertex_buffer() {
        let allocator = RecordingAllocator::default();
        let mut queue = DeletionQueue::new();
        let mut mesh = green_triangle();

        mesh.upload(&allocator, &mut queue).unwrap();

        let created = allocator.created.borrow();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, 3 * Vertex::size() as u64);
        assert_eq!(created[0].1, vk::BufferUsageFlags::VERTEX_BUFFER);
        assert_eq!(created[0].2, MemoryUsage::CpuToGpu);
        assert_eq!(
            allocator.written.borrow().as_slice(),
            bytemuck::cast_slice::<Vertex, u8>(mesh.vertices())
        );
        assert!(mesh.is_uploaded());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_deletion_queue_destroys_buffer() {
        let allocator = RecordingAllocator::default();
        let mut queue = DeletionQueue::new();
        let mut mesh = green_triangle();
        mesh.upload(&allocator, &mut queue).unwrap();

        assert!(allocator.destroyed.borrow().is_empty());
        queue.flush();
        assert_eq!(*allocator.destroyed.borrow(), vec![1]);
    }

    #[test]
    fn test_second_upload_is_rejected() {
        let allocator = RecordingAllocator::default();
        let mut queue = DeletionQueue::new();
        let mut mesh = green_triangle();
        mesh.upload(&allocator, &mut queue).unwrap();

        let second = mesh.upload(&allocator, &mut queue);
        assert!(matches!(second, Err(ResourceError::AlreadyUploaded)));
        assert_eq!(allocator.created.borrow().len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_allocation_failure_surfaces() {
        let allocator = RecordingAllocator {
            fail: true,
            ..Default::default()
        };
        let mut queue = DeletionQueue::new();
        let mut mesh = green_triangle();

        let result = mesh.upload(&allocator, &mut queue);
        assert!(matches!(result, Err(ResourceError::Gpu(_))));
        assert!(!mesh.is_uploaded());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_mesh_upload_fails() {
        let allocator = RecordingAllocator::default();
        let mut queue = DeletionQueue::new();
        let mut mesh = Mesh::default();
        assert!(matches!(
            mesh.upload(&allocator, &mut queue),
            Err(ResourceError::EmptyMesh)
        ));
    }

    #[test]
    fn test_green_triangle() {
        let mesh = green_triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert!(mesh.vertices().iter().all(|v| v.color == Vec3::Y));
        assert_eq!(mesh.vertex_buffer(), None);
    }

    #[test]
    fn test_append_skips_out_of_range_faces() {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2, 0, 1, 9],
            ..Default::default()
        };
        let mut out = Vec::new();
        let stats = append_model_vertices(&mesh, &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(stats.skipped_faces, 1);
        assert!(stats.missing_normals);
    }
}
