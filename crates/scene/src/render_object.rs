//! Render objects and the ordered list the dispatcher walks.

use glam::Mat4;
use vkengine_resources::{MaterialId, MeshId};

/// One draw: a mesh, the material to draw it with and a model transform.
///
/// The ids are non-owning; the registries own the mesh and material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderObject {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub transform: Mat4,
}

impl RenderObject {
    pub fn new(mesh: MeshId, material: MaterialId, transform: Mat4) -> Self {
        Self {
            mesh,
            material,
            transform,
        }
    }
}

/// Render objects in draw order.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    objects: Vec<RenderObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: RenderObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    /// Mutable access for per-frame transform updates.
    pub fn objects_mut(&mut self) -> &mut [RenderObject] {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}
