//! Meshes, materials and the registries that own them.
//!
//! - [`Mesh`]: vertex list, OBJ loading and vertex buffer upload
//! - [`Material`]: pipeline + layout pair
//! - [`Registry`]: name-keyed storage with typed handles

mod error;

pub mod material;
pub mod mesh;
pub mod registry;

pub use error::{ResourceError, ResourceResult};
pub use material::Material;
pub use mesh::{Mesh, ObjLoadReport, green_triangle};
pub use registry::{Handle, Registry};

/// Handle to a mesh in a `Registry<Mesh>`.
pub type MeshId = Handle<Mesh>;
/// Handle to a material in a `Registry<Material>`.
pub type MaterialId = Handle<Material>;
