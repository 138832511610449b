//! Error types for resource loading and upload.

use std::path::PathBuf;

use thiserror::Error;
use vkengine_rhi::RhiError;

/// Error type for mesh loading and upload.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The OBJ parser rejected the file.
    #[error("Failed to load OBJ file '{path}': {message}")]
    ObjLoad {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file parsed but holds no triangles.
    #[error("OBJ file '{0}' contains no triangles")]
    NoMeshes(PathBuf),

    /// The mesh already owns a GPU buffer.
    #[error("Mesh is already uploaded")]
    AlreadyUploaded,

    /// A mesh with no vertices cannot back a buffer.
    #[error("Mesh has no vertices")]
    EmptyMesh,

    /// Buffer creation or the copy into it failed.
    #[error("GPU resource creation failed: {0}")]
    Gpu(#[from] RhiError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
