//! SPIR-V shader modules.
//!
//! Modules only live for the duration of pipeline construction; the
//! [`ShaderModule`] guard destroys the module when it goes out of scope. The
//! entry point is always `main`.

use std::ffi::CStr;
use std::fmt;
use std::io::Cursor;
use std::path::Path;

use ash::vk;
use tracing::debug;

use crate::error::{RhiError, RhiResult};

/// Entry point used for every stage.
pub const ENTRY_POINT: &CStr = c"main";

/// Pipeline stage a module is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Reads SPIR-V words from `bytes`.
///
/// The blob must be a whole number of 32-bit words. Endianness is detected
/// from the magic number.
pub fn parse_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(RhiError::Shader(format!(
            "SPIR-V must be a non-empty multiple of 4 bytes, got {}",
            bytes.len()
        )));
    }
    ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| RhiError::Shader(format!("invalid SPIR-V: {}", e)))
}

/// Shader module destroyed on drop.
pub struct ShaderModule {
    device: ash::Device,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl ShaderModule {
    /// Loads `path` and creates a module for `stage`.
    ///
    /// # Errors
    ///
    /// [`RhiError::Shader`] if the file is missing or not SPIR-V,
    /// [`RhiError::Vulkan`] if the driver rejects the module.
    pub fn from_file(device: &ash::Device, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| RhiError::Shader(format!("cannot read {}: {}", path.display(), e)))?;
        let code = parse_spirv(&bytes)?;

        let module = Self::from_words(device, &code, stage)?;
        debug!("Loaded {} shader {}", stage, path.display());
        Ok(module)
    }

    pub fn from_words(device: &ash::Device, code: &[u32], stage: ShaderStage) -> RhiResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { device.create_shader_module(&create_info, None)? };

        Ok(Self {
            device: device.clone(),
            module,
            stage,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_stage_flags() {
        assert_eq!(ShaderStage::Vertex.to_vk(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.to_vk(), vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_parse_spirv_words() {
        let mut bytes = MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&42u32.to_le_bytes());
        assert_eq!(parse_spirv(&bytes).unwrap(), vec![MAGIC, 42]);
    }

    #[test]
    fn test_parse_spirv_rejects_misaligned() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00];
        assert!(matches!(parse_spirv(&bytes), Err(RhiError::Shader(_))));
        assert!(matches!(parse_spirv(&[]), Err(RhiError::Shader(_))));
    }
}
