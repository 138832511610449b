//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Startup settings for the engine.
///
/// Defaults match the stock demo scene; [`EngineConfig::from_env`] layers
/// `VKENGINE_*` environment overrides on top of them.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Window title.
    pub title: String,
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// Request the Khronos validation layer.
    pub enable_validation: bool,
    /// Upper bound for every fence wait and image acquisition.
    pub frame_timeout: Duration,
    /// Directory holding the compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
    /// OBJ file loaded as the main mesh.
    pub mesh_path: PathBuf,
    /// Number of frames for one full cycle of the clear-colour heartbeat.
    pub heartbeat_period: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Engine".to_string(),
            width: 950,
            height: 700,
            enable_validation: cfg!(debug_assertions),
            frame_timeout: Duration::from_secs(1),
            shader_dir: PathBuf::from("shaders/spirv"),
            mesh_path: PathBuf::from("assets/sphere_smooth.obj"),
            heartbeat_period: 120,
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied, validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("VKENGINE_WIDTH") {
            config.width = parse("VKENGINE_WIDTH", &value)?;
        }
        if let Some(value) = lookup("VKENGINE_HEIGHT") {
            config.height = parse("VKENGINE_HEIGHT", &value)?;
        }
        if let Some(value) = lookup("VKENGINE_VALIDATION") {
            config.enable_validation = matches!(value.as_str(), "1" | "true" | "on" | "yes");
        }
        if let Some(value) = lookup("VKENGINE_FRAME_TIMEOUT_MS") {
            config.frame_timeout =
                Duration::from_millis(parse("VKENGINE_FRAME_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = lookup("VKENGINE_SHADER_DIR") {
            config.shader_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("VKENGINE_MESH") {
            config.mesh_path = PathBuf::from(value);
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the window extent.
    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the synchronization timeout.
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Sets the mesh file loaded at startup.
    pub fn with_mesh_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mesh_path = path.into();
        self
    }

    /// Rejects values the engine cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero extent, a zero timeout or a zero
    /// heartbeat period.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window extent must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_timeout.is_zero() {
            return Err(Error::Config("frame timeout must be non-zero".to_string()));
        }
        if self.heartbeat_period == 0 {
            return Err(Error::Config(
                "heartbeat period must be at least one frame".to_string(),
            ));
        }
        Ok(())
    }

    /// Frame timeout in nanoseconds, the unit Vulkan waits take.
    pub fn frame_timeout_ns(&self) -> u64 {
        u64::try_from(self.frame_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!((config.width, config.height), (950, 700));
        assert_eq!(config.frame_timeout, Duration::from_secs(1));
        assert_eq!(config.frame_timeout_ns(), 1_000_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("VKENGINE_WIDTH", "1280"),
            ("VKENGINE_HEIGHT", " 720 "),
            ("VKENGINE_VALIDATION", "off"),
            ("VKENGINE_FRAME_TIMEOUT_MS", "250"),
            ("VKENGINE_MESH", "assets/cube.obj"),
        ]))
        .unwrap();

        assert_eq!((config.width, config.height), (1280, 720));
        assert!(!config.enable_validation);
        assert_eq!(config.frame_timeout, Duration::from_millis(250));
        assert_eq!(config.mesh_path, PathBuf::from("assets/cube.obj"));
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let result = EngineConfig::from_lookup(lookup(&[("VKENGINE_WIDTH", "wide")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_extent_rejected() {
        let config = EngineConfig::default().with_extent(0, 700);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = EngineConfig::default().with_frame_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
