//! Selection of the active shading variant.

use std::collections::HashMap;

use tracing::info;
use vkengine_resources::MaterialId;

/// Shading variant applied to switchable materials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShadingMode {
    /// Vertex colors.
    #[default]
    Colored,
    /// Surface normals mapped to RGB.
    Normals,
}

impl ShadingMode {
    pub const ALL: [ShadingMode; 2] = [ShadingMode::Colored, ShadingMode::Normals];

    pub fn next(self) -> Self {
        match self {
            ShadingMode::Colored => ShadingMode::Normals,
            ShadingMode::Normals => ShadingMode::Colored,
        }
    }

    /// Fragment shader file for this variant.
    pub fn fragment_shader(self) -> &'static str {
        match self {
            ShadingMode::Colored => "colored.frag.spv",
            ShadingMode::Normals => "normals.frag.spv",
        }
    }
}

/// Maps a switchable material to the variant for the active [`ShadingMode`].
///
/// Objects whose material is not the switchable one draw unchanged.
#[derive(Clone, Debug, Default)]
pub struct ShadingSelector {
    mode: ShadingMode,
    switchable: Option<MaterialId>,
    variants: HashMap<ShadingMode, MaterialId>,
}

impl ShadingSelector {
    /// Makes `switchable` resolve to `variants[mode]`.
    pub fn new(switchable: MaterialId, variants: HashMap<ShadingMode, MaterialId>) -> Self {
        Self {
            mode: ShadingMode::default(),
            switchable: Some(switchable),
            variants,
        }
    }

    pub fn mode(&self) -> ShadingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ShadingMode) {
        self.mode = mode;
    }

    /// Advances to the next mode and returns it.
    pub fn cycle(&mut self) -> ShadingMode {
        self.mode = self.mode.next();
        info!("Shading mode: {:?}", self.mode);
        self.mode
    }

    /// Material to draw with in place of `material`.
    pub fn resolve(&self, material: MaterialId) -> MaterialId {
        if self.switchable != Some(material) {
            return material;
        }
        self.variants.get(&self.mode).copied().unwrap_or(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkengine_resources::{Material, Registry};

    #[test]
    fn test_cycle_wraps() {
        let mut selector = ShadingSelector::default();
        assert_eq!(selector.cycle(), ShadingMode::Normals);
        assert_eq!(selector.cycle(), ShadingMode::Colored);
    }

    #[test]
    fn test_resolve_substitutes_only_switchable_material() {
        let mut materials = Registry::new();
        let colored = materials.insert("defaultmesh", Material::default());
        let normals = materials.insert("normals", Material::default());
        let other = materials.insert("other", Material::default());

        let mut selector = ShadingSelector::new(
            colored,
            HashMap::from([
                (ShadingMode::Colored, colored),
                (ShadingMode::Normals, normals),
            ]),
        );

        assert_eq!(selector.resolve(colored), colored);
        selector.set_mode(ShadingMode::Normals);
        assert_eq!(selector.resolve(colored), normals);
        assert_eq!(selector.resolve(other), other);
    }

    #[test]
    fn test_missing_variant_keeps_material() {
        let mut materials = Registry::new();
        let base = materials.insert("base", Material::default());
        let mut selector = ShadingSelector::new(base, HashMap::new());
        selector.set_mode(ShadingMode::Normals);
        assert_eq!(selector.resolve(base), base);
    }
}
