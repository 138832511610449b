//! GPU selection.
//!
//! A GPU qualifies when it has a queue family that can draw, a queue family
//! that can present to the window surface, the swapchain extension and at
//! least Vulkan 1.1. Among qualifying GPUs a discrete one wins.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::instance::REQUIRED_API_VERSION;

/// Device extensions every selected GPU must offer.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Graphics and present queue family indices of the selected GPU.
///
/// Both may be the same family, which is the common case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Everything device creation needs to know about the chosen GPU.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.name())
            .field("type", &self.device_type_name())
            .field(
                "api_version",
                &format!(
                    "{}.{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version),
                    vk::api_version_patch(version)
                ),
            )
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Picks the best GPU able to render to `surface`.
///
/// # Errors
///
/// - [`RhiError::NoSuitableGpu`] if no GPU qualifies
/// - [`RhiError::Vulkan`] if enumeration fails
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    debug!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;
    for device in devices {
        let Some(info) = check_device(instance, device, surface, surface_loader)? else {
            continue;
        };
        let score = device_type_score(info.properties.device_type);
        debug!("GPU '{}' ({}) score {}", info.name(), info.device_type_name(), score);

        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((info, score));
        }
    }

    let (selected, _) = best.ok_or(RhiError::NoSuitableGpu)?;
    info!("Selected GPU: {:?}", selected);
    Ok(selected)
}

fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<Option<PhysicalDeviceInfo>> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if properties.api_version < REQUIRED_API_VERSION {
        debug!("GPU '{}' skipped: Vulkan 1.1 not supported", name);
        return Ok(None);
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    let missing = REQUIRED_DEVICE_EXTENSIONS.iter().find(|required| {
        !extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|n| n == **required))
    });
    if let Some(missing) = missing {
        debug!("GPU '{}' skipped: missing {:?}", name, missing);
        return Ok(None);
    }

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let queue_families = pick_queue_families(&families, |index| unsafe {
        surface_loader
            .get_physical_device_surface_support(device, index, surface)
            .unwrap_or(false)
    });

    let Some(queue_families) = queue_families else {
        debug!("GPU '{}' skipped: no graphics or present queue", name);
        return Ok(None);
    };

    Ok(Some(PhysicalDeviceInfo {
        handle: device,
        properties,
        queue_families,
    }))
}

/// Chooses graphics and present families, preferring one family that does both.
pub fn pick_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilyIndices> {
    let mut graphics = None;
    let mut present = None;

    for (index, family) in (0u32..).zip(families) {
        if family.queue_count == 0 {
            continue;
        }
        let can_draw = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = supports_present(index);

        if can_draw && can_present {
            return Some(QueueFamilyIndices {
                graphics: index,
                present: index,
            });
        }
        if can_draw && graphics.is_none() {
            graphics = Some(index);
        }
        if can_present && present.is_none() {
            present = Some(index);
        }
    }

    Some(QueueFamilyIndices {
        graphics: graphics?,
        present: present?,
    })
}

fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_single_family_for_both() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
        ];
        let picked = pick_queue_families(&families, |i| i != 0).unwrap();
        assert_eq!(picked, QueueFamilyIndices { graphics: 2, present: 2 });
        assert_eq!(picked.unique(), vec![2]);
    }

    #[test]
    fn test_split_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        let picked = pick_queue_families(&families, |i| i == 1).unwrap();
        assert_eq!(picked, QueueFamilyIndices { graphics: 0, present: 1 });
        assert_eq!(picked.unique(), vec![0, 1]);
    }

    #[test]
    fn test_no_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        assert!(pick_queue_families(&families, |_| false).is_none());
    }

    #[test]
    fn test_empty_family_is_ignored() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 2),
        ];
        let picked = pick_queue_families(&families, |_| true).unwrap();
        assert_eq!(picked.graphics, 1);
    }

    #[test]
    fn test_discrete_outranks_integrated() {
        assert!(
            device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU)
                > device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
    }
}
