//! Vulkan instance creation.
//!
//! The [`Instance`] owns the loader entry, the instance handle and, when
//! validation is on, the debug messenger that forwards validation output to
//! `tracing`. It is one of the root handles: the engine destroys it last,
//! after the device and the surface.
//!
//! # Example
//!
//! ```no_run
//! use vkengine_rhi::instance::Instance;
//!
//! let surface_extensions = Vec::new(); // from Window::required_extensions
//! let instance = Instance::new(&surface_extensions, cfg!(debug_assertions))
//!     .expect("Failed to create Vulkan instance");
//! assert!(instance.api_version() >= ash::vk::API_VERSION_1_1);
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// API version requested from the loader; also the minimum a device must report.
pub const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_1;

/// Vulkan instance with optional validation layer.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `surface_extensions` - Instance extensions the window needs for presentation
    /// * `enable_validation` - Enable the validation layer and debug messenger if available
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The Vulkan library cannot be loaded
    /// - A surface extension is not offered by the loader
    /// - Instance or debug messenger creation fails
    pub fn new(surface_extensions: &[*const c_char], enable_validation: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        Self::check_extensions(&entry, surface_extensions)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"vkengine")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vkengine")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(REQUIRED_API_VERSION);

        let mut extensions = surface_extensions.to_vec();
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan instance created ({} extension(s), validation {})",
            extensions.len(),
            if validation_available { "on" } else { "off" }
        );

        let debug_utils = if validation_available {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether the debug messenger is installed.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_utils.is_some()
    }

    /// API version requested at creation.
    #[inline]
    pub fn api_version(&self) -> u32 {
        REQUIRED_API_VERSION
    }

    fn check_extensions(entry: &Entry, wanted: &[*const c_char]) -> RhiResult<()> {
        let available = unsafe { entry.enumerate_instance_extension_properties(None)? };

        for &name in wanted {
            let name = unsafe { CStr::from_ptr(name) };
            let found = available
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|n| n == name));
            if !found {
                return Err(RhiError::MissingExtension(name.to_string_lossy().into_owned()));
            }
        }

        Ok(())
    }

    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER_NAME)))
    }

    fn setup_debug_messenger(
        loader: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        debug!("Debug messenger created");
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Forwards validation layer messages to `tracing`.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "general",
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vkengine_rhi::validation", "[{}] {}", kind, message);
    } else {
        warn!(target: "vkengine_rhi::validation", "[{}] {}", kind, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_creation_without_validation() {
        // Needs a Vulkan loader and driver; skipped otherwise.
        match Instance::new(&[], false) {
            Ok(instance) => {
                assert!(!instance.has_validation());
                assert_eq!(instance.api_version(), REQUIRED_API_VERSION);
            }
            Err(RhiError::Loading(_)) | Err(RhiError::Vulkan(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_unknown_extension_is_reported() {
        let bogus = [c"VK_KHR_definitely_not_real".as_ptr()];
        match Instance::new(&bogus, false) {
            Err(RhiError::MissingExtension(name)) => {
                assert_eq!(name, "VK_KHR_definitely_not_real");
            }
            Err(RhiError::Loading(_)) | Err(RhiError::Vulkan(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            other => panic!("Unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
