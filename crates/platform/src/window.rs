//! Window management using winit.
//!
//! The window is created non-resizable: the engine does not recreate its
//! swapchain, so the surface extent must stay fixed for the whole run.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkengine_core::{EngineConfig, Error, Result};

/// Presentation surface. Destroys itself on drop.
///
/// The engine keeps it in a `ManuallyDrop` so it is released after the
/// device and before the instance.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle came from ash_window::create_surface on the same
        // instance the loader was built from, and nothing else destroys it.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Application window.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Opens a window with the configured title and extent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the windowing system refuses the request.
    pub fn new(event_loop: &ActiveEventLoop, config: &EngineConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The compositor may not honour the requested size exactly.
        let size = window.inner_size();
        let (width, height) = if size.width == 0 || size.height == 0 {
            (config.width, config.height)
        } else {
            (size.width, size.height)
        };

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions needed to present to this window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the display handle is unavailable and
    /// [`Error::Surface`] if the platform has no Vulkan surface support.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let (display, _) = self.raw_handles()?;
        required_extensions(display)
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle)> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("display handle unavailable: {e}")))?;
        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("window handle unavailable: {e}")))?;
        Ok((display.as_raw(), window.as_raw()))
    }

    /// Creates the Vulkan surface for this window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the raw handles are unavailable and
    /// [`Error::Surface`] if surface creation fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let (display, window) = self.raw_handles()?;

        // SAFETY: entry and instance are live, and the handles come from a
        // window that outlives the surface (the engine drops the surface first).
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display, window, None)
                .map_err(|e| Error::Surface(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

/// Instance extensions required to create a surface on `display_handle`.
///
/// # Errors
///
/// Returns [`Error::Surface`] if the platform is not supported by ash-window.
pub fn required_extensions(display_handle: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle).map_err(|e| {
        Error::Surface(format!("Failed to enumerate required extensions: {}", e))
    })?;

    tracing::debug!(
        "Required Vulkan extensions for surface: {:?}",
        extensions
            .iter()
            // SAFETY: ash-window returns pointers to static, nul-terminated names.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
