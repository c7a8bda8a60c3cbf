//! Surface management for windowed rendering.
//!
//! The windowing layer is an external collaborator: it reports which
//! instance extensions it needs and creates the native surface. Any window
//! exposing `raw-window-handle` handles (winit, SDL, ...) gets that behaviour
//! through the blanket [`SurfaceProvider`] impl below.

use std::ffi::CStr;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::enumerate::enumerate;
use crate::error::{GpuError, Result};
use crate::instance::Instance;

/// Windowing-layer collaborator needed to present.
pub trait SurfaceProvider {
    /// Instance extensions the windowing layer needs to create surfaces.
    fn required_extensions(&self) -> Result<Vec<String>>;

    /// Create a native surface for `instance`.
    ///
    /// # Safety
    /// The instance must be valid and the window must outlive the surface.
    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;
}

impl<W> SurfaceProvider for W
where
    W: HasDisplayHandle + HasWindowHandle,
{
    fn required_extensions(&self) -> Result<Vec<String>> {
        let display = self
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let names = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(GpuError::vulkan("ash_window::enumerate_required_extensions"))?;
        Ok(names
            .iter()
            // SAFETY: ash-window returns static NUL-terminated extension names
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            .collect())
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display = self
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window = self
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        // SAFETY: caller guarantees the instance is valid and the window
        // outlives the surface
        unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
        }
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
    }
}

/// A presentation target bound to one window.
///
/// The surface does not own the [`Instance`] that created it, but must be
/// destroyed before it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Create a surface for the provider's window.
    ///
    /// # Safety
    /// The window behind `provider` must outlive the returned surface.
    pub unsafe fn new<P>(instance: &Instance, provider: &P) -> Result<Self>
    where
        P: SurfaceProvider + ?Sized,
    {
        // SAFETY: the instance is alive; caller guarantees the window outlives us
        let handle = unsafe { provider.create_surface(instance.entry(), instance.handle())? };
        let loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        tracing::info!("Created presentation surface");
        Ok(Self { handle, loader })
    }

    /// Get the Vulkan surface handle.
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Whether `queue_family` on `physical_device` can present to this surface.
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        // SAFETY: surface and adapter belong to the same live instance
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.handle)
        }
        .map_err(GpuError::vulkan("vkGetPhysicalDeviceSurfaceSupportKHR"))
    }

    /// Query the adapter's current limits, formats and present modes for
    /// this surface.
    pub fn query(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceCapabilities> {
        let fp = self.loader.fp();
        let surface = self.handle;

        // SAFETY: surface and adapter belong to the same live instance
        unsafe {
            let capabilities = self
                .loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(GpuError::vulkan("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;

            let formats = enumerate("vkGetPhysicalDeviceSurfaceFormatsKHR", |count, out| {
                (fp.get_physical_device_surface_formats_khr)(physical_device, surface, count, out)
            })?;

            let present_modes =
                enumerate("vkGetPhysicalDeviceSurfacePresentModesKHR", |count, out| {
                    (fp.get_physical_device_surface_present_modes_khr)(
                        physical_device,
                        surface,
                        count,
                        out,
                    )
                })?;

            Ok(SurfaceCapabilities {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// Every swapchain created for this surface must already be destroyed,
    /// and the owning instance must still be alive.
    pub unsafe fn destroy(self) {
        // SAFETY: caller guarantees the surface is no longer in use
        unsafe { self.loader.destroy_surface(self.handle, None) };
        tracing::info!("Destroyed presentation surface");
    }
}

/// Surface capabilities query result.
#[derive(Debug, Clone, Default)]
pub struct SurfaceCapabilities {
    /// Raw surface capabilities (image count and extent limits).
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceCapabilities {
    /// Whether `mode` is offered for the surface.
    pub fn supports_present_mode(&self, mode: vk::PresentModeKHR) -> bool {
        self.present_modes.contains(&mode)
    }

    /// Whether `format` is offered for the surface.
    pub fn supports_format(&self, format: vk::SurfaceFormatKHR) -> bool {
        self.formats
            .iter()
            .any(|f| f.format == format.format && f.color_space == format.color_space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_support_compares_format_and_color_space() {
        let caps = SurfaceCapabilities {
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            ..Default::default()
        };
        assert!(caps.supports_format(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }));
        assert!(!caps.supports_format(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        }));
    }

    #[test]
    fn present_mode_support() {
        let caps = SurfaceCapabilities {
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            ..Default::default()
        };
        assert!(caps.supports_present_mode(vk::PresentModeKHR::MAILBOX));
        assert!(!caps.supports_present_mode(vk::PresentModeKHR::IMMEDIATE));
    }
}
