//! Swapchain management.

use ash::vk;

use crate::capabilities::CapabilityKind;
use crate::device::LogicalDevice;
use crate::device_info::DeviceInfo;
use crate::enumerate::enumerate;
use crate::error::{GpuError, Result};
use crate::instance::cstr_name;
use crate::surface::{Surface, SurfaceCapabilities};

/// Preferred surface format when the caller has no preference.
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Accumulates the desired swapchain configuration.
///
/// Everything is checked against the surface snapshot in [`DeviceInfo`] when
/// the builder is consumed by [`SwapchainBuilder::build`].
#[derive(Debug, Clone)]
pub struct SwapchainBuilder {
    image_count: Option<u32>,
    extent: vk::Extent2D,
    format: Option<vk::SurfaceFormatKHR>,
    present_mode: vk::PresentModeKHR,
    queue_family_indices: Vec<u32>,
    image_array_layers: u32,
    image_usage: vk::ImageUsageFlags,
    pre_transform: Option<vk::SurfaceTransformFlagsKHR>,
    composite_alpha: vk::CompositeAlphaFlagsKHR,
    clipped: bool,
    old_swapchain: vk::SwapchainKHR,
}

impl Default for SwapchainBuilder {
    fn default() -> Self {
        Self {
            image_count: None,
            extent: vk::Extent2D::default(),
            format: None,
            present_mode: vk::PresentModeKHR::FIFO,
            queue_family_indices: Vec::new(),
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            pre_transform: None,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            clipped: true,
            old_swapchain: vk::SwapchainKHR::null(),
        }
    }
}

/// A swapchain configuration resolved against the surface limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub sharing_mode: vk::SharingMode,
    /// Empty unless `sharing_mode` is `CONCURRENT`.
    pub queue_family_indices: Vec<u32>,
    pub image_array_layers: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub clipped: bool,
}

impl SwapchainBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a minimum number of images. Without this the surface's
    /// minimum plus one is used.
    pub fn image_count(mut self, count: u32) -> Self {
        self.image_count = Some(count);
        self
    }

    /// Set the image extent.
    pub fn extent(mut self, width: u32, height: u32) -> Self {
        self.extent = vk::Extent2D { width, height };
        self
    }

    /// Set the preferred surface format.
    pub fn format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the present mode. Falls back to FIFO if the surface lacks it.
    pub fn present_mode(mut self, present_mode: vk::PresentModeKHR) -> Self {
        self.present_mode = present_mode;
        self
    }

    /// Add a queue family that will access the images.
    pub fn add_queue_family_index(mut self, index: u32) -> Self {
        self.queue_family_indices.push(index);
        self
    }

    /// Set the image array layer count.
    pub fn image_array_layers(mut self, layers: u32) -> Self {
        self.image_array_layers = layers;
        self
    }

    /// Set the image usage.
    pub fn image_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.image_usage = usage;
        self
    }

    /// Set the pre-transform. Defaults to the surface's current transform.
    pub fn pre_transform(mut self, transform: vk::SurfaceTransformFlagsKHR) -> Self {
        self.pre_transform = Some(transform);
        self
    }

    /// Set the composite alpha mode.
    pub fn composite_alpha(mut self, composite_alpha: vk::CompositeAlphaFlagsKHR) -> Self {
        self.composite_alpha = composite_alpha;
        self
    }

    /// Set whether obscured pixels may be discarded.
    pub fn clipped(mut self, clipped: bool) -> Self {
        self.clipped = clipped;
        self
    }

    /// Hand over a swapchain that is being replaced.
    pub fn old_swapchain(mut self, old_swapchain: vk::SwapchainKHR) -> Self {
        self.old_swapchain = old_swapchain;
        self
    }

    /// Resolve the request against the surface snapshot.
    pub fn plan(&self, surface: &SurfaceCapabilities) -> Result<SwapchainPlan> {
        let caps = &surface.capabilities;

        let format = select_surface_format(&surface.formats, self.format)?;

        let present_mode = if surface.supports_present_mode(self.present_mode) {
            self.present_mode
        } else {
            tracing::warn!(
                "Present mode {:?} not supported, falling back to FIFO",
                self.present_mode
            );
            vk::PresentModeKHR::FIFO
        };

        let mut distinct = Vec::new();
        for &index in &self.queue_family_indices {
            if !distinct.contains(&index) {
                distinct.push(index);
            }
        }
        // Concurrent sharing avoids ownership transfers between families.
        let (sharing_mode, queue_family_indices) = if distinct.len() >= 2 {
            (vk::SharingMode::CONCURRENT, distinct)
        } else {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        };

        Ok(SwapchainPlan {
            image_count: calculate_image_count(caps, self.image_count),
            format,
            present_mode,
            extent: calculate_extent(caps, self.extent.width, self.extent.height),
            sharing_mode,
            queue_family_indices,
            image_array_layers: self.image_array_layers,
            image_usage: self.image_usage,
            pre_transform: self.pre_transform.unwrap_or(caps.current_transform),
            composite_alpha: select_composite_alpha(caps, self.composite_alpha),
            clipped: self.clipped,
        })
    }

    /// Create the swapchain and fetch its images.
    pub fn build(
        mut self,
        device: &LogicalDevice,
        surface: &Surface,
        info: &DeviceInfo,
    ) -> Result<Swapchain> {
        let plan = self.plan(&info.surface)?;
        let loader = device
            .swapchain_loader()
            .ok_or_else(|| GpuError::UnsupportedCapability {
                kind: CapabilityKind::DeviceExtension,
                name: cstr_name(ash::khr::swapchain::NAME),
            })?
            .clone();

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(plan.image_count)
            .image_format(plan.format.format)
            .image_color_space(plan.format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(plan.image_array_layers)
            .image_usage(plan.image_usage)
            .image_sharing_mode(plan.sharing_mode)
            .queue_family_indices(&plan.queue_family_indices)
            .pre_transform(plan.pre_transform)
            .composite_alpha(plan.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(plan.clipped)
            .old_swapchain(self.old_swapchain);

        // SAFETY: surface and device are alive and belong to the same instance
        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(GpuError::vulkan("vkCreateSwapchainKHR"))?;

        let fp = loader.fp();
        let raw_device = device.handle().handle();
        // SAFETY: the swapchain was just created on this device
        let images = unsafe {
            enumerate("vkGetSwapchainImagesKHR", |count, out| {
                (fp.get_swapchain_images_khr)(raw_device, handle, count, out)
            })
        };
        let images = match images {
            Ok(images) => images,
            Err(e) => {
                // SAFETY: nothing references the new swapchain yet
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(e);
            }
        };

        tracing::info!(
            "Swapchain created: {}x{} ({} images, {:?}, {:?})",
            plan.extent.width,
            plan.extent.height,
            images.len(),
            plan.format.format,
            plan.present_mode
        );

        // The old handle belongs to the previous swapchain only.
        self.old_swapchain = vk::SwapchainKHR::null();

        Ok(Swapchain {
            handle,
            loader,
            images,
            format: plan.format,
            extent: plan.extent,
            present_mode: plan.present_mode,
            template: self,
        })
    }
}

/// Swapchain wrapper owning its handle and presentable images.
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    /// Settings this swapchain was built from, reused on recreation.
    template: SwapchainBuilder,
}

impl Swapchain {
    /// Get the Vulkan swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Swapchain extension loader.
    pub fn loader(&self) -> &ash::khr::swapchain::Device {
        &self.loader
    }

    /// Presentable images, fixed for the swapchain's lifetime.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Image format and color space.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Present mode in use.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Destroy this swapchain and build a new one for a new window extent.
    ///
    /// Waits for the device to go idle, re-queries the surface part of
    /// `info`, destroys the current handle and images, then rebuilds from
    /// the original settings with `width`x`height`.
    ///
    /// # Safety
    /// No object created from the swapchain's images may still exist.
    pub unsafe fn recreate(
        self,
        device: &LogicalDevice,
        surface: &Surface,
        info: &mut DeviceInfo,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let template = self.template.clone();
        let mut steps = DriverRebuild {
            device,
            surface,
            info,
            template: &template,
        };
        // SAFETY: caller guarantees no views of the old images remain
        unsafe { rebuild(&mut steps, Some(self), width, height) }
    }

    /// Destroy the swapchain. Its images go with it.
    ///
    /// # Safety
    /// The swapchain must not be in use and must be destroyed before its
    /// device and surface.
    pub unsafe fn destroy(self) {
        // SAFETY: caller guarantees the swapchain is not in use
        unsafe { self.loader.destroy_swapchain(self.handle, None) };
        tracing::debug!(
            "Destroyed swapchain {}x{}",
            self.extent.width,
            self.extent.height
        );
    }
}

/// The driver-facing steps of a swapchain rebuild.
pub(crate) trait RebuildSteps {
    type Swapchain;

    fn wait_idle(&mut self) -> Result<()>;

    /// Re-query the surface limits the new swapchain is planned against.
    fn refresh_surface(&mut self) -> Result<()>;

    /// # Safety
    /// Nothing may still use `old` or its images.
    unsafe fn destroy(&mut self, old: Self::Swapchain);

    fn build(&mut self, width: u32, height: u32) -> Result<Self::Swapchain>;
}

/// Replace `old` (if any) with a swapchain of `width`x`height`.
///
/// The device is drained and the surface re-queried first, then the old
/// swapchain and its images are destroyed, and only then is the new one
/// built. `old` is destroyed even when draining or re-querying fails.
///
/// # Safety
/// Nothing may still use `old` or its images.
pub(crate) unsafe fn rebuild<S: RebuildSteps>(
    steps: &mut S,
    old: Option<S::Swapchain>,
    width: u32,
    height: u32,
) -> Result<S::Swapchain> {
    let prepared = steps.wait_idle().and_then(|()| steps.refresh_surface());
    if let Some(old) = old {
        // SAFETY: caller guarantees `old` is unused; the device is idle
        unsafe { steps.destroy(old) };
    }
    prepared?;
    steps.build(width, height)
}

/// Rebuild steps against the real device and surface.
pub(crate) struct DriverRebuild<'a> {
    pub device: &'a LogicalDevice,
    pub surface: &'a Surface,
    pub info: &'a mut DeviceInfo,
    pub template: &'a SwapchainBuilder,
}

impl RebuildSteps for DriverRebuild<'_> {
    type Swapchain = Swapchain;

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }

    fn refresh_surface(&mut self) -> Result<()> {
        self.info
            .refresh_surface(self.device.physical_device(), self.surface)
    }

    unsafe fn destroy(&mut self, old: Swapchain) {
        // SAFETY: forwarded from the caller of `rebuild`
        unsafe { old.destroy() };
    }

    fn build(&mut self, width: u32, height: u32) -> Result<Swapchain> {
        self.template
            .clone()
            .extent(width, height)
            .build(self.device, self.surface, self.info)
    }
}

/// Surface minimum plus one (or the requested count), clamped to the
/// surface limits. A `max_image_count` of 0 means there is no upper limit.
pub fn calculate_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: Option<u32>,
) -> u32 {
    let mut image_count = requested
        .unwrap_or(capabilities.min_image_count + 1)
        .max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }
    image_count
}

/// Select the best surface format.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: Option<vk::SurfaceFormatKHR>,
) -> Result<vk::SurfaceFormatKHR> {
    let matches = |want: vk::SurfaceFormatKHR| {
        available
            .iter()
            .copied()
            .find(|f| f.format == want.format && f.color_space == want.color_space)
    };

    preferred
        .and_then(matches)
        .or_else(|| matches(DEFAULT_SURFACE_FORMAT))
        // Fall back to first available
        .or_else(|| available.first().copied())
        .ok_or(GpuError::NoSurfaceFormats)
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        // Prefer FIFO (vsync)
        return vk::PresentModeKHR::FIFO;
    }
    // Prefer mailbox (triple buffering without vsync), then immediate
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        // FIFO is always supported
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Calculate swapchain extent.
///
/// The requested size is clamped into the surface's extent limits. A zero
/// request takes the surface's current extent when it reports one.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if (desired_width == 0 || desired_height == 0)
        && capabilities.current_extent.width != u32::MAX
    {
        return capabilities.current_extent;
    }

    // Drivers guarantee min_image_extent <= max_image_extent.
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: desired_width.clamp(min.width, max.width),
        height: desired_height.clamp(min.height, max.height),
    }
}

fn select_composite_alpha(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::CompositeAlphaFlagsKHR,
) -> vk::CompositeAlphaFlagsKHR {
    let supported = capabilities.supported_composite_alpha;
    if supported.contains(requested) {
        return requested;
    }
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&mode| supported.contains(mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        }
    }

    fn surface(min_images: u32, max_images: u32) -> SurfaceCapabilities {
        SurfaceCapabilities {
            capabilities: caps(min_images, max_images),
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                DEFAULT_SURFACE_FORMAT,
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    #[test]
    fn image_count_is_min_plus_one() {
        assert_eq!(calculate_image_count(&caps(2, 4), None), 3);
    }

    #[test]
    fn unbounded_image_count_is_not_clamped() {
        assert_eq!(calculate_image_count(&caps(2, 0), None), 3);
        assert_eq!(calculate_image_count(&caps(2, 0), Some(9)), 9);
    }

    #[test]
    fn image_count_clamps_to_limits() {
        assert_eq!(calculate_image_count(&caps(3, 3), None), 3);
        assert_eq!(calculate_image_count(&caps(2, 4), Some(8)), 4);
        assert_eq!(calculate_image_count(&caps(2, 4), Some(1)), 2);
    }

    #[test]
    fn single_family_is_exclusive() {
        let plan = SwapchainBuilder::new()
            .extent(800, 600)
            .add_queue_family_index(0)
            .add_queue_family_index(0)
            .plan(&surface(2, 4))
            .unwrap();
        assert_eq!(plan.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert!(plan.queue_family_indices.is_empty());
    }

    #[test]
    fn distinct_families_are_concurrent() {
        let plan = SwapchainBuilder::new()
            .extent(800, 600)
            .add_queue_family_index(0)
            .add_queue_family_index(2)
            .plan(&surface(2, 4))
            .unwrap();
        assert_eq!(plan.sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(plan.queue_family_indices, vec![0, 2]);
    }

    #[test]
    fn extent_matches_request_within_limits() {
        let plan = SwapchainBuilder::new()
            .extent(1280, 720)
            .plan(&surface(2, 4))
            .unwrap();
        assert_eq!(
            plan.extent,
            vk::Extent2D {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn extent_is_clamped_to_surface_limits() {
        let extent = calculate_extent(&caps(2, 4), 10_000, 0);
        assert_eq!(extent.width, 4096);
        assert_eq!(extent.height, 1);
    }

    #[test]
    fn zero_request_uses_current_extent() {
        let mut capabilities = caps(2, 4);
        capabilities.current_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        assert_eq!(calculate_extent(&capabilities, 0, 0), capabilities.current_extent);
    }

    /// Logs every rebuild step and plans against an in-memory surface.
    struct RecordingSteps {
        log: Vec<String>,
        surface: SurfaceCapabilities,
        refreshed: SurfaceCapabilities,
        template: SwapchainBuilder,
        fail_refresh: bool,
    }

    impl RecordingSteps {
        /// Surface limited to 800x600 until refreshed, then up to 4096x4096.
        fn new() -> Self {
            let mut before = surface(2, 4);
            before.capabilities.max_image_extent = vk::Extent2D {
                width: 800,
                height: 600,
            };
            Self {
                log: Vec::new(),
                surface: before,
                refreshed: surface(2, 4),
                template: SwapchainBuilder::new().extent(800, 600),
                fail_refresh: false,
            }
        }
    }

    impl RebuildSteps for RecordingSteps {
        type Swapchain = vk::Extent2D;

        fn wait_idle(&mut self) -> Result<()> {
            self.log.push("wait_idle".to_string());
            Ok(())
        }

        fn refresh_surface(&mut self) -> Result<()> {
            self.log.push("refresh_surface".to_string());
            if self.fail_refresh {
                return Err(GpuError::Vulkan {
                    call: "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
                    result: vk::Result::ERROR_SURFACE_LOST_KHR,
                });
            }
            self.surface = self.refreshed.clone();
            Ok(())
        }

        unsafe fn destroy(&mut self, old: vk::Extent2D) {
            self.log
                .push(format!("destroy {}x{}", old.width, old.height));
        }

        fn build(&mut self, width: u32, height: u32) -> Result<vk::Extent2D> {
            let plan = self
                .template
                .clone()
                .extent(width, height)
                .plan(&self.surface)?;
            self.log
                .push(format!("build {}x{}", plan.extent.width, plan.extent.height));
            Ok(plan.extent)
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn rebuild_destroys_old_swapchain_before_building() {
        let mut steps = RecordingSteps::new();
        let new = unsafe { rebuild(&mut steps, Some(extent(800, 600)), 1920, 1080) }.unwrap();

        assert_eq!(new, extent(1920, 1080));
        assert_eq!(
            steps.log,
            vec![
                "wait_idle",
                "refresh_surface",
                "destroy 800x600",
                "build 1920x1080"
            ]
        );
    }

    #[test]
    fn rebuild_without_old_swapchain_builds_fresh() {
        let mut steps = RecordingSteps::new();
        let new = unsafe { rebuild(&mut steps, None, 1024, 768) }.unwrap();

        assert_eq!(new, extent(1024, 768));
        assert_eq!(steps.log, vec!["wait_idle", "refresh_surface", "build 1024x768"]);
    }

    #[test]
    fn failed_refresh_still_destroys_old_swapchain() {
        let mut steps = RecordingSteps::new();
        steps.fail_refresh = true;
        let result = unsafe { rebuild(&mut steps, Some(extent(800, 600)), 1920, 1080) };

        assert!(matches!(result, Err(GpuError::Vulkan { .. })));
        assert_eq!(
            steps.log,
            vec!["wait_idle", "refresh_surface", "destroy 800x600"]
        );
    }

    #[test]
    fn resize_template_rebuilds_with_new_extent() {
        let template = SwapchainBuilder::new()
            .extent(800, 600)
            .present_mode(vk::PresentModeKHR::MAILBOX);
        let plan = template
            .clone()
            .extent(1024, 768)
            .plan(&surface(2, 4))
            .unwrap();
        assert_eq!(
            plan.extent,
            vk::Extent2D {
                width: 1024,
                height: 768
            }
        );
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn preferred_format_wins_when_supported() {
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let plan = SwapchainBuilder::new()
            .format(preferred)
            .plan(&surface(2, 4))
            .unwrap();
        assert_eq!(plan.format, preferred);
    }

    #[test]
    fn unsupported_format_falls_back() {
        let wanted = vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        let available = surface(2, 4).formats;
        assert_eq!(
            select_surface_format(&available, Some(wanted)).unwrap(),
            DEFAULT_SURFACE_FORMAT
        );
        assert_eq!(
            select_surface_format(&available[..1], Some(wanted)).unwrap(),
            available[0]
        );
        assert!(matches!(
            select_surface_format(&[], None),
            Err(GpuError::NoSurfaceFormats)
        ));
    }

    #[test]
    fn unsupported_present_mode_falls_back_to_fifo() {
        let plan = SwapchainBuilder::new()
            .present_mode(vk::PresentModeKHR::IMMEDIATE)
            .plan(&surface(2, 4))
            .unwrap();
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn present_mode_selection() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(select_present_mode(&all, true), vk::PresentModeKHR::FIFO);
        assert_eq!(select_present_mode(&all, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            select_present_mode(&all[..2], false),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            select_present_mode(&all[..1], false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn composite_alpha_falls_back_to_supported_mode() {
        let mut capabilities = caps(2, 4);
        capabilities.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(
            select_composite_alpha(&capabilities, vk::CompositeAlphaFlagsKHR::OPAQUE),
            vk::CompositeAlphaFlagsKHR::INHERIT
        );
    }

    #[test]
    fn pre_transform_defaults_to_current() {
        let plan = SwapchainBuilder::new().plan(&surface(2, 4)).unwrap();
        assert_eq!(plan.pre_transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.image_array_layers, 1);
        assert!(plan.clipped);
    }
}
