//! GPU context management.

use std::mem::ManuallyDrop;

use crate::capabilities::CapabilityKind;
use crate::device::{LogicalDevice, LogicalDeviceBuilder};
use crate::device_info::{DeviceInfo, FamilyTieBreak, QueueFamilyIndices, QueueRole};
use crate::error::{GpuError, Result};
use crate::instance::{Instance, InstanceBuilder};
use crate::selector::{default_score, PhysicalDeviceSelector};
use crate::surface::{Surface, SurfaceProvider};
use crate::swapchain::{rebuild, select_present_mode, DriverRebuild, Swapchain, SwapchainBuilder};

type ScoreFn = Box<dyn Fn(&DeviceInfo) -> u32>;

/// Main GPU context holding the bootstrap chain for one window.
///
/// Dropping the context waits for the device and destroys the swapchain,
/// device, surface and instance, in that order.
pub struct GpuContext {
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<LogicalDevice>,
    device_info: DeviceInfo,
    /// `None` only after a failed recreation.
    swapchain: Option<Swapchain>,
    swapchain_template: SwapchainBuilder,
    score: u32,
}

impl GpuContext {
    /// Get the instance.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Get the logical device.
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Snapshot of the selected adapter.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Score the selected adapter was chosen with.
    pub fn device_score(&self) -> u32 {
        self.score
    }

    /// Get the current swapchain, if one exists.
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    /// Rebuild the swapchain for a new window size.
    ///
    /// Zero-sized extents (a minimised window) are ignored. If the previous
    /// recreation failed, a fresh swapchain is built instead.
    ///
    /// # Safety
    /// No object created from the current swapchain images may still exist.
    pub unsafe fn handle_resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        let old = self.swapchain.take();
        let mut steps = DriverRebuild {
            device: &self.device,
            surface: &self.surface,
            info: &mut self.device_info,
            template: &self.swapchain_template,
        };
        // SAFETY: caller guarantees nothing references the old images
        let swapchain = unsafe { rebuild(&mut steps, old, width, height)? };

        tracing::info!("Resized to {}x{}", width, height);
        self.swapchain = Some(swapchain);
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::warn!("Device did not go idle before teardown: {e}");
        }

        // SAFETY: the device is idle, every object is taken exactly once and
        // children go before their parents
        unsafe {
            if let Some(swapchain) = self.swapchain.take() {
                swapchain.destroy();
            }
            ManuallyDrop::take(&mut self.device).destroy();
            ManuallyDrop::take(&mut self.surface).destroy();
            ManuallyDrop::take(&mut self.instance).destroy();
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    vsync: bool,
    device_extensions: Vec<String>,
    queues: Vec<(QueueRole, f32)>,
    score_fn: ScoreFn,
    tie_break: FamilyTieBreak,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "ignis application".to_string(),
            enable_validation: cfg!(debug_assertions),
            vsync: true,
            device_extensions: Vec::new(),
            queues: Vec::new(),
            score_fn: Box::new(default_score),
            tie_break: FamilyTieBreak::default(),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers and the debug messenger.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Enable or disable vsync.
    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Request a device extension on top of `VK_KHR_swapchain`.
    pub fn add_device_extension(mut self, name: impl Into<String>) -> Self {
        self.device_extensions.push(name.into());
        self
    }

    /// Request a queue. Without any requests see [`default_queue_requests`].
    pub fn add_queue(mut self, role: QueueRole, priority: f32) -> Self {
        self.queues.push((role, priority));
        self
    }

    /// Replace the adapter ranking.
    pub fn score_fn(mut self, score_fn: impl Fn(&DeviceInfo) -> u32 + 'static) -> Self {
        self.score_fn = Box::new(score_fn);
        self
    }

    /// Choose how queue families are resolved.
    pub fn tie_break(mut self, tie_break: FamilyTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Build the GPU context for `window` at `width`x`height`.
    ///
    /// Objects created before a failing step are destroyed before the error
    /// is returned.
    ///
    /// # Safety
    /// The window must outlive the returned context.
    pub unsafe fn build<W>(self, window: &W, width: u32, height: u32) -> Result<GpuContext>
    where
        W: SurfaceProvider + ?Sized,
    {
        let instance_builder = InstanceBuilder::new()
            .app_name(&self.app_name)
            .add_required_extensions(window)?;
        let instance = if self.enable_validation {
            match instance_builder
                .clone()
                .with_validation()
                .with_debug_messenger()
                .build()
            {
                Err(GpuError::UnsupportedCapability {
                    kind: CapabilityKind::InstanceLayer | CapabilityKind::InstanceExtension,
                    name,
                }) => {
                    tracing::warn!("{name} not available, continuing without validation");
                    instance_builder.build()?
                }
                result => result?,
            }
        } else {
            instance_builder.build()?
        };

        // SAFETY: caller guarantees the window outlives the context
        let surface = match unsafe { Surface::new(&instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                // SAFETY: nothing was created from the instance yet
                unsafe { instance.destroy() };
                return Err(e);
            }
        };

        match self.build_device_chain(&instance, &surface, width, height) {
            Ok((device, device_info, swapchain, swapchain_template, score)) => Ok(GpuContext {
                instance: ManuallyDrop::new(instance),
                surface: ManuallyDrop::new(surface),
                device: ManuallyDrop::new(device),
                device_info,
                swapchain: Some(swapchain),
                swapchain_template,
                score,
            }),
            Err(e) => {
                // SAFETY: the device chain cleaned up after itself
                unsafe {
                    surface.destroy();
                    instance.destroy();
                }
                Err(e)
            }
        }
    }

    fn build_device_chain(
        &self,
        instance: &Instance,
        surface: &Surface,
        width: u32,
        height: u32,
    ) -> Result<(LogicalDevice, DeviceInfo, Swapchain, SwapchainBuilder, u32)> {
        let selected = PhysicalDeviceSelector::new()
            .tie_break(self.tie_break)
            .choose(instance, surface, |info| (self.score_fn)(info))?;

        let mut device_builder = LogicalDeviceBuilder::new().with_swapchain();
        for name in &self.device_extensions {
            device_builder = device_builder.add_extension(name.clone());
        }
        let queues = if self.queues.is_empty() {
            default_queue_requests(&selected.info.queue_families)
        } else {
            self.queues.clone()
        };
        for (role, priority) in queues {
            device_builder = device_builder.add_queue(role, priority);
        }
        let device = device_builder.build(instance, selected.physical_device, &selected.info)?;

        let mut template = SwapchainBuilder::new().present_mode(select_present_mode(
            &selected.info.surface.present_modes,
            self.vsync,
        ));
        for role in [QueueRole::Graphics, QueueRole::Present] {
            if let Some(family) = device.queue_family(role) {
                template = template.add_queue_family_index(family);
            }
        }

        let swapchain = match template
            .clone()
            .extent(width, height)
            .build(&device, surface, &selected.info)
        {
            Ok(swapchain) => swapchain,
            Err(e) => {
                // SAFETY: nothing was created from the device yet
                unsafe { device.destroy() };
                return Err(e);
            }
        };

        Ok((device, selected.info, swapchain, template, selected.score))
    }
}

/// Queues created when the builder gets no explicit requests: one graphics
/// queue, plus one present queue only when presentation needs a family of
/// its own. Otherwise the device presents from the graphics queue.
pub fn default_queue_requests(families: &QueueFamilyIndices) -> Vec<(QueueRole, f32)> {
    let mut requests = vec![(QueueRole::Graphics, 1.0)];
    if !families.share_family(QueueRole::Graphics, QueueRole::Present) {
        requests.push((QueueRole::Present, 1.0));
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{QueueFamilyRequest, RoleQueues};
    use ash::vk;

    fn universal_family(queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::GRAPHICS
                | vk::QueueFlags::COMPUTE
                | vk::QueueFlags::TRANSFER,
            queue_count,
            ..Default::default()
        }
    }

    fn info_with(queue_families: QueueFamilyIndices) -> DeviceInfo {
        DeviceInfo {
            queue_families,
            extensions: vec!["VK_KHR_swapchain".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn single_queue_universal_family_builds_with_defaults() {
        let families =
            QueueFamilyIndices::resolve(&[universal_family(1)], FamilyTieBreak::LastMatch, |_| Ok(true))
                .unwrap();
        let requests = default_queue_requests(&families);
        assert_eq!(requests, vec![(QueueRole::Graphics, 1.0)]);

        let mut builder = LogicalDeviceBuilder::new().with_swapchain();
        for (role, priority) in requests {
            builder = builder.add_queue(role, priority);
        }
        let plan = builder.plan(&info_with(families)).unwrap();

        assert_eq!(
            plan.families,
            vec![QueueFamilyRequest {
                family_index: 0,
                priorities: vec![1.0],
            }]
        );
        let present = plan
            .roles
            .iter()
            .find(|r| r.role == QueueRole::Present)
            .copied();
        assert_eq!(
            present,
            Some(RoleQueues {
                role: QueueRole::Present,
                family_index: 0,
                first_queue: 0,
                count: 1,
            })
        );
    }

    #[test]
    fn separate_present_family_gets_its_own_queue() {
        let graphics_only = vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::GRAPHICS,
            queue_count: 1,
            ..Default::default()
        };
        let present_only = vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::TRANSFER,
            queue_count: 1,
            ..Default::default()
        };
        let families = QueueFamilyIndices::resolve(
            &[graphics_only, present_only],
            FamilyTieBreak::LastMatch,
            |index| Ok(index == 1),
        )
        .unwrap();

        assert_eq!(
            default_queue_requests(&families),
            vec![(QueueRole::Graphics, 1.0), (QueueRole::Present, 1.0)]
        );

        let mut builder = LogicalDeviceBuilder::new().with_swapchain();
        for (role, priority) in default_queue_requests(&families) {
            builder = builder.add_queue(role, priority);
        }
        let plan = builder.plan(&info_with(families)).unwrap();
        assert_eq!(plan.families.len(), 2);
    }
}
