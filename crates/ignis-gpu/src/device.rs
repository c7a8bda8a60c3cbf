//! Logical device creation and queue provisioning.

use std::os::raw::c_char;

use ash::vk;

use crate::capabilities::{enabled_features, unsupported_feature, validate, CapabilityKind};
use crate::device_info::{DeviceInfo, QueueRole};
use crate::error::{GpuError, Result};
use crate::instance::{cstr_name, to_cstrings, Instance};

/// Accumulates extensions, layers, features and per-role queue requests for
/// a [`LogicalDevice`].
///
/// Consumed by [`LogicalDeviceBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct LogicalDeviceBuilder {
    extensions: Vec<String>,
    layers: Vec<String>,
    features: vk::PhysicalDeviceFeatures,
    queues: Vec<(QueueRole, f32)>,
}

/// One `VkDeviceQueueCreateInfo` worth of queues.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFamilyRequest {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

/// The slice of a family's queues handed to one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleQueues {
    pub role: QueueRole,
    pub family_index: u32,
    /// Index of the role's first queue within the family.
    pub first_queue: u32,
    pub count: u32,
}

/// A validated device request, ready to hand to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePlan {
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
    /// One entry per distinct family, roles sharing a family merged.
    pub families: Vec<QueueFamilyRequest>,
    pub roles: Vec<RoleQueues>,
}

impl LogicalDeviceBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a device extension.
    pub fn add_extension(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.extensions.contains(&name) {
            self.extensions.push(name);
        }
        self
    }

    /// Request `VK_KHR_swapchain`.
    pub fn with_swapchain(self) -> Self {
        self.add_extension(cstr_name(ash::khr::swapchain::NAME))
    }

    /// Request a device layer. Device layers are deprecated but still
    /// validated for older loaders.
    pub fn add_layer(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.layers.contains(&name) {
            self.layers.push(name);
        }
        self
    }

    /// Request a set of core features.
    pub fn enable_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.features = features;
        self
    }

    /// Request one queue for `role` with the given priority.
    pub fn add_queue(mut self, role: QueueRole, priority: f32) -> Self {
        self.queues.push((role, priority));
        self
    }

    /// Request one queue per priority for `role`.
    pub fn add_queues(mut self, role: QueueRole, priorities: &[f32]) -> Self {
        self.queues.extend(priorities.iter().map(|&p| (role, p)));
        self
    }

    fn priorities(&self, role: QueueRole) -> Vec<f32> {
        self.queues
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|&(_, p)| p)
            .collect()
    }

    /// Validate the request against `info` without touching the driver.
    ///
    /// Checks run in order: extensions and layers, features, then queue
    /// counts per role. Roles that share a family are merged into one
    /// family request with consecutive queue indices. Without a present
    /// request, present shares the graphics queues when their family can
    /// present.
    pub fn plan(&self, info: &DeviceInfo) -> Result<DevicePlan> {
        let extensions = validate(CapabilityKind::DeviceExtension, &self.extensions, &info.extensions)?;
        let layers = validate(CapabilityKind::DeviceLayer, &self.layers, &info.layers)?;

        if let Some(name) = unsupported_feature(&self.features, &info.features) {
            return Err(GpuError::UnsupportedFeature(name));
        }

        let mut families: Vec<QueueFamilyRequest> = Vec::new();
        let mut roles = Vec::new();

        for role in QueueRole::ALL {
            let priorities = self.priorities(role);
            if priorities.is_empty() {
                continue;
            }
            if let Some(&priority) = priorities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                return Err(GpuError::InvalidQueuePriority { role, priority });
            }

            let family = info
                .queue_families
                .get(role)
                .ok_or(GpuError::QueueFamilyUnavailable(role))?;
            let requested = priorities.len() as u32;
            if requested > family.max_queues {
                return Err(GpuError::TooManyQueuesRequested {
                    role,
                    requested,
                    available: family.max_queues,
                });
            }

            let slot = match families.iter().position(|f| f.family_index == family.index) {
                Some(slot) => slot,
                None => {
                    families.push(QueueFamilyRequest {
                        family_index: family.index,
                        priorities: Vec::new(),
                    });
                    families.len() - 1
                }
            };
            let request = &mut families[slot];

            let first_queue = request.priorities.len() as u32;
            let total = first_queue + requested;
            if total > family.max_queues {
                return Err(GpuError::TooManyQueuesRequested {
                    role,
                    requested: total,
                    available: family.max_queues,
                });
            }
            request.priorities.extend(priorities);

            roles.push(RoleQueues {
                role,
                family_index: family.index,
                first_queue,
                count: requested,
            });
        }

        // A family serving both roles presents from the graphics queues.
        let present_requested = roles.iter().any(|r| r.role == QueueRole::Present);
        if !present_requested
            && info
                .queue_families
                .share_family(QueueRole::Graphics, QueueRole::Present)
        {
            if let Some(graphics) = roles.iter().find(|r| r.role == QueueRole::Graphics).copied() {
                roles.push(RoleQueues {
                    role: QueueRole::Present,
                    ..graphics
                });
            }
        }

        Ok(DevicePlan {
            extensions,
            layers,
            families,
            roles,
        })
    }

    /// Validate the request and create the device.
    ///
    /// Nothing is created unless [`plan`](Self::plan) succeeds.
    pub fn build(
        self,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        info: &DeviceInfo,
    ) -> Result<LogicalDevice> {
        let plan = self.plan(info)?;

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = plan
            .families
            .iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family.family_index)
                    .queue_priorities(&family.priorities)
            })
            .collect();

        let extension_names = to_cstrings(&plan.extensions)?;
        let layer_names = to_cstrings(&plan.layers)?;
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|n| n.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|n| n.as_ptr()).collect();

        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .enabled_features(&self.features);

        // SAFETY: the adapter belongs to `instance` and every pointer in
        // `create_info` outlives the call
        let handle = unsafe {
            instance
                .handle()
                .create_device(physical_device, &create_info, None)
        }
        .map_err(GpuError::vulkan("vkCreateDevice"))?;

        let queues = plan
            .roles
            .iter()
            .map(|slot| RoleQueueHandles {
                role: slot.role,
                family_index: slot.family_index,
                queues: (slot.first_queue..slot.first_queue + slot.count)
                    // SAFETY: the queue was requested in `create_info`
                    .map(|i| unsafe { handle.get_device_queue(slot.family_index, i) })
                    .collect(),
            })
            .collect();

        tracing::info!(
            "Created logical device ({} queue families, {} extensions, features: {:?})",
            plan.families.len(),
            plan.extensions.len(),
            enabled_features(&self.features)
        );

        let swapchain_name = cstr_name(ash::khr::swapchain::NAME);
        let swapchain_loader = plan
            .extensions
            .contains(&swapchain_name)
            .then(|| ash::khr::swapchain::Device::new(instance.handle(), &handle));

        Ok(LogicalDevice {
            handle,
            physical_device,
            queues,
            extensions: plan.extensions,
            swapchain_loader,
        })
    }
}

#[derive(Debug, Clone)]
struct RoleQueueHandles {
    role: QueueRole,
    family_index: u32,
    queues: Vec<vk::Queue>,
}

/// A configured connection to one adapter, with its queues resolved per role.
///
/// Must be destroyed with [`LogicalDevice::destroy`] before the instance and
/// after anything using its queues.
pub struct LogicalDevice {
    handle: ash::Device,
    physical_device: vk::PhysicalDevice,
    queues: Vec<RoleQueueHandles>,
    extensions: Vec<String>,
    swapchain_loader: Option<ash::khr::swapchain::Device>,
}

impl LogicalDevice {
    /// Get the Vulkan device handle.
    pub fn handle(&self) -> &ash::Device {
        &self.handle
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Extensions the device was created with.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Swapchain loader, present when `VK_KHR_swapchain` was enabled.
    pub fn swapchain_loader(&self) -> Option<&ash::khr::swapchain::Device> {
        self.swapchain_loader.as_ref()
    }

    fn role(&self, role: QueueRole) -> Option<&RoleQueueHandles> {
        self.queues.iter().find(|q| q.role == role)
    }

    /// Queues created for `role`; empty when none were requested.
    pub fn queues(&self, role: QueueRole) -> &[vk::Queue] {
        match self.role(role) {
            Some(q) => &q.queues,
            None => &[],
        }
    }

    /// The `n`th queue of `role`.
    pub fn queue(&self, role: QueueRole, n: usize) -> Option<vk::Queue> {
        self.queues(role).get(n).copied()
    }

    /// Family index backing `role`, if queues were requested for it.
    pub fn queue_family(&self, role: QueueRole) -> Option<u32> {
        self.role(role).map(|q| q.family_index)
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        // SAFETY: the device is alive for the lifetime of `self`
        unsafe { self.handle.device_wait_idle() }.map_err(GpuError::vulkan("vkDeviceWaitIdle"))
    }

    /// Destroy the device.
    ///
    /// # Safety
    /// Every swapchain and other object created from this device must
    /// already be destroyed and no queue may have work in flight.
    pub unsafe fn destroy(self) {
        // SAFETY: caller guarantees nothing derived from the device remains
        unsafe { self.handle.destroy_device(None) };
        tracing::info!("Destroyed logical device");
    }
}
