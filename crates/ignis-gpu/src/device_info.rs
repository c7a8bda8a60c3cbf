//! Per-adapter capability snapshots and queue-family resolution.

use std::fmt;

use ash::vk;

use crate::capabilities::raw_name;
use crate::enumerate::enumerate;
use crate::error::Result;
use crate::instance::Instance;
use crate::surface::{Surface, SurfaceCapabilities};

/// What a queue is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueRole {
    Graphics,
    Present,
    Compute,
    Transfer,
}

impl QueueRole {
    /// Every role, in descriptor order.
    pub const ALL: [Self; 4] = [Self::Graphics, Self::Present, Self::Compute, Self::Transfer];
}

impl fmt::Display for QueueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graphics => "graphics",
            Self::Present => "present",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        })
    }
}

/// Which family wins when several satisfy the same role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FamilyTieBreak {
    /// The highest matching family index wins.
    #[default]
    LastMatch,
    /// The lowest matching family index wins.
    FirstMatch,
}

/// A queue family chosen for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    /// Family index on the adapter.
    pub index: u32,
    /// Number of queues the family exposes.
    pub max_queues: u32,
}

/// Family chosen for each role; `None` means no family supports the role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<QueueFamily>,
    pub present: Option<QueueFamily>,
    pub compute: Option<QueueFamily>,
    pub transfer: Option<QueueFamily>,
}

impl QueueFamilyIndices {
    /// Walk the family table once and pick a family per role.
    ///
    /// `supports_present` is asked about every family index.
    pub fn resolve(
        families: &[vk::QueueFamilyProperties],
        tie_break: FamilyTieBreak,
        mut supports_present: impl FnMut(u32) -> Result<bool>,
    ) -> Result<Self> {
        let mut indices = Self::default();

        for (i, family) in families.iter().enumerate() {
            let candidate = QueueFamily {
                index: i as u32,
                max_queues: family.queue_count,
            };

            if supports_present(candidate.index)? {
                indices.offer(QueueRole::Present, candidate, tie_break);
            }
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.offer(QueueRole::Graphics, candidate, tie_break);
            }
            if family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                indices.offer(QueueRole::Compute, candidate, tie_break);
            }
            if family.queue_flags.contains(vk::QueueFlags::TRANSFER) {
                indices.offer(QueueRole::Transfer, candidate, tie_break);
            }
        }

        Ok(indices)
    }

    fn offer(&mut self, role: QueueRole, family: QueueFamily, tie_break: FamilyTieBreak) {
        let slot = self.slot_mut(role);
        if slot.is_none() || tie_break == FamilyTieBreak::LastMatch {
            *slot = Some(family);
        }
    }

    fn slot_mut(&mut self, role: QueueRole) -> &mut Option<QueueFamily> {
        match role {
            QueueRole::Graphics => &mut self.graphics,
            QueueRole::Present => &mut self.present,
            QueueRole::Compute => &mut self.compute,
            QueueRole::Transfer => &mut self.transfer,
        }
    }

    /// Family chosen for `role`.
    pub fn get(&self, role: QueueRole) -> Option<QueueFamily> {
        match role {
            QueueRole::Graphics => self.graphics,
            QueueRole::Present => self.present,
            QueueRole::Compute => self.compute,
            QueueRole::Transfer => self.transfer,
        }
    }

    /// Whether some family serves `role`.
    pub fn is_supported(&self, role: QueueRole) -> bool {
        self.get(role).is_some()
    }

    /// Whether two roles resolved to the same family.
    pub fn share_family(&self, a: QueueRole, b: QueueRole) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => a.index == b.index,
            _ => false,
        }
    }

    /// Distinct family indices used by `roles`, in first-seen order.
    pub fn distinct_families(&self, roles: &[QueueRole]) -> Vec<u32> {
        let mut out = Vec::new();
        for family in roles.iter().filter_map(|&role| self.get(role)) {
            if !out.contains(&family.index) {
                out.push(family.index);
            }
        }
        out
    }
}

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Immutable snapshot of one adapter's capabilities.
///
/// Owned by whoever queried it; the adapter handle itself is not part of the
/// snapshot and is never owned.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Raw queue family table.
    pub queue_family_properties: Vec<vk::QueueFamilyProperties>,
    /// Family resolved per role.
    pub queue_families: QueueFamilyIndices,
    /// Supported device extensions.
    pub extensions: Vec<String>,
    /// Supported device layers.
    pub layers: Vec<String>,
    /// Surface limits, formats and present modes.
    pub surface: SurfaceCapabilities,
}

impl DeviceInfo {
    /// Gather a snapshot of `physical_device` as seen through `surface`.
    pub fn query(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
        tie_break: FamilyTieBreak,
    ) -> Result<Self> {
        let handle = instance.handle();
        let fp = handle.fp_v1_0();

        // SAFETY: the adapter was enumerated from this live instance
        let (properties, features, memory_properties) = unsafe {
            (
                handle.get_physical_device_properties(physical_device),
                handle.get_physical_device_features(physical_device),
                handle.get_physical_device_memory_properties(physical_device),
            )
        };

        // SAFETY: as above; the queue family query cannot fail
        let queue_family_properties = unsafe {
            enumerate("vkGetPhysicalDeviceQueueFamilyProperties", |count, out| {
                (fp.get_physical_device_queue_family_properties)(physical_device, count, out);
                vk::Result::SUCCESS
            })
        }?;

        let queue_families =
            QueueFamilyIndices::resolve(&queue_family_properties, tie_break, |family| {
                surface.supports_present(physical_device, family)
            })?;

        // SAFETY: a null layer name asks for the driver's own extensions
        let extensions = unsafe {
            enumerate("vkEnumerateDeviceExtensionProperties", |count, out| {
                (fp.enumerate_device_extension_properties)(
                    physical_device,
                    std::ptr::null(),
                    count,
                    out,
                )
            })
        }?
        .iter()
        .map(|p| raw_name(&p.extension_name))
        .collect();

        // SAFETY: plain adapter query
        let layers = unsafe {
            enumerate("vkEnumerateDeviceLayerProperties", |count, out| {
                (fp.enumerate_device_layer_properties)(physical_device, count, out)
            })
        }?
        .iter()
        .map(|p| raw_name(&p.layer_name))
        .collect();

        let surface = surface.query(physical_device)?;

        Ok(Self {
            properties,
            features,
            memory_properties,
            queue_family_properties,
            queue_families,
            extensions,
            layers,
            surface,
        })
    }

    /// Re-query the surface part of the snapshot.
    ///
    /// Surface limits follow the window, so this must run before a swapchain
    /// is rebuilt for a new extent.
    pub fn refresh_surface(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
    ) -> Result<()> {
        self.surface = surface.query(physical_device)?;
        Ok(())
    }

    /// Device name reported by the driver.
    pub fn name(&self) -> String {
        raw_name(&self.properties.device_name)
    }

    /// Adapter type (discrete, integrated, ...).
    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    /// GPU vendor.
    pub fn vendor(&self) -> GpuVendor {
        GpuVendor::from_vendor_id(self.properties.vendor_id)
    }

    /// Total size of device-local heaps in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }

    /// Whether the adapter offers `name` as a device extension.
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }

    /// Get a human-readable summary of the adapter.
    pub fn summary(&self) -> String {
        let api_version = self.properties.api_version;
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.name(),
            self.vendor(),
            self.device_type(),
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            vk::api_version_patch(api_version),
            self.device_local_memory() / (1024 * 1024),
        )
    }
}
