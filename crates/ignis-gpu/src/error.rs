//! GPU error types.

use ash::vk;
use thiserror::Error;

use crate::capabilities::CapabilityKind;
use crate::device_info::QueueRole;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// A requested extension or layer is not offered by the driver.
    #[error("{kind} {name} is not supported")]
    UnsupportedCapability { kind: CapabilityKind, name: String },

    /// A requested device feature is not offered by the adapter.
    #[error("Device feature {0} is not supported")]
    UnsupportedFeature(&'static str),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A queue role was requested but no family on the adapter can serve it.
    #[error("No queue family supports {0} queues")]
    QueueFamilyUnavailable(QueueRole),

    /// More queues were requested than the family exposes.
    #[error("Requested {requested} {role} queues but the family only has {available}")]
    TooManyQueuesRequested {
        role: QueueRole,
        requested: u32,
        available: u32,
    },

    /// Queue priorities must lie in `[0.0, 1.0]`.
    #[error("Invalid {role} queue priority {priority}")]
    InvalidQueuePriority { role: QueueRole, priority: f32 },

    /// The adapter reports no formats for the surface.
    #[error("Surface reports no supported formats")]
    NoSurfaceFormats,

    /// A native Vulkan call failed.
    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },

    /// The Vulkan loader could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// A name handed to the driver contains an interior NUL byte.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
}

impl GpuError {
    /// Adapter for `map_err` that tags a `vk::Result` with the failing call.
    pub fn vulkan(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Vulkan { call, result }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulkan_error_names_the_call() {
        let err = Err::<(), _>(vk::Result::ERROR_INITIALIZATION_FAILED)
            .map_err(GpuError::vulkan("vkCreateDevice"))
            .unwrap_err();
        assert!(err.to_string().starts_with("vkCreateDevice failed"));
    }

    #[test]
    fn capability_error_names_the_capability() {
        let err = GpuError::UnsupportedCapability {
            kind: CapabilityKind::DeviceExtension,
            name: "VK_KHR_swapchain".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Device extension VK_KHR_swapchain is not supported"
        );
    }
}
