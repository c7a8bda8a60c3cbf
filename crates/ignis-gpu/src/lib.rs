//! Vulkan bootstrap and teardown for Ignis.
//!
//! This crate provides:
//! - Capability validation for extensions and layers
//! - Vulkan instance and presentation surface creation
//! - Physical device selection with pluggable scoring
//! - Logical device creation with per-role queues
//! - Swapchain creation and recreation
//! - An owning [`GpuContext`] that tears the chain down in reverse order

pub mod capabilities;
pub mod context;
pub mod device;
pub mod device_info;
pub mod enumerate;
pub mod error;
pub mod instance;
pub mod selector;
pub mod surface;
pub mod swapchain;

pub use capabilities::{validate, CapabilityKind};
pub use context::{GpuContext, GpuContextBuilder};
pub use device::{DevicePlan, LogicalDevice, LogicalDeviceBuilder};
pub use device_info::{
    DeviceInfo, FamilyTieBreak, GpuVendor, QueueFamily, QueueFamilyIndices, QueueRole,
};
pub use error::{GpuError, Result};
pub use instance::{Instance, InstanceBuilder};
pub use selector::{default_score, PhysicalDeviceSelector, SelectedDevice};
pub use surface::{Surface, SurfaceCapabilities, SurfaceProvider};
pub use swapchain::{Swapchain, SwapchainBuilder, SwapchainPlan};
