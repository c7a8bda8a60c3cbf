//! Physical device selection.

use ash::vk;

use crate::device_info::{DeviceInfo, FamilyTieBreak, QueueRole};
use crate::error::{GpuError, Result};
use crate::instance::Instance;
use crate::surface::Surface;

/// The adapter that won selection, together with its snapshot.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub info: DeviceInfo,
    pub score: u32,
}

/// Index and score of the winning entry, or `None` when every score is 0.
/// Ties keep the earlier entry.
pub fn pick_best(scores: impl IntoIterator<Item = u32>) -> Option<(usize, u32)> {
    let mut best = None;
    let mut best_score = 0;
    for (i, score) in scores.into_iter().enumerate() {
        if score > best_score {
            best_score = score;
            best = Some((i, score));
        }
    }
    best
}

/// Rank adapters: 0 when the adapter cannot present to the surface at all,
/// otherwise prefer discrete GPUs, more VRAM and geometry shader support.
pub fn default_score(info: &DeviceInfo) -> u32 {
    if !info.queue_families.is_supported(QueueRole::Graphics)
        || !info.queue_families.is_supported(QueueRole::Present)
        || info.surface.formats.is_empty()
        || info.surface.present_modes.is_empty()
    {
        return 0;
    }

    let mut score = 1;

    // Prefer discrete GPUs
    score += match info.device_type() {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 0,
    };

    // +1 per GB of VRAM
    score += u32::try_from(info.device_local_memory() >> 30).unwrap_or(u32::MAX / 2);

    if info.features.geometry_shader == vk::TRUE {
        score += 10;
    }

    score
}

/// Enumerates adapters and picks the best one with a caller-supplied ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhysicalDeviceSelector {
    tie_break: FamilyTieBreak,
}

impl PhysicalDeviceSelector {
    /// Create a new selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose how queue families are resolved while gathering snapshots.
    pub fn tie_break(mut self, tie_break: FamilyTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Score every adapter and return the highest-scoring one.
    ///
    /// Equal scores keep the adapter enumerated first; enumeration order is
    /// up to the driver. Fails with [`GpuError::NoSuitableDevice`] when no
    /// adapter scores above 0.
    pub fn choose<F>(&self, instance: &Instance, surface: &Surface, score_fn: F) -> Result<SelectedDevice>
    where
        F: Fn(&DeviceInfo) -> u32,
    {
        let devices = instance.enumerate_physical_devices()?;
        if devices.is_empty() {
            return Err(GpuError::NoSuitableDevice);
        }

        let mut candidates = Vec::with_capacity(devices.len());
        let mut scores = Vec::with_capacity(devices.len());
        for device in devices {
            let info = DeviceInfo::query(instance, device, surface, self.tie_break)?;
            let score = score_fn(&info);
            tracing::debug!("Adapter {} scored {score}", info.name());
            candidates.push((device, info));
            scores.push(score);
        }

        let (index, score) = pick_best(scores).ok_or(GpuError::NoSuitableDevice)?;
        let (physical_device, info) = candidates.swap_remove(index);
        tracing::info!("Selected GPU: {} (score {score})", info.summary());

        Ok(SelectedDevice {
            physical_device,
            info,
            score,
        })
    }
}
