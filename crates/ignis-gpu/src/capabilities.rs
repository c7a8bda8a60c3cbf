//! Capability negotiation: extension/layer subset checks and feature bits.

use std::fmt;
use std::os::raw::c_char;

use ash::vk;

use crate::error::{GpuError, Result};

/// Which driver name-space a capability lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    InstanceExtension,
    InstanceLayer,
    DeviceExtension,
    DeviceLayer,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstanceExtension => "Instance extension",
            Self::InstanceLayer => "Instance layer",
            Self::DeviceExtension => "Device extension",
            Self::DeviceLayer => "Device layer",
        })
    }
}

/// Check that every requested name is present in `supported`.
///
/// Matching is exact and case-sensitive. The first missing name is reported
/// and nothing is logged in that case; on success one line per accepted
/// capability is emitted and the requested names are echoed back in order.
pub fn validate<S: AsRef<str>>(
    kind: CapabilityKind,
    requested: &[String],
    supported: &[S],
) -> Result<Vec<String>> {
    if let Some(missing) = requested
        .iter()
        .find(|name| !supported.iter().any(|s| s.as_ref() == name.as_str()))
    {
        return Err(GpuError::UnsupportedCapability {
            kind,
            name: missing.clone(),
        });
    }

    for name in requested {
        tracing::info!("{kind} {name} is supported");
    }
    Ok(requested.to_vec())
}

/// Decode a fixed-size, NUL-terminated name array from a Vulkan struct.
pub(crate) fn raw_name(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Names of the `VkPhysicalDeviceFeatures` members, in declaration order.
const FEATURE_NAMES: [&str; 55] = [
    "robustBufferAccess",
    "fullDrawIndexUint32",
    "imageCubeArray",
    "independentBlend",
    "geometryShader",
    "tessellationShader",
    "sampleRateShading",
    "dualSrcBlend",
    "logicOp",
    "multiDrawIndirect",
    "drawIndirectFirstInstance",
    "depthClamp",
    "depthBiasClamp",
    "fillModeNonSolid",
    "depthBounds",
    "wideLines",
    "largePoints",
    "alphaToOne",
    "multiViewport",
    "samplerAnisotropy",
    "textureCompressionETC2",
    "textureCompressionASTC_LDR",
    "textureCompressionBC",
    "occlusionQueryPrecise",
    "pipelineStatisticsQuery",
    "vertexPipelineStoresAndAtomics",
    "fragmentStoresAndAtomics",
    "shaderTessellationAndGeometryPointSize",
    "shaderImageGatherExtended",
    "shaderStorageImageExtendedFormats",
    "shaderStorageImageMultisample",
    "shaderStorageImageReadWithoutFormat",
    "shaderStorageImageWriteWithoutFormat",
    "shaderUniformBufferArrayDynamicIndexing",
    "shaderSampledImageArrayDynamicIndexing",
    "shaderStorageBufferArrayDynamicIndexing",
    "shaderStorageImageArrayDynamicIndexing",
    "shaderClipDistance",
    "shaderCullDistance",
    "shaderFloat64",
    "shaderInt64",
    "shaderInt16",
    "shaderResourceResidency",
    "shaderResourceMinLod",
    "sparseBinding",
    "sparseResidencyBuffer",
    "sparseResidencyImage2D",
    "sparseResidencyImage3D",
    "sparseResidency2Samples",
    "sparseResidency4Samples",
    "sparseResidency8Samples",
    "sparseResidency16Samples",
    "sparseResidencyAliased",
    "variableMultisampleRate",
    "inheritedQueries",
];

// `VkPhysicalDeviceFeatures` is nothing but `VkBool32` members.
const _: () = assert!(
    FEATURE_NAMES.len() * std::mem::size_of::<vk::Bool32>()
        == std::mem::size_of::<vk::PhysicalDeviceFeatures>()
);

fn feature_bits(features: &vk::PhysicalDeviceFeatures) -> &[vk::Bool32] {
    // SAFETY: the struct is `repr(C)` and consists solely of `Bool32`
    // members, checked by the assertion above.
    unsafe {
        std::slice::from_raw_parts(
            (features as *const vk::PhysicalDeviceFeatures).cast::<vk::Bool32>(),
            FEATURE_NAMES.len(),
        )
    }
}

/// Names of every feature enabled in `features`.
pub fn enabled_features(features: &vk::PhysicalDeviceFeatures) -> Vec<&'static str> {
    feature_bits(features)
        .iter()
        .zip(FEATURE_NAMES)
        .filter(|(&bit, _)| bit == vk::TRUE)
        .map(|(_, name)| name)
        .collect()
}

/// First feature enabled in `requested` that `supported` lacks.
pub fn unsupported_feature(
    requested: &vk::PhysicalDeviceFeatures,
    supported: &vk::PhysicalDeviceFeatures,
) -> Option<&'static str> {
    feature_bits(requested)
        .iter()
        .zip(feature_bits(supported))
        .zip(FEATURE_NAMES)
        .find(|((&want, &have), _)| want == vk::TRUE && have != vk::TRUE)
        .map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn subset_is_echoed_in_order() {
        let supported = ["VK_KHR_surface", "VK_KHR_xlib_surface", "VK_EXT_debug_utils"];
        let requested = names(&["VK_EXT_debug_utils", "VK_KHR_surface"]);
        let verified = validate(CapabilityKind::InstanceExtension, &requested, &supported).unwrap();
        assert_eq!(verified, requested);
    }

    #[test]
    fn empty_request_always_passes() {
        let supported: [&str; 0] = [];
        let verified = validate(CapabilityKind::DeviceLayer, &[], &supported).unwrap();
        assert!(verified.is_empty());
    }

    #[test]
    fn first_missing_name_is_reported() {
        let supported = ["VK_KHR_swapchain"];
        let requested = names(&["VK_KHR_swapchain", "VK_KHR_ray_query", "VK_EXT_mesh_shader"]);
        let err = validate(CapabilityKind::DeviceExtension, &requested, &supported).unwrap_err();
        match err {
            GpuError::UnsupportedCapability { kind, name } => {
                assert_eq!(kind, CapabilityKind::DeviceExtension);
                assert_eq!(name, "VK_KHR_ray_query");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        let supported = ["VK_LAYER_KHRONOS_validation"];
        let requested = names(&["vk_layer_khronos_validation"]);
        assert!(validate(CapabilityKind::InstanceLayer, &requested, &supported).is_err());
    }

    #[test]
    fn raw_name_stops_at_nul() {
        let raw: Vec<c_char> = b"VK_KHR_surface\0garbage"
            .iter()
            .map(|&b| b as c_char)
            .collect();
        assert_eq!(raw_name(&raw), "VK_KHR_surface");
    }

    #[test]
    fn feature_subset_passes() {
        let supported = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .geometry_shader(true);
        let requested = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        assert_eq!(unsupported_feature(&requested, &supported), None);
    }

    #[test]
    fn missing_feature_is_named() {
        let supported = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let requested = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .shader_float64(true);
        assert_eq!(
            unsupported_feature(&requested, &supported),
            Some("shaderFloat64")
        );
    }

    #[test]
    fn enabled_features_lists_names() {
        let features = vk::PhysicalDeviceFeatures::default()
            .robust_buffer_access(true)
            .inherited_queries(true);
        assert_eq!(
            enabled_features(&features),
            vec!["robustBufferAccess", "inheritedQueries"]
        );
    }
}
