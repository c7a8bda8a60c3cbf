//! Vulkan instance creation.

use std::borrow::Cow;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use ash::vk;

use crate::capabilities::{raw_name, validate, CapabilityKind};
use crate::enumerate::enumerate;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceProvider;

/// Khronos validation layer.
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Engine name reported to the driver.
pub const ENGINE_NAME: &str = "ignis";

/// Accumulates everything needed to create an [`Instance`].
///
/// Consumed by [`InstanceBuilder::build`].
#[derive(Debug, Clone)]
pub struct InstanceBuilder {
    app_name: String,
    app_version: u32,
    api_version: u32,
    extensions: Vec<String>,
    layers: Vec<String>,
    debug_messenger: bool,
}

impl Default for InstanceBuilder {
    fn default() -> Self {
        let mut builder = Self {
            app_name: "ignis application".to_string(),
            app_version: vk::make_api_version(0, 0, 0, 0),
            api_version: vk::API_VERSION_1_2,
            extensions: Vec::new(),
            layers: Vec::new(),
            debug_messenger: false,
        };
        // Required for MoltenVK on macOS
        if cfg!(target_os = "macos") {
            builder.push_extension(cstr_name(ash::khr::portability_enumeration::NAME));
        }
        builder
    }
}

impl InstanceBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the application version.
    pub fn app_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.app_version = vk::make_api_version(0, major, minor, patch);
        self
    }

    /// Set the Vulkan API version the application targets.
    pub fn api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Request an instance extension.
    pub fn add_extension(mut self, name: impl Into<String>) -> Self {
        self.push_extension(name.into());
        self
    }

    /// Request an instance layer.
    pub fn add_layer(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.layers.contains(&name) {
            self.layers.push(name);
        }
        self
    }

    /// Request every extension the windowing layer needs for surfaces.
    pub fn add_required_extensions<P>(mut self, provider: &P) -> Result<Self>
    where
        P: SurfaceProvider + ?Sized,
    {
        for name in provider.required_extensions()? {
            self.push_extension(name);
        }
        Ok(self)
    }

    /// Register a debug messenger that forwards driver diagnostics to
    /// `tracing`. Also requests `VK_EXT_debug_utils`.
    pub fn with_debug_messenger(mut self) -> Self {
        self.debug_messenger = true;
        self.push_extension(cstr_name(ash::ext::debug_utils::NAME));
        self
    }

    /// Enable the Khronos validation layer.
    pub fn with_validation(self) -> Self {
        self.add_layer(VALIDATION_LAYER)
    }

    fn push_extension(&mut self, name: String) {
        if !self.extensions.contains(&name) {
            self.extensions.push(name);
        }
    }

    /// Load the Vulkan library and create the instance.
    pub fn build(self) -> Result<Instance> {
        // SAFETY: loading the system Vulkan loader has no preconditions
        // beyond it being a conforming implementation.
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;
        self.build_with_entry(entry)
    }

    /// Create the instance from an already loaded entry point.
    pub fn build_with_entry(self, entry: ash::Entry) -> Result<Instance> {
        let supported_extensions = supported_instance_extensions(&entry)?;
        let supported_layers = supported_instance_layers(&entry)?;

        let extensions = validate(
            CapabilityKind::InstanceExtension,
            &self.extensions,
            &supported_extensions,
        )?;
        let layers = validate(CapabilityKind::InstanceLayer, &self.layers, &supported_layers)?;

        let app_name = to_cstring(&self.app_name)?;
        let engine_name = to_cstring(ENGINE_NAME)?;
        let extension_names = to_cstrings(&extensions)?;
        let layer_names = to_cstrings(&layers)?;
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|n| n.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|n| n.as_ptr()).collect();

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(self.app_version)
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(self.api_version);

        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let mut messenger_info = debug_messenger_info();
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .flags(create_flags);
        // Chained so that instance creation and destruction are reported too.
        if self.debug_messenger {
            create_info = create_info.push_next(&mut messenger_info);
        }

        // SAFETY: every pointer in `create_info` outlives the call
        let handle = unsafe { entry.create_instance(&create_info, None) }
            .map_err(GpuError::vulkan("vkCreateInstance"))?;

        let debug_messenger = if self.debug_messenger {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &handle);
            let info = debug_messenger_info();
            // SAFETY: the instance was created with VK_EXT_debug_utils enabled
            match unsafe { loader.create_debug_utils_messenger(&info, None) } {
                Ok(messenger) => Some(DebugMessenger { loader, messenger }),
                Err(result) => {
                    // SAFETY: nothing has been derived from the instance yet
                    unsafe { handle.destroy_instance(None) };
                    return Err(GpuError::Vulkan {
                        call: "vkCreateDebugUtilsMessengerEXT",
                        result,
                    });
                }
            }
        } else {
            None
        };

        tracing::info!(
            "Created Vulkan instance for {} ({} extensions, {} layers, debug messenger: {})",
            self.app_name,
            extensions.len(),
            layers.len(),
            debug_messenger.is_some()
        );

        Ok(Instance {
            entry,
            handle,
            debug_messenger,
            extensions,
            layers,
        })
    }
}

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// A live connection to the Vulkan driver.
///
/// Owns the loader entry point and, when requested at build time, the debug
/// messenger. Must be destroyed with [`Instance::destroy`] after every
/// object derived from it.
pub struct Instance {
    entry: ash::Entry,
    handle: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    extensions: Vec<String>,
    layers: Vec<String>,
}

impl Instance {
    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn handle(&self) -> &ash::Instance {
        &self.handle
    }

    /// Whether a debug messenger is registered.
    pub fn has_debug_messenger(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Extensions the instance was created with.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Layers the instance was created with.
    pub fn enabled_layers(&self) -> &[String] {
        &self.layers
    }

    /// Enumerate the adapters visible to this instance.
    pub fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        let fp = self.handle.fp_v1_0();
        let raw = self.handle.handle();
        // SAFETY: the instance handle is valid for the lifetime of `self`
        unsafe {
            enumerate("vkEnumeratePhysicalDevices", |count, out| {
                (fp.enumerate_physical_devices)(raw, count, out)
            })
        }
    }

    /// Destroy the debug messenger (if any) and the instance.
    ///
    /// # Safety
    /// Every surface and device created from this instance must already be
    /// destroyed.
    pub unsafe fn destroy(self) {
        if let Some(debug) = self.debug_messenger {
            // SAFETY: the messenger was created from this instance
            unsafe {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
        }
        // SAFETY: caller guarantees no derived objects remain
        unsafe { self.handle.destroy_instance(None) };
        tracing::info!("Destroyed Vulkan instance");
    }
}

fn supported_instance_extensions(entry: &ash::Entry) -> Result<Vec<String>> {
    let fp = entry.fp_v1_0();
    // SAFETY: a null layer name asks for the implementation's own extensions
    let props = unsafe {
        enumerate("vkEnumerateInstanceExtensionProperties", |count, out| {
            (fp.enumerate_instance_extension_properties)(std::ptr::null(), count, out)
        })
    }?;
    Ok(props.iter().map(|p| raw_name(&p.extension_name)).collect())
}

fn supported_instance_layers(entry: &ash::Entry) -> Result<Vec<String>> {
    let fp = entry.fp_v1_0();
    // SAFETY: plain global query
    let props = unsafe {
        enumerate("vkEnumerateInstanceLayerProperties", |count, out| {
            (fp.enumerate_instance_layer_properties)(count, out)
        })
    }?;
    Ok(props.iter().map(|p| raw_name(&p.layer_name)).collect())
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | vk::DebugUtilsMessageTypeFlagsEXT::DEVICE_ADDRESS_BINDING,
        )
        .pfn_user_callback(Some(debug_callback))
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "GENERAL",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "VALIDATION",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "PERFORMANCE",
        vk::DebugUtilsMessageTypeFlagsEXT::DEVICE_ADDRESS_BINDING => "DEVICE_ADDRESS_BINDING",
        _ => "UNKNOWN",
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let message: Cow<'_, str> = if p_callback_data.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        // SAFETY: the driver passes valid callback data for the duration of the call
        let data = unsafe { &*p_callback_data };
        if data.p_message.is_null() {
            Cow::Borrowed("<no message>")
        } else {
            // SAFETY: p_message is a NUL-terminated string owned by the driver
            unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
        }
    };
    let type_str = message_type_name(message_type);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            tracing::trace!(target: "ignis_gpu::validation", "[{type_str}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(target: "ignis_gpu::validation", "[{type_str}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "ignis_gpu::validation", "[{type_str}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "ignis_gpu::validation", "[{type_str}] {message}");
        }
        _ => {
            tracing::debug!(target: "ignis_gpu::validation", "[{type_str}] {message}");
        }
    }

    vk::FALSE
}

pub(crate) fn cstr_name(name: &CStr) -> String {
    name.to_string_lossy().into_owned()
}

pub(crate) fn to_cstring(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| GpuError::InvalidName(name.to_string()))
}

pub(crate) fn to_cstrings(names: &[String]) -> Result<Vec<CString>> {
    names.iter().map(|n| to_cstring(n)).collect()
}
