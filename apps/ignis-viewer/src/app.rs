//! Viewer configuration and window event handling.

use std::sync::Arc;

use anyhow::Context;
use ignis_gpu::{GpuContext, GpuContextBuilder};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

/// Viewer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Ignis Viewer".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            validation: cfg!(debug_assertions),
        }
    }
}

impl ViewerConfig {
    /// Parse the configuration from command line arguments, without the
    /// program name. Unknown arguments and unparsable values are ignored.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--title" => {
                    if let Some(title) = args.next() {
                        config.title = title;
                    }
                }
                "--width" => {
                    if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                        config.width = v;
                    }
                }
                "--height" => {
                    if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                        config.height = v;
                    }
                }
                "--no-vsync" => config.vsync = false,
                "--validation" => config.validation = true,
                "--no-validation" => config.validation = false,
                _ => {}
            }
        }

        config
    }
}

/// Window and GPU chain. Field order matters: the context must drop
/// before the window it presents to.
struct ViewerState {
    gpu: GpuContext,
    window: Arc<Window>,
}

/// Winit application driving the GPU context lifecycle.
pub struct Viewer {
    config: ViewerConfig,
    state: Option<ViewerState>,
    failure: Option<anyhow::Error>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            state: None,
            failure: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn finish(self) -> anyhow::Result<()> {
        self.failure.map_or(Ok(()), Err)
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();

        // SAFETY: ViewerState drops the context before the window
        let gpu = unsafe {
            GpuContextBuilder::new()
                .app_name(&self.config.title)
                .validation(self.config.validation)
                .vsync(self.config.vsync)
                .build(window.as_ref(), size.width, size.height)
        }
        .context("Failed to create GPU context")?;

        info!("GPU: {}", gpu.device_info().summary());
        if let Some(swapchain) = gpu.swapchain() {
            info!(
                "Swapchain: {}x{}, {} images, {:?}",
                swapchain.extent().width,
                swapchain.extent().height,
                swapchain.images().len(),
                swapchain.present_mode()
            );
        }

        Ok(ViewerState { gpu, window })
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                info!("Window {:?} ready", state.window.id());
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize viewer: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                // Tears down swapchain, device, surface and instance
                self.state = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    // SAFETY: the viewer creates nothing from swapchain images
                    if let Err(e) = unsafe { state.gpu.handle_resize(size.width, size.height) } {
                        error!("Resize error: {e}");
                    }
                }
            }
            _ => {}
        }
    }
}
