//! GPU context management - wgpu instance, adapter, device and queue.

use std::sync::Arc;
use tracing::{error, info};
use wgpu::{Adapter, Device, Features, Instance, Queue, RequestAdapterOptions, Surface};

/// Knobs read once at device creation.
#[derive(Clone, Debug, Default)]
pub struct ContextOptions {
    /// Enable backend validation and debug labels.
    pub validation: bool,
    /// Pick a specific adapter from the enumeration order.
    pub adapter_index: Option<usize>,
}

pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

fn backends() -> wgpu::Backends {
    #[cfg(target_os = "macos")]
    {
        wgpu::Backends::METAL
    }
    #[cfg(not(target_os = "macos"))]
    {
        wgpu::Backends::PRIMARY
    }
}

fn create_instance(options: &ContextOptions) -> Instance {
    let flags = if options.validation {
        wgpu::InstanceFlags::debugging()
    } else {
        wgpu::InstanceFlags::from_build_config()
    };
    Instance::new(wgpu::InstanceDescriptor {
        backends: backends(),
        flags,
        ..Default::default()
    })
}

impl GpuContext {
    /// Initialize a headless context.
    pub async fn new(options: &ContextOptions) -> Result<Self, String> {
        let instance = create_instance(options);
        Self::from_instance(instance, None, options).await
    }

    /// Initialize a context that can present to `window`.
    pub async fn with_window(
        window: Arc<winit::window::Window>,
        options: &ContextOptions,
    ) -> Result<(Self, Surface<'static>), String> {
        let instance = create_instance(options);
        let surface = instance
            .create_surface(window)
            .map_err(|e| format!("Failed to create surface: {}", e))?;
        let ctx = Self::from_instance(instance, Some(&surface), options).await?;
        Ok((ctx, surface))
    }

    async fn from_instance(
        instance: Instance,
        surface: Option<&Surface<'static>>,
        options: &ContextOptions,
    ) -> Result<Self, String> {
        let adapter = match options.adapter_index {
            Some(index) => instance
                .enumerate_adapters(backends())
                .into_iter()
                .nth(index)
                .ok_or_else(|| format!("No GPU adapter at index {}", index))?,
            None => instance
                .request_adapter(&RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    force_fallback_adapter: false,
                    compatible_surface: surface,
                })
                .await
                .ok_or("Failed to find GPU adapter")?,
        };

        let info = adapter.get_info();
        info!("GPU: {} ({:?})", info.name, info.backend);

        // Splat scenes need the largest storage bindings the adapter offers.
        let limits = adapter.limits();
        info!(
            "GPU max storage buffer binding size: {} MB",
            limits.max_storage_buffer_binding_size / (1024 * 1024)
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Splat GPU Device"),
                    required_features: Features::empty(),
                    required_limits: limits,
                },
                None,
            )
            .await
            .map_err(|e| format!("Failed to create device: {}", e))?;

        device.on_uncaptured_error(Box::new(|e| {
            error!("[wgpu] uncaptured error: {e}");
        }));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Synchronous wrapper using pollster.
    pub fn new_blocking(options: &ContextOptions) -> Result<Self, String> {
        pollster::block_on(Self::new(options))
    }

    pub fn with_window_blocking(
        window: Arc<winit::window::Window>,
        options: &ContextOptions,
    ) -> Result<(Self, Surface<'static>), String> {
        pollster::block_on(Self::with_window(window, options))
    }

    /// Largest number of sort entries one storage binding can hold.
    pub fn max_sort_entries(&self) -> u64 {
        let limits = self.device.limits();
        let binding = limits.max_storage_buffer_binding_size as u64;
        let buffer = limits.max_buffer_size;
        binding.min(buffer) / std::mem::size_of::<[u32; 2]>() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // needs a GPU adapter
    fn test_gpu_context_init() {
        let ctx = GpuContext::new_blocking(&ContextOptions::default());
        assert!(ctx.is_ok(), "GPU context initialization failed");
    }
}
