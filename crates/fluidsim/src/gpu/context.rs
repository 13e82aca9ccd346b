use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::TextureFormatFeatureFlags;
use winit::dpi::PhysicalSize;

/// Per-channel-count texture formats negotiated against the adapter, plus
/// whether all of them support hardware linear filtering.
///
/// The probe walks the half-float chain narrowest-first (R16 → RG16 → RGBA16)
/// so single- and dual-channel fields fall back to wider formats on adapters
/// that cannot render the narrow ones.
#[derive(Clone, Copy, Debug)]
pub struct FieldCapabilities {
    pub quad: wgpu::TextureFormat,
    pub dual: wgpu::TextureFormat,
    pub single: wgpu::TextureFormat,
    pub linear_filtering: bool,
}

impl FieldCapabilities {
    /// Probes the adapter for renderable half-float formats. Returns `None`
    /// when no renderable float format exists at all, which callers treat as
    /// the fail-soft "unsupported environment" case.
    pub fn detect(adapter: &wgpu::Adapter) -> Option<Self> {
        let quad = pick_format(adapter, &[wgpu::TextureFormat::Rgba16Float])?;
        let dual = pick_format(
            adapter,
            &[wgpu::TextureFormat::Rg16Float, wgpu::TextureFormat::Rgba16Float],
        )?;
        let single = pick_format(
            adapter,
            &[
                wgpu::TextureFormat::R16Float,
                wgpu::TextureFormat::Rg16Float,
                wgpu::TextureFormat::Rgba16Float,
            ],
        )?;

        let linear_filtering = [quad, dual, single].iter().all(|(_, filterable)| *filterable);

        Some(Self {
            quad: quad.0,
            dual: dual.0,
            single: single.0,
            linear_filtering,
        })
    }
}

fn pick_format(
    adapter: &wgpu::Adapter,
    candidates: &[wgpu::TextureFormat],
) -> Option<(wgpu::TextureFormat, bool)> {
    for format in candidates {
        let features = adapter.get_texture_format_features(*format);
        let renderable = features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING);
        if renderable {
            let filterable = features.flags.contains(TextureFormatFeatureFlags::FILTERABLE);
            return Some((*format, filterable));
        }
        tracing::debug!(?format, "field format not renderable; trying wider fallback");
    }
    None
}

/// Owns the rendering surface and device for one simulation session.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
    pub capabilities: FieldCapabilities,
}

impl GpuContext {
    pub(crate) fn new<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let capabilities = FieldCapabilities::detect(&adapter)
            .context("no renderable float texture format available")?;
        if !capabilities.linear_filtering {
            tracing::warn!(
                quad = ?capabilities.quad,
                dual = ?capabilities.dual,
                single = ?capabilities.single,
                "float formats are not filterable; falling back to manual bilinear sampling"
            );
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("fluidsim device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The dye field is already gamma-encoded, so prefer a non-sRGB
        // swapchain to avoid double conversion.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            surface_format,
            capabilities,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }
}

/// Opens a device with no surface attached. Used by the integration tests to
/// drive the solver without a window.
pub fn request_headless_device() -> Result<(wgpu::Device, wgpu::Queue, FieldCapabilities)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .context("failed to find a headless GPU adapter")?;

    let capabilities = FieldCapabilities::detect(&adapter)
        .context("no renderable float texture format available")?;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("fluidsim headless device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create headless GPU device")?;

    Ok((device, queue, capabilities))
}
