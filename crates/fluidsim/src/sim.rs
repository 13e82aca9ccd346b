use anyhow::Result;
use winit::dpi::PhysicalSize;

use crate::config::FluidConfig;
use crate::gpu::context::FieldCapabilities;
use crate::gpu::programs::{Pass, PassUniforms, ProgramCache};
use crate::gpu::targets::{grid_size, DoubleBuffer, RenderTarget};

/// The GPU-resident solver: velocity and dye double buffers, the auxiliary
/// divergence/curl/pressure targets, and the fixed pass sequence that advances
/// them. Needs only a device and queue, so it runs headless in tests.
pub struct FluidSim {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: FieldCapabilities,
    config: FluidConfig,
    programs: ProgramCache,
    velocity: DoubleBuffer,
    dye: DoubleBuffer,
    pressure: DoubleBuffer,
    divergence: RenderTarget,
    curl: RenderTarget,
    surface_size: PhysicalSize<u32>,
}

impl FluidSim {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        capabilities: FieldCapabilities,
        config: FluidConfig,
        surface_size: PhysicalSize<u32>,
    ) -> Result<Self> {
        let config = config.degraded(&capabilities);
        let linear = capabilities.linear_filtering;
        let programs = ProgramCache::new(device, linear);

        let (sim_w, sim_h) = grid_size(config.sim_resolution, surface_size);
        let (dye_w, dye_h) = grid_size(config.dye_resolution, surface_size);
        tracing::debug!(
            sim_w,
            sim_h,
            dye_w,
            dye_h,
            linear_filtering = linear,
            "allocating simulation targets"
        );

        let velocity =
            DoubleBuffer::new(device, "velocity", sim_w, sim_h, capabilities.dual, linear);
        let dye = DoubleBuffer::new(device, "dye", dye_w, dye_h, capabilities.quad, linear);
        let pressure =
            DoubleBuffer::new(device, "pressure", sim_w, sim_h, capabilities.single, linear);
        let divergence =
            RenderTarget::new(device, "divergence", sim_w, sim_h, capabilities.single, linear);
        let curl = RenderTarget::new(device, "curl", sim_w, sim_h, capabilities.single, linear);

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            capabilities,
            config,
            programs,
            velocity,
            dye,
            pressure,
            divergence,
            curl,
            surface_size,
        })
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn surface_size(&self) -> PhysicalSize<u32> {
        self.surface_size
    }

    /// Current dye field (the read half).
    pub fn dye(&self) -> &RenderTarget {
        self.dye.read()
    }

    /// Current velocity field (the read half).
    pub fn velocity(&self) -> &RenderTarget {
        self.velocity.read()
    }

    pub(crate) fn programs_mut(&mut self) -> &mut ProgramCache {
        &mut self.programs
    }

    fn advection_keywords(&self) -> &'static [&'static str] {
        if self.capabilities.linear_filtering {
            &[]
        } else {
            &["MANUAL_FILTERING"]
        }
    }

    fn aspect_ratio(&self) -> f32 {
        self.surface_size.width.max(1) as f32 / self.surface_size.height.max(1) as f32
    }

    /// Splat radius is configured in percent of the short axis and widened
    /// along x on landscape surfaces so the footprint stays circular.
    fn corrected_radius(&self) -> f32 {
        let mut radius = self.config.splat_radius / 100.0;
        let aspect = self.aspect_ratio();
        if aspect > 1.0 {
            radius *= aspect;
        }
        radius
    }

    /// Injects a Gaussian impulse into the velocity field and the same
    /// footprint of `color` into the dye field at texture coordinate (x, y).
    pub fn splat(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        color: [f32; 3],
    ) -> Result<()> {
        let radius = self.corrected_radius();
        let aspect = self.aspect_ratio();

        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(self.velocity.read().texel_size());
        uniforms.set_point(x, y);
        uniforms.set_radius(radius);
        uniforms.set_aspect_ratio(aspect);
        uniforms.set_color([dx, dy, 0.0]);
        self.programs.encode_pass(
            encoder,
            Pass::Splat,
            &[],
            &uniforms,
            &[self.velocity.read().binding()],
            &self.velocity.write().view,
            self.velocity.write().format,
            None,
        )?;
        self.velocity.swap();

        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(self.dye.read().texel_size());
        uniforms.set_point(x, y);
        uniforms.set_radius(radius);
        uniforms.set_aspect_ratio(aspect);
        uniforms.set_color(color);
        self.programs.encode_pass(
            encoder,
            Pass::Splat,
            &[],
            &uniforms,
            &[self.dye.read().binding()],
            &self.dye.write().view,
            self.dye.write().format,
            None,
        )?;
        self.dye.swap();

        Ok(())
    }

    /// Advances the simulation by `dt` seconds. Pass order is fixed; each
    /// pass samples prior state, writes a fresh target, and swaps where
    /// double-buffered.
    pub fn step(&mut self, encoder: &mut wgpu::CommandEncoder, dt: f32) -> Result<()> {
        let sim_texel = self.velocity.read().texel_size();

        // 1. Curl: scalar vorticity from velocity neighbor differences.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(sim_texel);
        self.programs.encode_pass(
            encoder,
            Pass::Curl,
            &[],
            &uniforms,
            &[self.velocity.read().binding()],
            &self.curl.view,
            self.curl.format,
            None,
        )?;

        // 2. Vorticity confinement; the shader clamps the resulting velocity.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(sim_texel);
        uniforms.set_curl_strength(self.config.curl);
        uniforms.set_dt(dt);
        self.programs.encode_pass(
            encoder,
            Pass::Vorticity,
            &[],
            &uniforms,
            &[self.velocity.read().binding(), self.curl.binding()],
            &self.velocity.write().view,
            self.velocity.write().format,
            None,
        )?;
        self.velocity.swap();

        // 3. Divergence with free-slip boundary handling.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(sim_texel);
        self.programs.encode_pass(
            encoder,
            Pass::Divergence,
            &[],
            &uniforms,
            &[self.velocity.read().binding()],
            &self.divergence.view,
            self.divergence.format,
            None,
        )?;

        // 4. Damp the previous pressure field rather than hard-resetting it.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(sim_texel);
        uniforms.set_clear_scale(self.config.pressure);
        self.programs.encode_pass(
            encoder,
            Pass::Clear,
            &[],
            &uniforms,
            &[self.pressure.read().binding()],
            &self.pressure.write().view,
            self.pressure.write().format,
            None,
        )?;
        self.pressure.swap();

        // 5. Jacobi pressure solve.
        for _ in 0..self.config.pressure_iterations {
            let mut uniforms = PassUniforms::new();
            uniforms.set_target_texel(sim_texel);
            self.programs.encode_pass(
                encoder,
                Pass::Pressure,
                &[],
                &uniforms,
                &[self.pressure.read().binding(), self.divergence.binding()],
                &self.pressure.write().view,
                self.pressure.write().format,
                None,
            )?;
            self.pressure.swap();
        }

        // 6. Subtract the pressure gradient to enforce incompressibility.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(sim_texel);
        self.programs.encode_pass(
            encoder,
            Pass::GradientSubtract,
            &[],
            &uniforms,
            &[self.pressure.read().binding(), self.velocity.read().binding()],
            &self.velocity.write().view,
            self.velocity.write().format,
            None,
        )?;
        self.velocity.swap();

        // 7. Self-advect velocity.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(sim_texel);
        uniforms.set_velocity_texel(sim_texel);
        uniforms.set_source_texel(sim_texel);
        uniforms.set_dt(dt);
        uniforms.set_dissipation(self.config.velocity_dissipation);
        self.programs.encode_pass(
            encoder,
            Pass::Advection,
            self.advection_keywords(),
            &uniforms,
            &[self.velocity.read().binding(), self.velocity.read().binding()],
            &self.velocity.write().view,
            self.velocity.write().format,
            None,
        )?;
        self.velocity.swap();

        // 8. Advect the dye at its own resolution and dissipation.
        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(self.dye.read().texel_size());
        uniforms.set_velocity_texel(sim_texel);
        uniforms.set_source_texel(self.dye.read().texel_size());
        uniforms.set_dt(dt);
        uniforms.set_dissipation(self.config.density_dissipation);
        self.programs.encode_pass(
            encoder,
            Pass::Advection,
            self.advection_keywords(),
            &uniforms,
            &[self.velocity.read().binding(), self.dye.read().binding()],
            &self.dye.write().view,
            self.dye.write().format,
            None,
        )?;
        self.dye.swap();

        Ok(())
    }

    /// Reallocates all render targets for a new surface size. Velocity and
    /// dye keep their visual content through a copy pass; the auxiliary
    /// targets start fresh. Oversized requests are refused with a warning
    /// instead of producing a blank frame.
    pub fn resize(&mut self, new_surface: PhysicalSize<u32>) -> Result<()> {
        let (sim_w, sim_h) = grid_size(self.config.sim_resolution, new_surface);
        let (dye_w, dye_h) = grid_size(self.config.dye_resolution, new_surface);

        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if sim_w.max(sim_h).max(dye_w).max(dye_h) > max_dimension {
            tracing::warn!(
                sim_w,
                sim_h,
                dye_w,
                dye_h,
                max_dimension,
                "resize exceeds device texture limits; keeping previous targets"
            );
            return Ok(());
        }

        self.surface_size = new_surface;
        if (sim_w, sim_h) == (self.velocity.read().width, self.velocity.read().height)
            && (dye_w, dye_h) == (self.dye.read().width, self.dye.read().height)
        {
            return Ok(());
        }

        let linear = self.capabilities.linear_filtering;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("resize encoder"),
            });

        self.velocity.resize(
            &self.device,
            &mut encoder,
            &mut self.programs,
            "velocity",
            sim_w,
            sim_h,
            linear,
        )?;
        self.dye.resize(
            &self.device,
            &mut encoder,
            &mut self.programs,
            "dye",
            dye_w,
            dye_h,
            linear,
        )?;

        self.pressure = DoubleBuffer::new(
            &self.device,
            "pressure",
            sim_w,
            sim_h,
            self.capabilities.single,
            linear,
        );
        self.divergence = RenderTarget::new(
            &self.device,
            "divergence",
            sim_w,
            sim_h,
            self.capabilities.single,
            linear,
        );
        self.curl = RenderTarget::new(
            &self.device,
            "curl",
            sim_w,
            sim_h,
            self.capabilities.single,
            linear,
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Convenience for headless callers: encodes one step and submits it.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tick encoder"),
            });
        self.step(&mut encoder, dt)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Convenience for headless callers: encodes one splat and submits it.
    pub fn inject(&mut self, x: f32, y: f32, dx: f32, dy: f32, color: [f32; 3]) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("splat encoder"),
            });
        self.splat(&mut encoder, x, y, dx, dy, color)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
