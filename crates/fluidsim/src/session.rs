use std::time::Instant;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::config::FluidConfig;
use crate::gpu::context::GpuContext;
use crate::gpu::programs::{Pass, PassUniforms};
use crate::input::{ColorCycle, InputEvent, Pointer};
use crate::sim::FluidSim;

/// Longest simulated step per frame; long stalls are absorbed instead of
/// integrated, which keeps the solver stable across window drags.
const MAX_FRAME_DT: f32 = 1.0 / 60.0;

/// Intensity multiplier for the pointer-down pop splat, which carries no
/// velocity and only marks the touch point.
const DOWN_SPLAT_BOOST: f32 = 10.0;

fn clamp_dt(elapsed: f32) -> f32 {
    elapsed.clamp(0.0, MAX_FRAME_DT)
}

/// One live simulation bound to a window surface. Owns the GPU context, the
/// solver, and the pointer state, and turns queued input plus wall-clock time
/// into frames.
pub(crate) struct Session {
    context: GpuContext,
    sim: FluidSim,
    pointer: Pointer,
    events: Vec<InputEvent>,
    colors: ColorCycle,
    pending_resize: Option<PhysicalSize<u32>>,
    last_frame: Instant,
    frames_since_report: u32,
    report_start: Instant,
}

impl Session {
    pub fn new<T>(target: &T, size: PhysicalSize<u32>, config: FluidConfig) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size)?;
        let sim = FluidSim::new(
            &context.device,
            &context.queue,
            context.capabilities,
            config,
            context.size,
        )?;

        let now = Instant::now();
        Ok(Self {
            context,
            sim,
            pointer: Pointer::default(),
            events: Vec::new(),
            colors: ColorCycle::default(),
            pending_resize: None,
            last_frame: now,
            frames_since_report: 0,
            report_start: now,
        })
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.events.push(InputEvent::Down { x, y });
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.events.push(InputEvent::Move { x, y });
    }

    pub fn pointer_up(&mut self) {
        self.events.push(InputEvent::Up);
    }

    /// Resizes are deferred to the top of the next frame so the swapchain and
    /// the simulation grids change together.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.pending_resize = Some(size);
    }

    /// Renders one frame: advances time, applies input, steps the solver, and
    /// composites the dye onto the surface. Surface losses propagate to the
    /// caller, which decides between reconfigure and shutdown.
    pub fn frame(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = clamp_dt(now.duration_since(self.last_frame).as_secs_f32());
        self.last_frame = now;

        if let Some(size) = self.pending_resize.take() {
            if size.width > 0 && size.height > 0 {
                self.context.resize(size);
                self.sim.resize(self.context.size)?;
            }
        }

        // Acquire before encoding anything: if the surface is lost, nothing
        // has been stepped or drained yet, so the recovery frame replays the
        // same input against unchanged buffers.
        let frame = self.context.surface.get_current_texture()?;
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if self.colors.advance(dt, self.sim.config().color_update_speed) {
            self.pointer.color = self.colors.next_color();
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        self.apply_input(&mut encoder)?;
        self.sim.step(&mut encoder, dt)?;
        self.composite(&mut encoder, &surface_view)?;

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        self.frames_since_report += 1;
        let window = now.duration_since(self.report_start).as_secs_f32();
        if window >= 1.0 {
            let fps = self.frames_since_report as f32 / window;
            tracing::debug!(
                fps = format_args!("{fps:.1}"),
                frames = self.frames_since_report,
                "frame rate"
            );
            self.frames_since_report = 0;
            self.report_start = now;
        }

        Ok(())
    }

    /// Drains the queued pointer events in arrival order, then injects at
    /// most one drag splat from the accumulated motion.
    fn apply_input(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<()> {
        let surface = self.context.size;
        for event in std::mem::take(&mut self.events) {
            match event {
                InputEvent::Down { x, y } => {
                    let color = self.colors.next_color();
                    self.pointer.press(x, y, surface, color);
                    // A stationary press still leaves a visible mark.
                    let [px, py] = self.pointer.texcoord;
                    let pop = [
                        color[0] * DOWN_SPLAT_BOOST,
                        color[1] * DOWN_SPLAT_BOOST,
                        color[2] * DOWN_SPLAT_BOOST,
                    ];
                    self.sim.splat(encoder, px, py, 0.0, 0.0, pop)?;
                }
                InputEvent::Move { x, y } => {
                    if self.pointer.down {
                        self.pointer.advance(x, y, surface);
                    }
                }
                InputEvent::Up => {
                    self.pointer.down = false;
                }
            }
        }

        if let Some([dx, dy]) = self.pointer.take_motion() {
            let force = self.sim.config().splat_force;
            let [px, py] = self.pointer.texcoord;
            self.sim
                .splat(encoder, px, py, dx * force, dy * force, self.pointer.color)?;
        }

        Ok(())
    }

    /// Draws the dye field over a cleared surface, with the lighting variant
    /// selected by configuration.
    fn composite(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
    ) -> Result<()> {
        let config = self.sim.config();
        let keywords: &'static [&'static str] = if config.shading { &["SHADING"] } else { &[] };
        let clear = if config.transparent {
            wgpu::Color::TRANSPARENT
        } else {
            wgpu::Color::BLACK
        };

        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel([
            1.0 / self.context.size.width.max(1) as f32,
            1.0 / self.context.size.height.max(1) as f32,
        ]);

        let surface_format = self.context.surface_format;
        let dye_binding = {
            let dye = self.sim.dye();
            (dye.view.clone(), dye.sampler.clone())
        };
        self.sim.programs_mut().encode_pass(
            encoder,
            Pass::Display,
            keywords,
            &uniforms,
            &[(&dye_binding.0, &dye_binding.1)],
            surface_view,
            surface_format,
            Some(clear),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_never_exceeds_one_sixtieth() {
        assert_eq!(clamp_dt(5.0), MAX_FRAME_DT);
        assert_eq!(clamp_dt(1.0 / 120.0), 1.0 / 120.0);
    }

    #[test]
    fn dt_never_negative() {
        assert_eq!(clamp_dt(-0.25), 0.0);
    }
}
