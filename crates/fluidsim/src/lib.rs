//! Interactive GPU fluid simulation.
//!
//! The crate drives a grid-based incompressible solver entirely on the GPU:
//! pointer input becomes velocity and dye impulses, a fixed pass pipeline
//! (curl, vorticity confinement, divergence, Jacobi pressure solve, gradient
//! subtraction, advection) keeps the velocity field divergence-free, and a
//! composite pass draws the dye onto the window surface. The overall flow is:
//!
//! ```text
//!   embedder (window + input)
//!          │ start(target, size, FluidConfig)
//!          ▼
//!   SessionHandle ──▶ Session ──▶ FluidSim::step() ──▶ pass pipeline (GPU)
//!          │                │
//!          │                └─▶ composite ─▶ surface
//!          └─ pointer_*/resize/frame forwarded per event
//! ```
//!
//! `start` is fail-soft: when the environment cannot support the simulation
//! (no adapter, no renderable float formats) it logs the reason and returns an
//! inert handle whose methods do nothing, so an embedding application keeps
//! running without the effect.

mod config;
mod gpu;
mod input;
mod session;
mod shaders;
mod sim;

pub use config::FluidConfig;
pub use gpu::{request_headless_device, FieldCapabilities, RenderTarget};
pub use sim::FluidSim;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use session::Session;

/// Handle to a running simulation session. Dropping it (or calling [`stop`])
/// releases the surface and all GPU resources.
///
/// [`stop`]: SessionHandle::stop
pub struct SessionHandle {
    session: Option<Session>,
}

impl SessionHandle {
    /// True when a live session is attached; an inert handle returns false.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if let Some(session) = self.session.as_mut() {
            session.pointer_down(x, y);
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let Some(session) = self.session.as_mut() {
            session.pointer_move(x, y);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pointer_up();
        }
    }

    /// Touch events fan into the same logical pointer as the mouse.
    pub fn touch_start(&mut self, x: f32, y: f32) {
        self.pointer_down(x, y);
    }

    pub fn touch_move(&mut self, x: f32, y: f32) {
        self.pointer_move(x, y);
    }

    pub fn touch_end(&mut self) {
        self.pointer_up();
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(session) = self.session.as_mut() {
            session.resize(size);
        }
    }

    /// Renders one frame. Surface errors (`wgpu::SurfaceError`) are reported
    /// through the error's source chain so the caller can reconfigure or shut
    /// down; an inert handle always succeeds.
    pub fn frame(&mut self) -> Result<()> {
        match self.session.as_mut() {
            Some(session) => session.frame(),
            None => Ok(()),
        }
    }

    /// Tears the session down. Idempotent; the handle stays usable as an
    /// inert no-op afterwards.
    pub fn stop(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("simulation session stopped");
        }
    }
}

/// Starts a simulation session on the given window target.
///
/// Never panics on unsupported environments: any setup failure is logged at
/// warn level and an inert handle is returned instead.
pub fn start<T>(target: &T, size: PhysicalSize<u32>, config: FluidConfig) -> SessionHandle
where
    T: HasDisplayHandle + HasWindowHandle,
{
    match Session::new(target, size, config) {
        Ok(session) => SessionHandle {
            session: Some(session),
        },
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "fluid simulation unavailable");
            SessionHandle { session: None }
        }
    }
}
