use anyhow::{anyhow, Context, Result};
use fluidsim::FluidConfig;
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::cli::{parse_window_size, Args};
use crate::preset::Preset;

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let (width, height) = parse_window_size(&args.size)?;
    let config = build_config(&args)?;
    tracing::debug!(
        width,
        height,
        sim_resolution = config.sim_resolution,
        dye_resolution = config.dye_resolution,
        "starting fluidpaint"
    );

    run_window(PhysicalSize::new(width, height), config)
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Layered configuration: built-in defaults, then the preset file, then
/// command-line flags.
fn build_config(args: &Args) -> Result<FluidConfig> {
    let mut config = FluidConfig::default();
    if let Some(path) = args.preset.as_deref() {
        let preset = Preset::load(path).context("failed to load preset")?;
        config = preset.apply(config);
    }

    if let Some(value) = args.sim_resolution {
        config.sim_resolution = value;
    }
    if let Some(value) = args.dye_resolution {
        config.dye_resolution = value;
    }
    if let Some(value) = args.density_dissipation {
        config.density_dissipation = value;
    }
    if let Some(value) = args.velocity_dissipation {
        config.velocity_dissipation = value;
    }
    if let Some(value) = args.pressure {
        config.pressure = value;
    }
    if let Some(value) = args.pressure_iterations {
        config.pressure_iterations = value;
    }
    if let Some(value) = args.curl {
        config.curl = value;
    }
    if let Some(value) = args.splat_radius {
        config.splat_radius = value;
    }
    if let Some(value) = args.splat_force {
        config.splat_force = value;
    }
    if args.no_shading {
        config.shading = false;
    }
    if let Some(value) = args.color_speed {
        config.color_update_speed = value;
    }
    if args.transparent {
        config.transparent = true;
    }

    Ok(config)
}

/// Opens the window and drives the `winit` event loop. Pointer events feed
/// the simulation; every `AboutToWait` schedules the next redraw so frames
/// pace off the compositor's vblank.
fn run_window(size: PhysicalSize<u32>, config: FluidConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window = WindowBuilder::new()
        .with_title("fluidpaint")
        .with_inner_size(size)
        .with_transparent(config.transparent)
        .build(&event_loop)
        .context("failed to create window")?;

    let mut session = fluidsim::start(&window, window.inner_size(), config);
    if !session.is_active() {
        anyhow::bail!("this environment cannot run the simulation; see the log for details");
    }

    let mut cursor = (0.0_f32, 0.0_f32);
    window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            session.stop();
                            elwt.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            session.resize(new_size);
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            cursor = (position.x as f32, position.y as f32);
                            session.pointer_move(cursor.0, cursor.1);
                        }
                        WindowEvent::MouseInput { state, button, .. } => {
                            if button == MouseButton::Left {
                                match state {
                                    ElementState::Pressed => {
                                        session.pointer_down(cursor.0, cursor.1);
                                    }
                                    ElementState::Released => session.pointer_up(),
                                }
                            }
                        }
                        WindowEvent::Touch(touch) => {
                            let (x, y) = (touch.location.x as f32, touch.location.y as f32);
                            match touch.phase {
                                TouchPhase::Started => session.touch_start(x, y),
                                TouchPhase::Moved => session.touch_move(x, y),
                                TouchPhase::Ended | TouchPhase::Cancelled => session.touch_end(),
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(err) = session.frame() {
                                handle_frame_error(&err, &window, &mut session, elwt);
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

/// Surface losses are recoverable by reconfiguring at the current size;
/// anything else either exits (out of memory) or retries next frame.
fn handle_frame_error(
    err: &anyhow::Error,
    window: &winit::window::Window,
    session: &mut fluidsim::SessionHandle,
    elwt: &winit::event_loop::EventLoopWindowTarget<()>,
) {
    match err.downcast_ref::<wgpu::SurfaceError>() {
        Some(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            tracing::debug!("surface lost; reconfiguring");
            session.resize(window.inner_size());
        }
        Some(wgpu::SurfaceError::OutOfMemory) => {
            tracing::error!("surface out of memory; exiting");
            session.stop();
            elwt.exit();
        }
        Some(wgpu::SurfaceError::Timeout) => {
            tracing::debug!("surface timeout; retrying next frame");
        }
        _ => {
            tracing::warn!(error = %format!("{err:#}"), "frame failed; retrying next frame");
        }
    }
}
