use crate::gpu::FieldCapabilities;

/// Dye resolution forced when the device cannot filter float textures;
/// trades quality for correctness on such adapters.
pub(crate) const DEGRADED_DYE_RESOLUTION: u32 = 512;

/// Tunable simulation parameters, immutable for the lifetime of a session.
#[derive(Clone, Debug)]
pub struct FluidConfig {
    /// Nominal grid resolution for the velocity/pressure fields.
    pub sim_resolution: u32,
    /// Nominal grid resolution for the visible dye field.
    pub dye_resolution: u32,
    /// Per-second decay applied to the dye during advection.
    pub density_dissipation: f32,
    /// Per-second decay applied to the velocity during advection.
    pub velocity_dissipation: f32,
    /// Damping factor applied to the pressure field before each solve.
    pub pressure: f32,
    /// Jacobi iteration count for the pressure solve.
    pub pressure_iterations: u32,
    /// Vorticity confinement strength.
    pub curl: f32,
    /// Splat footprint, in percent of the short surface axis.
    pub splat_radius: f32,
    /// Scale from pointer delta to injected velocity.
    pub splat_force: f32,
    /// Enables the normal-based lighting variant of the composite pass.
    pub shading: bool,
    /// Pointer color rotation speed, cycles per second.
    pub color_update_speed: f32,
    /// Clears the background transparent instead of opaque black.
    pub transparent: bool,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            shading: true,
            color_update_speed: 10.0,
            transparent: false,
        }
    }
}

impl FluidConfig {
    /// Lowers quality settings the device cannot honor. Without hardware
    /// linear filtering the dye grid is coerced down and shading is disabled;
    /// the caller is not notified beyond a log line.
    pub(crate) fn degraded(mut self, capabilities: &FieldCapabilities) -> Self {
        if !capabilities.linear_filtering {
            if self.dye_resolution > DEGRADED_DYE_RESOLUTION {
                tracing::warn!(
                    requested = self.dye_resolution,
                    coerced = DEGRADED_DYE_RESOLUTION,
                    "linear filtering unavailable; lowering dye resolution"
                );
                self.dye_resolution = DEGRADED_DYE_RESOLUTION;
            }
            self.shading = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(linear_filtering: bool) -> FieldCapabilities {
        FieldCapabilities {
            quad: wgpu::TextureFormat::Rgba16Float,
            dual: wgpu::TextureFormat::Rg16Float,
            single: wgpu::TextureFormat::R16Float,
            linear_filtering,
        }
    }

    #[test]
    fn filtering_device_keeps_config() {
        let config = FluidConfig::default().degraded(&caps(true));
        assert_eq!(config.dye_resolution, 1024);
        assert!(config.shading);
    }

    #[test]
    fn non_filtering_device_degrades() {
        let config = FluidConfig::default().degraded(&caps(false));
        assert_eq!(config.dye_resolution, DEGRADED_DYE_RESOLUTION);
        assert!(!config.shading);
    }

    #[test]
    fn degrade_never_raises_dye_resolution() {
        let config = FluidConfig {
            dye_resolution: 256,
            ..FluidConfig::default()
        };
        let degraded = config.degraded(&caps(false));
        assert_eq!(degraded.dye_resolution, 256);
    }
}
