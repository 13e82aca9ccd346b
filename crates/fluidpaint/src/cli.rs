use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "fluidpaint",
    author,
    version,
    about = "Interactive fluid painting in a desktop window"
)]
pub struct Args {
    /// Preset TOML file with simulation parameters; flags override it.
    #[arg(long, value_name = "PATH")]
    pub preset: Option<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", default_value = "1024x768")]
    pub size: String,

    /// Velocity/pressure grid resolution.
    #[arg(long, value_name = "CELLS")]
    pub sim_resolution: Option<u32>,

    /// Dye grid resolution.
    #[arg(long, value_name = "CELLS")]
    pub dye_resolution: Option<u32>,

    /// Per-second dye decay during advection.
    #[arg(long, value_name = "RATE")]
    pub density_dissipation: Option<f32>,

    /// Per-second velocity decay during advection.
    #[arg(long, value_name = "RATE")]
    pub velocity_dissipation: Option<f32>,

    /// Pressure damping factor applied before each solve.
    #[arg(long, value_name = "FACTOR")]
    pub pressure: Option<f32>,

    /// Jacobi iteration count for the pressure solve.
    #[arg(long, value_name = "COUNT")]
    pub pressure_iterations: Option<u32>,

    /// Vorticity confinement strength.
    #[arg(long, value_name = "STRENGTH")]
    pub curl: Option<f32>,

    /// Splat footprint, in percent of the short window axis.
    #[arg(long, value_name = "PERCENT")]
    pub splat_radius: Option<f32>,

    /// Scale from pointer delta to injected velocity.
    #[arg(long, value_name = "SCALE")]
    pub splat_force: Option<f32>,

    /// Disable the normal-based lighting in the composite.
    #[arg(long)]
    pub no_shading: bool,

    /// Pointer color rotation speed.
    #[arg(long, value_name = "SPEED")]
    pub color_speed: Option<f32>,

    /// Clear the background transparent instead of opaque black.
    #[arg(long)]
    pub transparent: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_window_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        anyhow::bail!("window dimensions must be greater than zero");
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_accepts_both_separators() {
        assert_eq!(parse_window_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_window_size(" 800 X 600 ").unwrap(), (800, 600));
    }

    #[test]
    fn size_rejects_garbage() {
        assert!(parse_window_size("1280").is_err());
        assert!(parse_window_size("0x600").is_err());
        assert!(parse_window_size("axb").is_err());
    }
}
