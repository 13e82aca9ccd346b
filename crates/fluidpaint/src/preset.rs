use std::path::Path;

use fluidsim::FluidConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("failed to read preset file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse preset file {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Simulation parameters loaded from a TOML file. Every field is optional;
/// anything left out keeps the built-in default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub sim_resolution: Option<u32>,
    pub dye_resolution: Option<u32>,
    pub density_dissipation: Option<f32>,
    pub velocity_dissipation: Option<f32>,
    pub pressure: Option<f32>,
    pub pressure_iterations: Option<u32>,
    pub curl: Option<f32>,
    pub splat_radius: Option<f32>,
    pub splat_force: Option<f32>,
    pub shading: Option<bool>,
    pub color_speed: Option<f32>,
    pub transparent: Option<bool>,
}

impl Preset {
    pub fn load(path: &Path) -> Result<Self, PresetError> {
        let text = std::fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| PresetError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Layers the preset over `base`, leaving unset fields untouched.
    pub fn apply(&self, mut base: FluidConfig) -> FluidConfig {
        if let Some(value) = self.sim_resolution {
            base.sim_resolution = value;
        }
        if let Some(value) = self.dye_resolution {
            base.dye_resolution = value;
        }
        if let Some(value) = self.density_dissipation {
            base.density_dissipation = value;
        }
        if let Some(value) = self.velocity_dissipation {
            base.velocity_dissipation = value;
        }
        if let Some(value) = self.pressure {
            base.pressure = value;
        }
        if let Some(value) = self.pressure_iterations {
            base.pressure_iterations = value;
        }
        if let Some(value) = self.curl {
            base.curl = value;
        }
        if let Some(value) = self.splat_radius {
            base.splat_radius = value;
        }
        if let Some(value) = self.splat_force {
            base.splat_force = value;
        }
        if let Some(value) = self.shading {
            base.shading = value;
        }
        if let Some(value) = self.color_speed {
            base.color_update_speed = value;
        }
        if let Some(value) = self.transparent {
            base.transparent = value;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_preset_keeps_defaults() {
        let preset = Preset::from_toml_str("").unwrap();
        let config = preset.apply(FluidConfig::default());
        let defaults = FluidConfig::default();
        assert_eq!(config.sim_resolution, defaults.sim_resolution);
        assert_eq!(config.curl, defaults.curl);
        assert_eq!(config.shading, defaults.shading);
    }

    #[test]
    fn partial_preset_overrides_only_named_fields() {
        let preset = Preset::from_toml_str(
            r#"
            sim_resolution = 256
            curl = 50.0
            shading = false
            "#,
        )
        .unwrap();
        let config = preset.apply(FluidConfig::default());
        assert_eq!(config.sim_resolution, 256);
        assert_eq!(config.curl, 50.0);
        assert!(!config.shading);
        assert_eq!(config.dye_resolution, FluidConfig::default().dye_resolution);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Preset::from_toml_str("viscosity = 3.0").is_err());
    }
}
