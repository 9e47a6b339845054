// Global configuration and constants

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("unsupported config format for {0}: expected .yaml, .yml, or .json")]
    UnknownFormat(String),
}

/// Configuration struct for simulation parameters.
///
/// Partial config files override only the fields they name; everything else
/// keeps its default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // World
    pub width: f32,
    pub height: f32,
    /// Seed offset above the bottom edge.
    pub seed_margin: f32,
    pub tick_interval_ms: u64,

    // Energy field
    pub ambient_energy: f32,
    pub light_sensing_radius: f32,

    // Spatial-complexity field
    pub baseline_complexity: f32,
    pub proximity_radius: f32,
    pub support_relief: f32,
    pub gradient_step: f32,

    // Node dynamics
    pub coherence_damping: f32,
    pub response_gain: f32,
    pub stabilizer: f32,
    pub gradient_scale: f32,

    // Branching
    pub branch_distortion_threshold: f32,
    pub branch_min_energy: f32,
    pub branch_min_age: u32,
    pub branch_release_distortion: f32,
    pub crowding_radius: f32,
    pub crowding_cap: usize,

    // Growth
    pub growth_rate: f32,
    pub growth_min_coherence: f32,
    pub growth_max_age: u32,
    pub active_max_age: u32,
    pub active_node_cap: usize,
    pub growth_bias_x: f32,
    pub growth_bias_y: f32,
    pub gradient_avoidance: f32,
    pub light_attraction: f32,

    // Lifecycle
    /// Nodes older than this are inert: still rendered, never updated.
    pub max_update_age: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            seed_margin: 50.0,
            tick_interval_ms: 200,
            ambient_energy: 0.2,
            light_sensing_radius: 200.0,
            baseline_complexity: 0.5,
            proximity_radius: 100.0,
            support_relief: 0.5,
            gradient_step: 5.0,
            coherence_damping: 0.2,
            response_gain: 0.3,
            stabilizer: 1e-9,
            gradient_scale: 0.01,
            branch_distortion_threshold: 15.0,
            branch_min_energy: 0.2,
            branch_min_age: 3,
            branch_release_distortion: 0.5,
            crowding_radius: 20.0,
            crowding_cap: 3,
            growth_rate: 5.0,
            growth_min_coherence: 0.1,
            growth_max_age: 15,
            active_max_age: 15,
            active_node_cap: 50,
            growth_bias_x: 0.15,
            growth_bias_y: -1.0,
            gradient_avoidance: 30.0,
            light_attraction: 2.0,
            max_update_age: 20,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match extension {
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                    path: path.to_string(),
                    message: e.to_string(),
                })
            }
            "json" => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_string(),
                message: e.to_string(),
            }),
            _ => Err(ConfigError::UnknownFormat(path.to_string())),
        }
    }

    /// Search the working directory for a config file, falling back to the
    /// defaults when none exists or none parses.
    pub fn from_default_paths() -> Self {
        for candidate in ["config.yaml", "config.yml", "config.json"] {
            if Path::new(candidate).exists() {
                match Self::from_file(candidate) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("ignoring {candidate}: {e}");
                    }
                }
            }
        }
        Self::default()
    }

    pub fn crowding_radius_sq(&self) -> f32 {
        self.crowding_radius * self.crowding_radius
    }
}
