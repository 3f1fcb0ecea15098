//! Physics and table configuration
//!
//! One immutable bundle passed into every entry point. Loaded from JSON when
//! a caller wants something other than the regulation defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Friction, restitution, geometry and loop limits for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    // === World ===
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,

    // === Balls ===
    pub ball_radius: f64,
    pub ball_mass: f64,

    // === Table ===
    /// Playing surface length, cushion nose to cushion nose (m)
    pub table_length: f64,
    /// Playing surface width (m)
    pub table_width: f64,
    /// Depth of the cushion polygons behind the nose line (m)
    pub cushion_width: f64,
    /// Cushion nose height; balls above it fly over rails and pockets (m)
    pub rail_height: f64,
    pub corner_pocket_radius: f64,
    /// Corner pocket centre offset outward from the table corner, per axis (m)
    pub corner_pocket_offset: f64,
    /// Distance from the corner to where the cushion nose begins (m)
    pub corner_mouth: f64,
    pub side_pocket_radius: f64,
    /// Side pocket centre offset outward from the rail line (m)
    pub side_pocket_offset: f64,
    /// Half-width of the side pocket opening along the rail (m)
    pub side_mouth: f64,
    pub pocket_depth: f64,

    // === Cloth ===
    pub sliding_friction: f64,
    pub rolling_friction: f64,
    pub spinning_friction: f64,
    /// Vertical restitution when an airborne ball lands
    pub table_restitution: f64,

    // === Contacts ===
    pub ball_restitution: f64,
    pub ball_friction: f64,
    pub cushion_restitution: f64,
    pub cushion_friction: f64,

    // === Cue ===
    /// Cue ball speed per unit of shot force (m/s)
    pub force_scale: f64,

    // === Loop ===
    /// Fixed ticks per simulated second
    pub tick_rate: f64,
    /// Tick cap for a full run
    pub max_iterations: u32,
    /// Substep cap per tick
    pub max_substeps: u32,
    /// Ticks between tracking points
    pub tracking_stride: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            gravity: 9.81,

            ball_radius: 0.028575,
            ball_mass: 0.17,

            table_length: 2.54,
            table_width: 1.27,
            cushion_width: 0.05,
            rail_height: 0.0366,
            corner_pocket_radius: 0.06,
            corner_pocket_offset: 0.02,
            corner_mouth: 0.09,
            side_pocket_radius: 0.065,
            side_pocket_offset: 0.025,
            side_mouth: 0.065,
            pocket_depth: 0.1,

            sliding_friction: 0.2,
            rolling_friction: 0.01,
            spinning_friction: 0.044,
            table_restitution: 0.5,

            ball_restitution: 0.95,
            ball_friction: 0.06,
            cushion_restitution: 0.85,
            cushion_friction: 0.2,

            force_scale: 0.5,

            tick_rate: 120.0,
            max_iterations: 7200,
            max_substeps: 256,
            tracking_stride: 4,
        }
    }
}

impl Params {
    /// Fixed tick length (s)
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate
    }

    /// Angular deceleration of z-spin against the cloth (rad/s²)
    #[inline]
    pub fn spin_deceleration(&self, radius: f64) -> f64 {
        5.0 * self.spinning_friction * self.gravity / (2.0 * radius)
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        // Plain numeric struct, serialization cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Load from a JSON file, falling back to defaults on any failure
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(params) => {
                    log::info!("Loaded params from {}", path.display());
                    params
                }
                Err(e) => {
                    log::warn!("Invalid params in {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read {}: {} - using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Same table with a different tick cap
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let params = Params::from_json(r#"{ "tick_rate": 240.0, "ball_mass": 0.16 }"#).unwrap();
        assert_eq!(params.tick_rate, 240.0);
        assert_eq!(params.ball_mass, 0.16);
        assert_eq!(params.gravity, Params::default().gravity);
        assert!((params.dt() - 1.0 / 240.0).abs() < 1e-15);
    }

    #[test]
    fn test_json_roundtrip() {
        let params = Params::default().with_max_iterations(10);
        let back = Params::from_json(&params.to_json()).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(Params::from_json("{ \"gravity\": \"down\" }").is_err());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let params = Params::load("/definitely/not/here/params.json");
        assert_eq!(params, Params::default());
    }
}
