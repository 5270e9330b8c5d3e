// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction parameters
//!
//! Every knob of the pipeline lives in [`ConstructConfig`]. Values can be
//! loaded from a JSON file; absent fields keep their defaults.
//!
//! ```ignore
//! let config = ConstructConfig::default().with_node_budget(100, 2000);
//! config.validate()?;
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tile construction configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructConfig {
    /// Fewer nodes than this after pass 1 tightens the fit tolerance
    pub min_nodes: usize,
    /// More nodes than this after pass 1 loosens the fit tolerance
    pub max_nodes: usize,
    /// Starting fit tolerance in meters
    pub initial_error: f64,
    /// Tolerance is not tightened once it falls below this
    pub error_floor: f64,
    /// Tolerance is not loosened once it rises above this
    pub error_ceiling: f64,
    /// Multiplier applied on each fit-loop adjustment
    pub error_factor: f64,
    /// Safety cap on fit-loop iterations
    pub max_fit_iterations: usize,
    /// Minimum triangle angle in degrees for pass 1 (0 disables refinement)
    pub pass1_min_angle: f64,
    /// Minimum triangle angle in degrees for pass 2
    pub pass2_min_angle: f64,
    /// Cap on quality-refinement Steiner points per pass
    pub max_steiner_points: usize,
    /// Nodes closer than this in both lon and lat (degrees) are merged
    pub node_epsilon: f64,
    /// DEM directory under the work base
    pub dem_dir: String,
    /// Polygon layer directories under the work base, in priority order
    pub polygon_layers: Vec<String>,
    /// Shared-edge directory under the work base
    pub shared_dir: String,
    /// Extension of written mesh files
    pub mesh_extension: String,
}

impl Default for ConstructConfig {
    fn default() -> Self {
        Self {
            min_nodes: 50,
            max_nodes: 960,
            initial_error: 200.0,
            error_floor: 25.0,
            error_ceiling: 1000.0,
            error_factor: 1.5,
            max_fit_iterations: 64,
            pass1_min_angle: 10.0,
            pass2_min_angle: 0.0,
            max_steiner_points: 2000,
            node_epsilon: 1e-7,
            dem_dir: "DEM-3".to_string(),
            polygon_layers: vec![
                "AirportArea".to_string(),
                "AirportObj".to_string(),
                "Hydro".to_string(),
                "Landmass".to_string(),
            ],
            shared_dir: "Shared".to_string(),
            mesh_extension: "json".to_string(),
        }
    }
}

impl ConstructConfig {
    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the fit-loop node budget
    pub fn with_node_budget(mut self, min_nodes: usize, max_nodes: usize) -> Self {
        self.min_nodes = min_nodes;
        self.max_nodes = max_nodes;
        self
    }

    /// Set the per-pass minimum angles
    pub fn with_min_angles(mut self, pass1: f64, pass2: f64) -> Self {
        self.pass1_min_angle = pass1;
        self.pass2_min_angle = pass2;
        self
    }

    /// Set the polygon layers to read
    pub fn with_polygon_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.polygon_layers = layers.into_iter().map(Into::into).collect();
        self
    }

    /// Check that the parameters describe a usable fit loop
    pub fn validate(&self) -> Result<()> {
        if self.min_nodes > self.max_nodes {
            return Err(Error::config(format!(
                "min_nodes ({}) exceeds max_nodes ({})",
                self.min_nodes, self.max_nodes
            )));
        }
        if !(self.error_factor.is_finite() && self.error_factor > 1.0) {
            return Err(Error::config(format!(
                "error_factor must be greater than 1, got {}",
                self.error_factor
            )));
        }
        if !(self.error_floor > 0.0 && self.error_floor < self.error_ceiling) {
            return Err(Error::config(format!(
                "error bounds must satisfy 0 < floor ({}) < ceiling ({})",
                self.error_floor, self.error_ceiling
            )));
        }
        if !(self.initial_error.is_finite() && self.initial_error > 0.0) {
            return Err(Error::config("initial_error must be positive"));
        }
        if self.max_fit_iterations == 0 {
            return Err(Error::config("max_fit_iterations must be at least 1"));
        }
        for (name, angle) in [
            ("pass1_min_angle", self.pass1_min_angle),
            ("pass2_min_angle", self.pass2_min_angle),
        ] {
            // Circumcenter refinement does not terminate reliably past ~34 degrees
            if !(0.0..=34.0).contains(&angle) {
                return Err(Error::config(format!(
                    "{} must be within 0..=34 degrees, got {}",
                    name, angle
                )));
            }
        }
        if !(self.node_epsilon > 0.0 && self.node_epsilon < 1e-3) {
            return Err(Error::config(format!(
                "node_epsilon must be within (0, 1e-3), got {}",
                self.node_epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConstructConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_nodes, 50);
        assert_eq!(config.max_nodes, 960);
        assert_eq!(config.initial_error, 200.0);
        assert_eq!(config.error_factor, 1.5);
    }

    #[test]
    fn test_inverted_budget_rejected() {
        let config = ConstructConfig::default().with_node_budget(500, 100);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_error_bounds_must_be_ordered() {
        let mut config = ConstructConfig::default();
        config.error_floor = 1000.0;
        config.error_ceiling = 1000.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.error_floor = 999.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ConstructConfig::from_json(r#"{ "min_nodes": 10, "shared_dir": "Edges" }"#)
            .unwrap();
        assert_eq!(config.min_nodes, 10);
        assert_eq!(config.shared_dir, "Edges");
        assert_eq!(config.max_nodes, 960);
        assert_eq!(config.polygon_layers.len(), 4);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ConstructConfig::from_json("{ min_nodes: }").unwrap_err();
        assert!(err.aborts_run());
    }

    #[test]
    fn test_excessive_min_angle_rejected() {
        let config = ConstructConfig::default().with_min_angles(40.0, 0.0);
        assert!(config.validate().is_err());
    }
}
