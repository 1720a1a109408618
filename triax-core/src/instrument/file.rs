//! Instrument definition files.
//!
//! YAML with a fixed header: `ident` must match the program identifier and
//! `timestamp` records the save time. The `configuration` sections are
//! carried through opaquely for the front-end; only `instrument_space` is
//! interpreted here. The format is stable across patch versions.

use super::model::{Obstacle, TasInstrumentModel};
use super::AngularLimits;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

/// Identifier checked against the file's `ident` tag.
pub const PROGRAM_IDENT: &str = "triax";

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigurationSections {
    pub tas: serde_yaml::Value,
    pub crystal: serde_yaml::Value,
    pub coordinates: serde_yaml::Value,
    pub path: serde_yaml::Value,
    pub camera: serde_yaml::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmsSection {
    pub mono_sample_len: f64,
    pub sample_ana_len: f64,
    pub width: f64,
}

impl Default for ArmsSection {
    fn default() -> Self {
        Self {
            mono_sample_len: 2.0,
            sample_ana_len: 1.5,
            width: 0.25,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// degrees in the file, converted to radians on load
    pub a2_lo: f64,
    pub a2_hi: f64,
    pub a4_lo: f64,
    pub a4_hi: f64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            a2_lo: -180.0,
            a2_hi: 180.0,
            a4_lo: -180.0,
            a4_hi: 180.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstrumentSpaceSection {
    pub arms: ArmsSection,
    pub limits: LimitsSection,
    pub obstacles: Vec<Obstacle>,
}

/// Top-level instrument definition file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstrumentFile {
    pub ident: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub configuration: ConfigurationSections,
    #[serde(default)]
    pub instrument_space: InstrumentSpaceSection,
}

impl InstrumentFile {
    /// Parse from a YAML string and verify the identifier.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: InstrumentFile = serde_yaml::from_str(yaml)?;
        if file.ident != PROGRAM_IDENT {
            return Err(CoreError::Format(format!(
                "instrument file ident '{}' does not match '{}'",
                file.ident, PROGRAM_IDENT
            )));
        }
        Ok(file)
    }

    /// Build the kinematic model described by the file.
    pub fn build_model(&self) -> TasInstrumentModel {
        let space = &self.instrument_space;
        let mut model = TasInstrumentModel::new(
            space.arms.mono_sample_len,
            space.arms.sample_ana_len,
            space.arms.width,
        );
        model.set_limits(AngularLimits {
            a2_lo: space.limits.a2_lo / 180.0 * PI,
            a2_hi: space.limits.a2_hi / 180.0 * PI,
            a4_lo: space.limits.a4_lo / 180.0 * PI,
            a4_hi: space.limits.a4_hi / 180.0 * PI,
        });
        for obstacle in &space.obstacles {
            model.add_obstacle(obstacle.clone());
        }
        model
    }
}

/// Load an instrument definition file and build its model.
pub fn load_instrument_file(path: &Path) -> Result<(InstrumentFile, TasInstrumentModel)> {
    let contents = std::fs::read_to_string(path)?;
    let file = InstrumentFile::from_yaml(&contents)?;
    let model = file.build_model();
    Ok((file, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
ident: triax
timestamp: "2024-11-02T10:31:00"
configuration:
  tas:
    kf_fixed: true
instrument_space:
  arms:
    mono_sample_len: 2.0
    sample_ana_len: 1.5
    width: 0.2
  limits:
    a2_lo: -130.0
    a2_hi: 130.0
    a4_lo: -175.0
    a4_hi: 175.0
  obstacles:
    - shape: circle
      name: pillar
      centre: [2.5, 0.5]
      radius: 0.4
    - shape: box
      name: rack
      min: [-1.0, -2.0]
      max: [-0.5, -1.0]
"#;

    #[test]
    fn test_parse_and_build() {
        let file = InstrumentFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(file.ident, "triax");
        let model = file.build_model();
        assert_eq!(model.obstacles().len(), 2);
        let limits = {
            use crate::instrument::InstrumentSpace;
            model.angular_limits()
        };
        assert!((limits.a2_hi - 130.0 / 180.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_ident_rejected() {
        let yaml = SAMPLE.replace("ident: triax", "ident: other-tool");
        let err = InstrumentFile::from_yaml(&yaml);
        assert!(err.is_err());
    }

    #[test]
    fn test_roundtrip() {
        let file = InstrumentFile::from_yaml(SAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&file).unwrap();
        let parsed = InstrumentFile::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.instrument_space.obstacles.len(), 2);
    }
}
