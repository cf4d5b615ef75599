//! Tunable generation parameters and their allowed ranges.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Recommended floor for `repetition_penalty`.
///
/// The autoregressive stage is prone to runaway token repetition below 2.0.
/// Lower values down to 1.0 are still honored, not rejected: callers who
/// want the extra creative range trade away that robustness knowingly.
pub const REPETITION_PENALTY_FLOOR: f32 = 2.0;

/// The five sampling knobs threaded into one synthesis call.
///
/// Out-of-range values are a validation error, never silently clamped;
/// a request either runs with exactly the parameters it asked for or not
/// at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_min_p")]
    pub min_p: f32,
    #[serde(default = "default_cfg_weight")]
    pub cfg_weight: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            repetition_penalty: default_repetition_penalty(),
            top_p: default_top_p(),
            min_p: default_min_p(),
            cfg_weight: default_cfg_weight(),
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<()> {
        check_range("temperature", self.temperature, 0.1, 1.5)?;
        check_range("repetition_penalty", self.repetition_penalty, 1.0, 3.0)?;
        check_range("top_p", self.top_p, 0.1, 1.0)?;
        check_range("min_p", self.min_p, 0.0, 0.2)?;
        check_range("cfg_weight", self.cfg_weight, 0.0, 1.0)?;
        Ok(())
    }

    /// True when the caller chose a repetition penalty under the
    /// documented floor.
    pub fn below_recommended_floor(&self) -> bool {
        self.repetition_penalty < REPETITION_PENALTY_FLOOR
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(Error::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn default_temperature() -> f32 {
    0.8
}

fn default_repetition_penalty() -> f32 {
    REPETITION_PENALTY_FLOOR
}

fn default_top_p() -> f32 {
    1.0
}

fn default_min_p() -> f32 {
    0.05
}

fn default_cfg_weight() -> f32 {
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_on_the_floor() {
        let params = GenerationParams::default();
        params.validate().unwrap();
        assert!(!params.below_recommended_floor());
        assert_eq!(params.cfg_weight, 0.5);
    }

    #[test]
    fn temperature_boundaries_are_inclusive() {
        for temperature in [0.1, 1.5] {
            GenerationParams {
                temperature,
                ..Default::default()
            }
            .validate()
            .unwrap();
        }
        for temperature in [0.09, 1.51] {
            let err = GenerationParams {
                temperature,
                ..Default::default()
            }
            .validate()
            .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            assert!(err.to_string().contains("temperature"));
        }
    }

    #[test]
    fn every_knob_rejects_out_of_range() {
        let cases = [
            GenerationParams {
                repetition_penalty: 0.99,
                ..Default::default()
            },
            GenerationParams {
                repetition_penalty: 3.01,
                ..Default::default()
            },
            GenerationParams {
                top_p: 0.05,
                ..Default::default()
            },
            GenerationParams {
                min_p: 0.3,
                ..Default::default()
            },
            GenerationParams {
                cfg_weight: -0.1,
                ..Default::default()
            },
            GenerationParams {
                temperature: f32::NAN,
                ..Default::default()
            },
        ];
        for params in cases {
            assert!(params.validate().is_err(), "{:?} should fail", params);
        }
    }

    #[test]
    fn low_repetition_penalty_is_honored_but_flagged() {
        let params = GenerationParams {
            repetition_penalty: 1.2,
            ..Default::default()
        };
        params.validate().unwrap();
        assert!(params.below_recommended_floor());
    }

    #[test]
    fn partial_json_fills_in_the_defaults() {
        let params: GenerationParams = serde_json::from_str(r#"{"temperature": 1.0}"#).unwrap();
        assert_eq!(params.temperature, 1.0);
        assert_eq!(params.repetition_penalty, REPETITION_PENALTY_FLOOR);
        assert_eq!(params.min_p, 0.05);
    }
}
