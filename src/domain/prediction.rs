//! Prediction record: the three adverse event rates produced per request.

use serde::{Deserialize, Serialize};

/// Output names, in the order the model heads produce them.
pub const TARGET_NAMES: [&str; 3] = [
    "rate_deaths_calc",
    "rate_serious_aes_calc",
    "rate_other_aes_calc",
];

/// Three non-negative rates, rounded to 3 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Predicted rate of deaths
    pub rate_deaths_calc: f64,

    /// Predicted rate of serious adverse events
    pub rate_serious_aes_calc: f64,

    /// Predicted rate of other adverse events
    pub rate_other_aes_calc: f64,
}

impl PredictionRecord {
    /// Build a record from raw model outputs in [`TARGET_NAMES`] order.
    ///
    /// Negative outputs are clamped to zero; rates cannot be negative.
    ///
    /// # Errors
    /// Returns an error if there are not exactly three finite outputs.
    pub fn from_outputs(outputs: &[f32]) -> Result<Self, String> {
        let [deaths, serious, other] = outputs else {
            return Err(format!(
                "Expected {} model outputs, got {}",
                TARGET_NAMES.len(),
                outputs.len()
            ));
        };

        if let Some(i) = outputs.iter().position(|v| !v.is_finite()) {
            return Err(format!("Model output {} is not finite", TARGET_NAMES[i]));
        }

        Ok(Self {
            rate_deaths_calc: to_rate(*deaths),
            rate_serious_aes_calc: to_rate(*serious),
            rate_other_aes_calc: to_rate(*other),
        })
    }
}

fn to_rate(raw: f32) -> f64 {
    let rounded = round3(f64::from(raw));
    if rounded > 0.0 {
        rounded
    } else {
        0.0
    }
}

/// Round to 3 decimal places, exact halves to the even digit.
#[must_use]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}
