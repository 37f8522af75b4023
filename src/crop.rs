//! Rule-based crop recommendation from soil and climate readings.

use crate::llm::{CompanionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw form input. Every field is optional so missing values can be reported
/// as a validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CropParams {
    pub nitrogen: Option<f64>,
    pub phosphorus: Option<f64>,
    pub potassium: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ph: Option<f64>,
    pub rainfall: Option<f64>,
}

/// Validated readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilReadings {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    Cotton,
    Millet,
    Rice,
    Maize,
    Wheat,
    Barley,
    Groundnut,
    Soybean,
}

impl Crop {
    pub fn label(self) -> &'static str {
        match self {
            Crop::Cotton => "cotton",
            Crop::Millet => "millet",
            Crop::Rice => "rice",
            Crop::Maize => "maize",
            Crop::Wheat => "wheat",
            Crop::Barley => "barley",
            Crop::Groundnut => "groundnut",
            Crop::Soybean => "soybean",
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn invalid(message: &str) -> CompanionError {
    CompanionError::Validation(message.to_string())
}

impl CropParams {
    /// Read a form submission whose values may be numbers or numeric strings
    pub fn from_json(value: &serde_json::Value) -> Self {
        let field = |name: &str| match value.get(name) {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Self {
            nitrogen: field("nitrogen"),
            phosphorus: field("phosphorus"),
            potassium: field("potassium"),
            temperature: field("temperature"),
            humidity: field("humidity"),
            ph: field("ph"),
            rainfall: field("rainfall"),
        }
    }

    pub fn validate(&self) -> Result<SoilReadings> {
        let required = |value: Option<f64>| value.filter(|v| v.is_finite());
        let (
            Some(nitrogen),
            Some(phosphorus),
            Some(potassium),
            Some(temperature),
            Some(humidity),
            Some(ph),
            Some(rainfall),
        ) = (
            required(self.nitrogen),
            required(self.phosphorus),
            required(self.potassium),
            required(self.temperature),
            required(self.humidity),
            required(self.ph),
            required(self.rainfall),
        )
        else {
            return Err(invalid("All parameters are required"));
        };

        if nitrogen == 0.0 || phosphorus == 0.0 || potassium == 0.0 || rainfall == 0.0 {
            return Err(invalid("All parameters are required"));
        }
        if nitrogen < 0.0 || phosphorus < 0.0 || potassium < 0.0 {
            return Err(invalid("Soil nutrient values must be positive"));
        }
        if !(-50.0..=60.0).contains(&temperature) {
            return Err(invalid("Temperature must be between -50°C and 60°C"));
        }
        if !(0.0..=100.0).contains(&humidity) {
            return Err(invalid("Humidity must be between 0% and 100%"));
        }
        if !(0.0..=14.0).contains(&ph) {
            return Err(invalid("pH must be between 0 and 14"));
        }
        if rainfall < 0.0 {
            return Err(invalid("Rainfall must be positive"));
        }

        Ok(SoilReadings {
            nitrogen,
            phosphorus,
            potassium,
            temperature,
            humidity,
            ph,
            rainfall,
        })
    }
}

/// Decision table over temperature, rainfall, pH, nutrient and humidity bands
pub fn recommend(readings: &SoilReadings) -> Crop {
    let r = readings;
    if r.temperature > 30.0 && r.rainfall < 200.0 {
        if (6.0..=8.0).contains(&r.ph) {
            Crop::Cotton
        } else {
            Crop::Millet
        }
    } else if (20.0..=30.0).contains(&r.temperature) && r.rainfall > 200.0 {
        if r.nitrogen > 40.0 && r.phosphorus > 40.0 {
            Crop::Rice
        } else {
            Crop::Maize
        }
    } else if r.temperature < 20.0 {
        if r.humidity > 70.0 {
            Crop::Wheat
        } else {
            Crop::Barley
        }
    } else if r.ph < 6.0 {
        Crop::Groundnut
    } else {
        Crop::Soybean
    }
}

pub fn predict(params: &CropParams) -> Result<Crop> {
    Ok(recommend(&params.validate()?))
}
