//! Coerced single-row feature frame.
//!
//! Mirrors the typed table the model was trained on: categorical columns
//! carry `category` dtype, the age column is `float32`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::trial::{Category, Feature, FeatureKind, FeatureValue, RecordError, TrialFeatureRecord};

/// Column dtype after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Category,
    Float32,
}

impl Dtype {
    #[must_use]
    pub fn of(feature: Feature) -> Self {
        match feature.kind() {
            FeatureKind::Categorical => Self::Category,
            FeatureKind::Numeric => Self::Float32,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => f.write_str("category"),
            Self::Float32 => f.write_str("float32"),
        }
    }
}

/// One coerced value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Category(Category),
    Float32(f32),
    Missing,
}

impl Cell {
    fn to_json(&self) -> Value {
        match self {
            Self::Category(c) => c.as_json().clone(),
            Self::Float32(v) => serde_json::Number::from_f64(f64::from(*v))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Missing => Value::Null,
        }
    }
}

/// Typed description of a coerced frame, returned by the debug endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    pub dtypes: BTreeMap<String, Dtype>,
    pub values: BTreeMap<String, Value>,
    pub shape: [usize; 2],
}

/// A single row with one cell per feature, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    cells: Vec<Cell>,
}

impl FeatureFrame {
    #[must_use]
    pub fn from_record(record: &TrialFeatureRecord) -> Self {
        let cells = Feature::ALL
            .into_iter()
            .map(|f| match record.get(f) {
                FeatureValue::Category(c) => Cell::Category(c.clone()),
                FeatureValue::Number(v) => Cell::Float32(v),
            })
            .collect();
        Self { cells }
    }

    /// Coerce a raw payload, leaving absent fields as [`Cell::Missing`].
    ///
    /// # Errors
    /// `RecordError::Invalid` when a present value cannot take its column's dtype.
    pub fn from_json(raw: &Value) -> Result<Self, RecordError> {
        let map = raw.as_object();
        let cells = Feature::ALL
            .into_iter()
            .map(|f| match map.and_then(|m| m.get(f.name())) {
                None | Some(Value::Null) => Ok(Cell::Missing),
                Some(value) => coerce_cell(f, value),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { cells })
    }

    #[must_use]
    pub fn get(&self, feature: Feature) -> &Cell {
        &self.cells[feature as usize]
    }

    /// `(rows, columns)`; always a single row.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (1, self.cells.len())
    }

    #[must_use]
    pub fn debug_report(&self) -> DebugReport {
        let mut dtypes = BTreeMap::new();
        let mut values = BTreeMap::new();
        for (feature, cell) in Feature::ALL.into_iter().zip(&self.cells) {
            dtypes.insert(feature.name().to_string(), Dtype::of(feature));
            values.insert(feature.name().to_string(), cell.to_json());
        }
        let (rows, cols) = self.shape();
        DebugReport {
            dtypes,
            values,
            shape: [rows, cols],
        }
    }
}

fn coerce_cell(feature: Feature, value: &Value) -> Result<Cell, RecordError> {
    match Dtype::of(feature) {
        Dtype::Category => Category::from_json(value)
            .map(Cell::Category)
            .map_err(|reason| RecordError::Invalid {
                feature,
                expected: "category",
                reason,
            }),
        Dtype::Float32 => to_float32(value)
            .map(Cell::Float32)
            .map_err(|reason| RecordError::Invalid {
                feature,
                expected: "float32",
                reason,
            }),
    }
}

fn to_float32(value: &Value) -> Result<f32, String> {
    let v = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("number {n} is not representable"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("could not convert string to float: '{s}'"))?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => return Err("value is null".to_string()),
        Value::Array(_) | Value::Object(_) => {
            return Err(format!("expected a number, got {value}"));
        }
    };

    let narrowed = v as f32;
    if !narrowed.is_finite() {
        return Err(format!("{v} is not a finite float32"));
    }
    Ok(narrowed)
}
