//! Trial feature record: the ten design characteristics of a clinical trial
//! used as model input.
//!
//! Field names and enumerations match the columns the model was trained on
//! (ClinicalTrials.gov derived dataset).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::{Cell, FeatureFrame};

pub const STUDY_TYPES: [&str; 2] = ["INTERVENTIONAL", "OBSERVATIONAL"];

pub const ALLOCATIONS: [&str; 3] = ["RANDOMIZED", "NON_RANDOMIZED", "UNKNOWN"];

pub const INTERVENTION_MODELS: [&str; 6] = [
    "PARALLEL",
    "SINGLE_GROUP",
    "SEQUENTIAL",
    "CROSSOVER",
    "FACTORIAL",
    "UNKNOWN",
];

pub const MASKINGS: [&str; 5] = ["NONE", "SINGLE", "DOUBLE", "TRIPLE", "QUADRUPLE"];

pub const PRIMARY_PURPOSES: [&str; 9] = [
    "TREATMENT",
    "PREVENTION",
    "HEALTH_SERVICES_RESEARCH",
    "OTHER",
    "SUPPORTIVE_CARE",
    "DIAGNOSTIC",
    "UNKNOWN",
    "BASIC_SCIENCE",
    "SCREENING",
];

pub const GENDERS: [&str; 3] = ["ALL", "MALE", "FEMALE"];

pub const LEAD_SPONSOR_CLASSES: [&str; 5] = ["INDUSTRY", "NIH", "OTHER", "FED", "NETWORK"];

pub const INTERVENTION_TYPES: [&str; 9] = [
    "DRUG",
    "BEHAVIORAL",
    "DEVICE",
    "OTHER",
    "BIOLOGICAL",
    "RADIATION",
    "PROCEDURE",
    "DIAGNOSTIC_TEST",
    "DIETARY_SUPPLEMENT",
];

/// Bounds of the minimum participant age, in years.
pub const MIN_AGE_RANGE: (f32, f32) = (0.0, 100.0);

/// Whether a feature is fed to the model as a category or a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Categorical,
    Numeric,
}

/// Value domain of a feature, as constrained by the client form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Choices(&'static [&'static str]),
    Flag,
    Range { min: f32, max: f32 },
}

/// The ten input fields, in model column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    StudyType,
    Allocation,
    InterventionModel,
    Masking,
    PrimaryPurpose,
    MinAge,
    Gender,
    HealthyVolunteers,
    LeadSponsorClass,
    InterventionTypes,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::StudyType,
        Feature::Allocation,
        Feature::InterventionModel,
        Feature::Masking,
        Feature::PrimaryPurpose,
        Feature::MinAge,
        Feature::Gender,
        Feature::HealthyVolunteers,
        Feature::LeadSponsorClass,
        Feature::InterventionTypes,
    ];

    /// Wire name of the field (JSON key and model column name).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::StudyType => "study_type_trials",
            Self::Allocation => "allocation_trials",
            Self::InterventionModel => "intervention_model_trials",
            Self::Masking => "masking_trials",
            Self::PrimaryPurpose => "primary_purpose_trials",
            Self::MinAge => "min_age_yr_calc",
            Self::Gender => "gender_trials",
            Self::HealthyVolunteers => "healthy_volunteers_trials",
            Self::LeadSponsorClass => "lead_sponsor_class_trials",
            Self::InterventionTypes => "intervention_types_trials",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    #[must_use]
    pub fn kind(self) -> FeatureKind {
        match self {
            Self::MinAge => FeatureKind::Numeric,
            _ => FeatureKind::Categorical,
        }
    }

    /// Human-readable label for the client form.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::StudyType => "Study Type",
            Self::Allocation => "Allocation Method",
            Self::InterventionModel => "Intervention Model",
            Self::Masking => "Masking/Blinding",
            Self::PrimaryPurpose => "Primary Purpose",
            Self::MinAge => "Minimum Age (years)",
            Self::Gender => "Gender",
            Self::HealthyVolunteers => "Healthy Volunteers",
            Self::LeadSponsorClass => "Lead Sponsor Class",
            Self::InterventionTypes => "Intervention Types",
        }
    }

    #[must_use]
    pub fn help(self) -> &'static str {
        match self {
            Self::StudyType => "Type of clinical study design",
            Self::Allocation => "Method of participant allocation",
            Self::InterventionModel => "Type of intervention model used",
            Self::Masking => "Level of masking in the trial",
            Self::PrimaryPurpose => "Main purpose of the clinical trial",
            Self::MinAge => "Minimum age of participants in years",
            Self::Gender => "Gender eligibility for the trial",
            Self::HealthyVolunteers => "Whether healthy volunteers are included",
            Self::LeadSponsorClass => "Classification of the lead sponsor",
            Self::InterventionTypes => "Types of interventions used",
        }
    }

    #[must_use]
    pub fn domain(self) -> Domain {
        match self {
            Self::StudyType => Domain::Choices(&STUDY_TYPES),
            Self::Allocation => Domain::Choices(&ALLOCATIONS),
            Self::InterventionModel => Domain::Choices(&INTERVENTION_MODELS),
            Self::Masking => Domain::Choices(&MASKINGS),
            Self::PrimaryPurpose => Domain::Choices(&PRIMARY_PURPOSES),
            Self::MinAge => Domain::Range {
                min: MIN_AGE_RANGE.0,
                max: MIN_AGE_RANGE.1,
            },
            Self::Gender => Domain::Choices(&GENDERS),
            Self::HealthyVolunteers => Domain::Flag,
            Self::LeadSponsorClass => Domain::Choices(&LEAD_SPONSOR_CLASSES),
            Self::InterventionTypes => Domain::Choices(&INTERVENTION_TYPES),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A categorical value, kept in the JSON form it arrived in.
///
/// Strings, booleans and numbers are accepted. The canonical `label()` is what
/// the model vocabulary is keyed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Value);

impl Category {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self(Value::String(value.into()))
    }

    #[must_use]
    pub fn flag(value: bool) -> Self {
        Self(Value::Bool(value))
    }

    /// Accept a JSON scalar as a category.
    ///
    /// # Errors
    /// Returns a reason when the value is null, an array or an object.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(_) | Value::Bool(_) | Value::Number(_) => Ok(Self(value.clone())),
            Value::Null => Err("value is null".to_string()),
            Value::Array(_) => Err("arrays are not valid categories".to_string()),
            Value::Object(_) => Err("objects are not valid categories".to_string()),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Names of the fields a request left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFeatures(pub Vec<Feature>);

impl MissingFeatures {
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|f| f.name()).collect()
    }
}

impl fmt::Display for MissingFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.0.iter().map(|feat| format!("'{}'", feat.name())).collect();
        write!(f, "Missing features: [{}]", quoted.join(", "))
    }
}

/// Why a raw JSON payload could not become a [`TrialFeatureRecord`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("{0}")]
    Missing(MissingFeatures),

    #[error("Cannot convert '{feature}' to {expected}: {reason}")]
    Invalid {
        feature: Feature,
        expected: &'static str,
        reason: String,
    },
}

/// List the fields that are absent or null in `raw`, in column order.
///
/// Anything other than a JSON object has every field missing.
#[must_use]
pub fn missing_features(raw: &Value) -> Vec<Feature> {
    let Some(map) = raw.as_object() else {
        return Feature::ALL.to_vec();
    };

    Feature::ALL
        .into_iter()
        .filter(|f| map.get(f.name()).map_or(true, Value::is_null))
        .collect()
}

/// A complete, typed trial feature record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFeatureRecord {
    pub study_type_trials: Category,
    pub allocation_trials: Category,
    pub intervention_model_trials: Category,
    pub masking_trials: Category,
    pub primary_purpose_trials: Category,
    pub min_age_yr_calc: f32,
    pub gender_trials: Category,
    pub healthy_volunteers_trials: Category,
    pub lead_sponsor_class_trials: Category,
    pub intervention_types_trials: Category,
}

/// Borrowed view of one field of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Category(&'a Category),
    Number(f32),
}

impl TrialFeatureRecord {
    /// Validate a raw JSON payload into a typed record.
    ///
    /// Presence is checked first so that every missing field is reported at
    /// once; categorical values are not checked against their enumerations.
    ///
    /// # Errors
    /// `RecordError::Missing` when any field is absent or null,
    /// `RecordError::Invalid` when a value cannot be coerced.
    pub fn from_json(raw: &Value) -> Result<Self, RecordError> {
        let missing = missing_features(raw);
        if !missing.is_empty() {
            return Err(RecordError::Missing(MissingFeatures(missing)));
        }

        let frame = FeatureFrame::from_json(raw)?;
        Self::from_frame(&frame)
    }

    fn from_frame(frame: &FeatureFrame) -> Result<Self, RecordError> {
        let category = |feature: Feature| match frame.get(feature) {
            Cell::Category(c) => Ok(c.clone()),
            other => Err(RecordError::Invalid {
                feature,
                expected: "category",
                reason: format!("unexpected cell {other:?}"),
            }),
        };

        let min_age_yr_calc = match frame.get(Feature::MinAge) {
            Cell::Float32(v) => *v,
            other => {
                return Err(RecordError::Invalid {
                    feature: Feature::MinAge,
                    expected: "float32",
                    reason: format!("unexpected cell {other:?}"),
                })
            }
        };

        Ok(Self {
            study_type_trials: category(Feature::StudyType)?,
            allocation_trials: category(Feature::Allocation)?,
            intervention_model_trials: category(Feature::InterventionModel)?,
            masking_trials: category(Feature::Masking)?,
            primary_purpose_trials: category(Feature::PrimaryPurpose)?,
            min_age_yr_calc,
            gender_trials: category(Feature::Gender)?,
            healthy_volunteers_trials: category(Feature::HealthyVolunteers)?,
            lead_sponsor_class_trials: category(Feature::LeadSponsorClass)?,
            intervention_types_trials: category(Feature::InterventionTypes)?,
        })
    }

    #[must_use]
    pub fn get(&self, feature: Feature) -> FeatureValue<'_> {
        match feature {
            Feature::StudyType => FeatureValue::Category(&self.study_type_trials),
            Feature::Allocation => FeatureValue::Category(&self.allocation_trials),
            Feature::InterventionModel => FeatureValue::Category(&self.intervention_model_trials),
            Feature::Masking => FeatureValue::Category(&self.masking_trials),
            Feature::PrimaryPurpose => FeatureValue::Category(&self.primary_purpose_trials),
            Feature::MinAge => FeatureValue::Number(self.min_age_yr_calc),
            Feature::Gender => FeatureValue::Category(&self.gender_trials),
            Feature::HealthyVolunteers => FeatureValue::Category(&self.healthy_volunteers_trials),
            Feature::LeadSponsorClass => FeatureValue::Category(&self.lead_sponsor_class_trials),
            Feature::InterventionTypes => FeatureValue::Category(&self.intervention_types_trials),
        }
    }
}
