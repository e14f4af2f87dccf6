//! Domain layer: Core business types and logic.
//!
//! Pure types with no I/O. Validation is a function from raw JSON to either a
//! typed record or the list of offending fields.

mod frame;
mod prediction;
mod trial;

pub use frame::{Cell, DebugReport, Dtype, FeatureFrame};
pub use prediction::{round3, PredictionRecord, TARGET_NAMES};
pub use trial::{
    missing_features, Category, Domain, Feature, FeatureKind, FeatureValue, MissingFeatures,
    RecordError, TrialFeatureRecord, ALLOCATIONS, GENDERS, INTERVENTION_MODELS,
    INTERVENTION_TYPES, LEAD_SPONSOR_CLASSES, MASKINGS, MIN_AGE_RANGE, PRIMARY_PURPOSES,
    STUDY_TYPES,
};

#[cfg(test)]
pub(crate) use trial::tests::sample_payload;
