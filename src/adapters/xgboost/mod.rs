//! XGBoost adapter: Implementation of Regressor over XGBoost JSON models.
//!
//! A model directory holds one XGBoost model per target plus a
//! `manifest.json` that binds them together:
//!
//! ```text
//! <model_dir>/
//!   manifest.json
//!   rate_deaths_calc.json
//!   rate_serious_aes_calc.json
//!   rate_other_aes_calc.json
//! ```
//!
//! The manifest fixes the column order, the training-time category
//! vocabulary of every categorical column (a value's code is its position)
//! and optionally a SHA-256 digest per model file.
//!
//! Category values that were never seen in training are fed to the trees as
//! missing and follow each split's default branch.

mod json;
mod tree;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::{Category, Cell, Feature, FeatureFrame, FeatureKind, TARGET_NAMES};
use crate::ports::{ModelError, Regressor};

pub use json::XgbModel;
pub use tree::{RegressionTree, TreeError};

/// Name of the manifest inside a model directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    format_version: u32,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    categories: BTreeMap<String, Vec<Value>>,
    targets: Vec<TargetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TargetEntry {
    name: String,
    file: String,
    #[serde(default)]
    output: usize,
    #[serde(default)]
    sha256: Option<String>,
}

/// Output transform applied to the summed margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Identity,
    Sigmoid,
    Exp,
}

impl Link {
    /// Link for a regression objective, `None` if unsupported.
    #[must_use]
    pub fn for_objective(objective: &str) -> Option<Self> {
        match objective {
            "reg:squarederror" | "reg:linear" | "reg:pseudohubererror" | "reg:absoluteerror"
            | "reg:quantileerror" => Some(Self::Identity),
            "reg:logistic" | "binary:logistic" => Some(Self::Sigmoid),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Some(Self::Exp),
            _ => None,
        }
    }

    /// Move a `base_score` from output space into margin space.
    fn to_margin(self, base_score: f32) -> f32 {
        match self {
            Self::Identity => base_score,
            Self::Sigmoid => {
                let p = base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            Self::Exp => base_score.max(1e-7).ln(),
        }
    }

    fn apply(self, margin: f32) -> f32 {
        match self {
            Self::Identity => margin,
            Self::Sigmoid => 1.0 / (1.0 + (-margin).exp()),
            Self::Exp => margin.exp(),
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    feature: Feature,
    /// Category label to code; `None` for numeric columns.
    codes: Option<HashMap<String, u32>>,
}

#[derive(Debug, Clone)]
struct Head {
    name: &'static str,
    trees: Vec<RegressionTree>,
    weights: Vec<f32>,
    base_margin: f32,
    link: Link,
}

impl Head {
    fn predict(&self, row: &[f32]) -> f32 {
        let margin = self
            .trees
            .iter()
            .zip(&self.weights)
            .fold(self.base_margin, |acc, (tree, w)| acc + w * tree.evaluate(row));
        self.link.apply(margin)
    }
}

/// Three independent XGBoost regressors sharing one feature layout.
#[derive(Debug, Clone)]
pub struct XgbMultiOutputModel {
    columns: Vec<Column>,
    heads: Vec<Head>,
}

impl XgbMultiOutputModel {
    /// Load and validate a model directory.
    ///
    /// # Errors
    /// Returns `ModelError` if the manifest or any model file is missing,
    /// corrupt, fails its digest check or uses an unsupported booster.
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest_bytes = read(&manifest_path)?;
        let manifest: Manifest =
            serde_json::from_slice(&manifest_bytes).map_err(|e| ModelError::Format {
                path: manifest_path.display().to_string(),
                reason: e.to_string(),
            })?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(ModelError::Unsupported(format!(
                "manifest format_version {}",
                manifest.format_version
            )));
        }

        let mut models = Vec::with_capacity(TARGET_NAMES.len());
        for name in TARGET_NAMES {
            let entry = manifest
                .targets
                .iter()
                .find(|t| t.name == name)
                .ok_or_else(|| ModelError::Format {
                    path: manifest_path.display().to_string(),
                    reason: format!("no target entry for {name}"),
                })?;
            models.push((name, entry, load_booster(dir, entry)?));
        }

        let column_names = match &manifest.features {
            Some(features) => features.clone(),
            None => models
                .iter()
                .map(|(_, _, m)| &m.learner.feature_names)
                .find(|names| !names.is_empty())
                .cloned()
                .unwrap_or_else(|| Feature::ALL.iter().map(|f| f.name().to_string()).collect()),
        };
        let columns = build_columns(&column_names, &manifest.categories, &manifest_path)?;

        let heads = models
            .iter()
            .map(|&(name, entry, ref model)| build_head(name, entry, model, &column_names))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            model_dir = %dir.display(),
            columns = columns.len(),
            trees = heads.iter().map(|h| h.trees.len()).sum::<usize>(),
            "Model loaded"
        );

        Ok(Self { columns, heads })
    }

    /// Dense row in column order; unknown categories and missing cells are `NaN`.
    fn encode(&self, frame: &FeatureFrame) -> Vec<f32> {
        self.columns
            .iter()
            .map(|column| match (frame.get(column.feature), &column.codes) {
                (Cell::Float32(v), None) => *v,
                (Cell::Category(value), Some(codes)) => encode_category(column, codes, value),
                _ => f32::NAN,
            })
            .collect()
    }
}

impl Regressor for XgbMultiOutputModel {
    fn output_names(&self) -> &[&'static str] {
        &TARGET_NAMES
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f32>, ModelError> {
        let row = self.encode(frame);
        let outputs: Vec<f32> = self.heads.iter().map(|h| h.predict(&row)).collect();

        if let Some((head, value)) = self
            .heads
            .iter()
            .zip(&outputs)
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ModelError::Inference(format!(
                "{} produced a non-finite value ({value})",
                head.name
            )));
        }
        Ok(outputs)
    }
}

/// Recompute the SHA-256 of every target file and store it in the manifest.
///
/// Other manifest fields are preserved. Returns the digests by file name.
///
/// # Errors
/// Returns `ModelError` if the manifest or a target file cannot be read or
/// the manifest cannot be written back.
pub fn stamp_manifest(dir: &Path) -> Result<BTreeMap<String, String>, ModelError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let format_error = |reason: String| ModelError::Format {
        path: manifest_path.display().to_string(),
        reason,
    };

    let mut manifest: Value = serde_json::from_slice(&read(&manifest_path)?)
        .map_err(|e| format_error(e.to_string()))?;
    let targets = manifest
        .get_mut("targets")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| format_error("targets must be an array".to_string()))?;

    let mut digests = BTreeMap::new();
    for target in targets.iter_mut() {
        let file = target
            .get("file")
            .and_then(Value::as_str)
            .ok_or_else(|| format_error("target without file".to_string()))?
            .to_string();
        let digest = sha256_hex(&read(&dir.join(&file))?);
        target["sha256"] = Value::String(digest.clone());
        digests.insert(file, digest);
    }

    let bytes = serde_json::to_vec_pretty(&manifest).map_err(|e| format_error(e.to_string()))?;
    fs::write(&manifest_path, bytes).map_err(|source| ModelError::Io {
        path: manifest_path.display().to_string(),
        source,
    })?;
    Ok(digests)
}

fn encode_category(column: &Column, codes: &HashMap<String, u32>, value: &Category) -> f32 {
    let label = value.label();
    match codes.get(&label) {
        Some(&code) => code as f32,
        None => {
            tracing::warn!(
                feature = column.feature.name(),
                value = %label,
                "Unknown category, treating as missing"
            );
            f32::NAN
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ModelError> {
    fs::read(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn load_booster(dir: &Path, entry: &TargetEntry) -> Result<XgbModel, ModelError> {
    let path = dir.join(&entry.file);
    let bytes = read(&path)?;

    if let Some(expected) = &entry.sha256 {
        if !sha256_hex(&bytes).eq_ignore_ascii_case(expected.trim()) {
            return Err(ModelError::DigestMismatch(entry.file.clone()));
        }
    }

    serde_json::from_slice(&bytes).map_err(|e| ModelError::Format {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn build_columns(
    names: &[String],
    categories: &BTreeMap<String, Vec<Value>>,
    manifest_path: &Path,
) -> Result<Vec<Column>, ModelError> {
    let format_error = |reason: String| ModelError::Format {
        path: manifest_path.display().to_string(),
        reason,
    };

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let feature =
            Feature::from_name(name).ok_or_else(|| format_error(format!("unknown feature {name}")))?;
        if columns.iter().any(|c: &Column| c.feature == feature) {
            return Err(format_error(format!("duplicate feature {name}")));
        }

        let codes = match feature.kind() {
            FeatureKind::Numeric => None,
            FeatureKind::Categorical => {
                let labels = categories
                    .get(name)
                    .ok_or_else(|| format_error(format!("no categories listed for {name}")))?;
                let mut codes = HashMap::with_capacity(labels.len());
                for (code, raw) in labels.iter().enumerate() {
                    let label = Category::from_json(raw)
                        .map_err(|e| format_error(format!("category of {name}: {e}")))?
                        .label();
                    codes.entry(label).or_insert(code as u32);
                }
                Some(codes)
            }
        };
        columns.push(Column { feature, codes });
    }
    Ok(columns)
}

/// A booster's `feature_types` (`"c"` for categorical, `"float"`, `"int"`,
/// `"i"` or `"q"` for numeric) must agree with each column's kind.
fn check_feature_types(
    entry: &TargetEntry,
    feature_types: &[String],
    columns: &[String],
) -> Result<(), ModelError> {
    if feature_types.is_empty() {
        return Ok(());
    }
    let malformed = |reason: String| ModelError::Format {
        path: entry.file.clone(),
        reason,
    };
    if feature_types.len() != columns.len() {
        return Err(malformed(format!(
            "model lists {} feature_types for {} columns",
            feature_types.len(),
            columns.len()
        )));
    }

    for (name, ty) in columns.iter().zip(feature_types) {
        let Some(feature) = Feature::from_name(name) else {
            continue;
        };
        let declared = match ty.as_str() {
            "c" => FeatureKind::Categorical,
            "float" | "int" | "i" | "q" => FeatureKind::Numeric,
            other => return Err(malformed(format!("unknown feature type '{other}' for {name}"))),
        };
        if declared != feature.kind() {
            return Err(malformed(format!(
                "feature_types marks {name} as '{ty}', expected {}",
                match feature.kind() {
                    FeatureKind::Categorical => "categorical",
                    FeatureKind::Numeric => "numeric",
                }
            )));
        }
    }
    Ok(())
}

fn build_head(
    name: &'static str,
    entry: &TargetEntry,
    model: &XgbModel,
    columns: &[String],
) -> Result<Head, ModelError> {
    let learner = &model.learner;
    let param = &learner.learner_model_param;
    let unsupported = |what: String| ModelError::Unsupported(format!("{}: {what}", entry.file));

    let link = Link::for_objective(&learner.objective.name)
        .ok_or_else(|| unsupported(format!("objective {}", learner.objective.name)))?;

    if param.num_class > 1 {
        return Err(unsupported(format!("{} classes", param.num_class)));
    }
    let outputs = usize::try_from(param.num_target.max(1)).unwrap_or(1);
    if entry.output >= outputs {
        return Err(unsupported(format!(
            "output {} of a {outputs}-target model",
            entry.output
        )));
    }
    if !learner.feature_names.is_empty() && learner.feature_names != columns {
        return Err(ModelError::Format {
            path: entry.file.clone(),
            reason: "feature_names do not match the manifest column order".to_string(),
        });
    }
    check_feature_types(entry, &learner.feature_types, columns)?;
    if param.num_feature > 0 && usize::try_from(param.num_feature).ok() != Some(columns.len()) {
        return Err(ModelError::Format {
            path: entry.file.clone(),
            reason: format!(
                "model has {} features, manifest lists {}",
                param.num_feature,
                columns.len()
            ),
        });
    }

    let (trees, weights) = learner
        .gradient_booster
        .trees()
        .ok_or_else(|| unsupported("only gbtree and dart boosters are supported".to_string()))?;

    let mut compiled = Vec::new();
    let mut kept_weights = Vec::new();
    for (index, (tree, weight)) in trees.trees.iter().zip(weights).enumerate() {
        let group = trees.tree_info.get(index).copied().unwrap_or(0);
        if usize::try_from(group).ok() != Some(entry.output) {
            continue;
        }
        let tree = RegressionTree::compile(tree, index, columns.len()).map_err(|e| {
            ModelError::Format {
                path: entry.file.clone(),
                reason: e.to_string(),
            }
        })?;
        compiled.push(tree);
        kept_weights.push(weight);
    }

    let base_score = param
        .base_score
        .get(entry.output)
        .or_else(|| param.base_score.first())
        .copied()
        .unwrap_or(0.5);

    tracing::debug!(
        target_name = name,
        objective = %learner.objective.name,
        trees = compiled.len(),
        base_score,
        "Compiled target"
    );

    Ok(Head {
        name,
        trees: compiled,
        weights: kept_weights,
        base_margin: link.to_margin(base_score),
        link,
    })
}
