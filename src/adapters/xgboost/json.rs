//! XGBoost JSON model format (`Booster.save_model("*.json")`).
//!
//! Only the parts needed to evaluate tree ensembles are modeled. XGBoost
//! writes most scalar parameters as strings, so they go through
//! `DisplayFromStr` while still accepting plain numbers.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

/// `base_score` is written as `0.5`, `"5E-1"`, `"[5E-1]"` or
/// `"[1E-1,2E-1]"` depending on the XGBoost version and target count.
fn deserialize_base_scores<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    fn scalar(value: &Value) -> Option<f32> {
        match value {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        }
    }

    let value = Value::deserialize(deserializer)?;
    let items = match &value {
        Value::Array(items) => items.clone(),
        Value::String(s) if s.trim_start().starts_with('[') => {
            let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
            inner
                .split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .collect()
        }
        other => vec![other.clone()],
    };

    let scores = items
        .iter()
        .map(|item| {
            scalar(item).ok_or_else(|| D::Error::custom(format!("invalid base_score {item}")))
        })
        .collect::<Result<Vec<f32>, _>>()?;

    if scores.is_empty() {
        return Err(D::Error::custom("base_score is empty"));
    }
    Ok(scores)
}

/// `default_left` is `0`/`1` in JSON models and `true`/`false` in some exports.
fn deserialize_flags<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            other => Err(D::Error::custom(format!("invalid flag {other}"))),
        })
        .collect()
}

fn default_base_scores() -> Vec<f32> {
    vec![0.5]
}

fn default_one() -> i64 {
    1
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub num_nodes: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_one")]
    pub size_leaf_vector: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub tree_param: TreeParam,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    #[serde(deserialize_with = "deserialize_flags")]
    pub default_left: Vec<bool>,
    #[serde(default)]
    pub split_type: Vec<i32>,
    #[serde(default)]
    pub categories: Vec<i32>,
    #[serde(default)]
    pub categories_nodes: Vec<i32>,
    #[serde(default)]
    pub categories_segments: Vec<i64>,
    #[serde(default)]
    pub categories_sizes: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub tree_info: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbTree {
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Dart {
        gbtree: GbTree,
        #[serde(default)]
        weight_drop: Vec<f32>,
    },
    #[serde(other)]
    Other,
}

impl GradientBooster {
    /// Trees and their per-tree weights (all 1.0 outside DART).
    #[must_use]
    pub fn trees(&self) -> Option<(&ModelTrees, Vec<f32>)> {
        match self {
            Self::Gbtree { model } => Some((model, vec![1.0; model.trees.len()])),
            Self::Dart {
                gbtree,
                weight_drop,
            } => {
                let mut weights = weight_drop.clone();
                weights.resize(gbtree.model.trees.len(), 1.0);
                Some((&gbtree.model, weights))
            }
            Self::Other => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveRef {
    pub name: String,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_scores", default = "default_base_scores")]
    pub base_score: Vec<f32>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub num_feature: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default = "default_one")]
    pub num_target: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub num_class: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_types: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: ObjectiveRef,
    pub learner_model_param: LearnerModelParam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbModel {
    pub learner: Learner,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(base_score: Value) -> LearnerModelParam {
        serde_json::from_value(json!({
            "base_score": base_score,
            "num_feature": "10",
            "num_target": "1"
        }))
        .expect("Should parse learner params")
    }

    #[test]
    fn test_base_score_spellings() {
        assert_eq!(param(json!(0.25)).base_score, vec![0.25]);
        assert_eq!(param(json!("5E-1")).base_score, vec![0.5]);
        assert_eq!(param(json!("[5E-1]")).base_score, vec![0.5]);
        assert_eq!(param(json!([1.5])).base_score, vec![1.5]);
        assert_eq!(
            param(json!("[1E-1,2E-1,3E-1]")).base_score,
            vec![0.1, 0.2, 0.3]
        );
    }

    #[test]
    fn test_base_score_rejects_garbage() {
        let result: Result<LearnerModelParam, _> =
            serde_json::from_value(json!({ "base_score": "abc" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_params_accept_numbers_and_strings() {
        let p: LearnerModelParam =
            serde_json::from_value(json!({ "base_score": 0.5, "num_feature": 10, "num_target": "3" }))
                .expect("Should parse");
        assert_eq!(p.num_feature, 10);
        assert_eq!(p.num_target, 3);
    }

    #[test]
    fn test_unknown_booster_is_other() {
        let booster: GradientBooster =
            serde_json::from_value(json!({ "name": "gblinear", "model": { "weights": [0.0] } }))
                .expect("Should parse");
        assert!(matches!(booster, GradientBooster::Other));
        assert!(booster.trees().is_none());
    }

    #[test]
    fn test_dart_weights_pad_to_tree_count() {
        let tree = json!({
            "tree_param": { "num_nodes": "1" },
            "left_children": [-1],
            "right_children": [-1],
            "split_indices": [0],
            "split_conditions": [0.5],
            "default_left": [0]
        });
        let booster: GradientBooster = serde_json::from_value(json!({
            "name": "dart",
            "gbtree": { "name": "gbtree", "model": { "trees": [tree.clone(), tree], "tree_info": [0, 0] } },
            "weight_drop": [0.5]
        }))
        .expect("Should parse");

        let (model, weights) = booster.trees().expect("Tree booster");
        assert_eq!(model.trees.len(), 2);
        assert_eq!(weights, vec![0.5, 1.0]);
    }

    #[test]
    fn test_default_left_accepts_bools_and_ints() {
        let tree: Tree = serde_json::from_value(json!({
            "tree_param": { "num_nodes": "3" },
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [0, 0, 0],
            "split_conditions": [1.0, 0.1, 0.2],
            "default_left": [true, 0, 1]
        }))
        .expect("Should parse");
        assert_eq!(tree.default_left, vec![true, false, true]);
        assert!(tree.split_type.is_empty());
    }
}
