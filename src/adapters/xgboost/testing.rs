//! Small on-disk model directory for tests.
//!
//! Predictions for the sample record (DOUBLE masking, age 18, healthy
//! volunteers `false`) are 0.022, 0.25 and 0.8.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use super::{sha256_hex, MANIFEST_FILE};
use crate::domain::{
    Feature, ALLOCATIONS, GENDERS, INTERVENTION_MODELS, INTERVENTION_TYPES, LEAD_SPONSOR_CLASSES,
    MASKINGS, PRIMARY_PURPOSES, STUDY_TYPES,
};

fn sorted(values: &[&str]) -> Value {
    let mut v: Vec<&str> = values.to_vec();
    v.sort_unstable();
    json!(v)
}

fn stump(feature: Feature, split: Value, leaves: (f32, f32)) -> Value {
    let categorical = !split.is_number();
    let threshold = if categorical { json!(0.0) } else { split.clone() };
    let mut tree = json!({
        "base_weights": [0.0, leaves.0, leaves.1],
        "default_left": [1, 0, 0],
        "id": 0,
        "left_children": [1, -1, -1],
        "loss_changes": [1.0, 0.0, 0.0],
        "parents": [2147483647, 0, 0],
        "right_children": [2, -1, -1],
        "split_conditions": [threshold, leaves.0, leaves.1],
        "split_indices": [feature as usize, 0, 0],
        "split_type": [i32::from(categorical), 0, 0],
        "sum_hessian": [10.0, 5.0, 5.0],
        "tree_param": {
            "num_deleted": "0",
            "num_feature": "10",
            "num_nodes": "3",
            "size_leaf_vector": "1"
        },
        "categories": [],
        "categories_nodes": [],
        "categories_segments": [],
        "categories_sizes": []
    });
    if let Value::Array(codes) = split {
        tree["categories_sizes"] = json!([codes.len()]);
        tree["categories"] = Value::Array(codes);
        tree["categories_nodes"] = json!([0]);
        tree["categories_segments"] = json!([0]);
    }
    tree
}

fn booster(tree: Value, base_score: Value) -> Value {
    let names: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
    let types: Vec<&str> = Feature::ALL
        .iter()
        .map(|f| if *f == Feature::MinAge { "float" } else { "c" })
        .collect();
    json!({
        "learner": {
            "attributes": {},
            "feature_names": names,
            "feature_types": types,
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": { "num_parallel_tree": "1", "num_trees": "1" },
                    "iteration_indptr": [0, 1],
                    "tree_info": [0],
                    "trees": [tree]
                }
            },
            "learner_model_param": {
                "base_score": base_score,
                "boost_from_average": "1",
                "num_class": "0",
                "num_feature": "10",
                "num_target": "1"
            },
            "objective": {
                "name": "reg:squarederror",
                "reg_loss_param": { "scale_pos_weight": "1" }
            }
        },
        "version": [2, 0, 3]
    })
}

/// Write the three fixture boosters and a manifest with digests.
pub(crate) fn write_fixture_model(dir: &Path) -> std::io::Result<()> {
    let deaths = booster(stump(Feature::MinAge, json!(50.0), (0.012, 0.034)), json!("1E-2"));
    // "DOUBLE" is code 0 in the sorted masking vocabulary.
    let serious = booster(stump(Feature::Masking, json!([0]), (0.1, 0.2)), json!(0.05));
    // `true` is code 1 in [false, true].
    let other = booster(
        stump(Feature::HealthyVolunteers, json!([1]), (0.3, 0.4)),
        json!("[5E-1]"),
    );

    fs::create_dir_all(dir)?;
    for (file, model) in [
        ("rate_deaths_calc.json", deaths),
        ("rate_serious_aes_calc.json", serious),
        ("rate_other_aes_calc.json", other),
    ] {
        fs::write(dir.join(file), serde_json::to_vec_pretty(&model)?)?;
    }
    write_manifest(dir, &fixture_manifest(dir));
    Ok(())
}

/// Manifest for the files currently in `dir`.
pub(crate) fn fixture_manifest(dir: &Path) -> Value {
    let digest = |file: &str| {
        fs::read(dir.join(file))
            .map(|bytes| sha256_hex(&bytes))
            .unwrap_or_default()
    };
    json!({
        "format_version": 1,
        "features": Feature::ALL.iter().map(|f| f.name()).collect::<Vec<_>>(),
        "categories": {
            "study_type_trials": sorted(&STUDY_TYPES),
            "allocation_trials": sorted(&ALLOCATIONS),
            "intervention_model_trials": sorted(&INTERVENTION_MODELS),
            "masking_trials": sorted(&MASKINGS),
            "primary_purpose_trials": sorted(&PRIMARY_PURPOSES),
            "gender_trials": sorted(&GENDERS),
            "healthy_volunteers_trials": [false, true],
            "lead_sponsor_class_trials": sorted(&LEAD_SPONSOR_CLASSES),
            "intervention_types_trials": sorted(&INTERVENTION_TYPES)
        },
        "targets": [
            { "name": "rate_deaths_calc", "file": "rate_deaths_calc.json", "sha256": digest("rate_deaths_calc.json") },
            { "name": "rate_serious_aes_calc", "file": "rate_serious_aes_calc.json", "sha256": digest("rate_serious_aes_calc.json") },
            { "name": "rate_other_aes_calc", "file": "rate_other_aes_calc.json", "output": 0, "sha256": digest("rate_other_aes_calc.json") }
        ]
    })
}

pub(crate) fn write_manifest(dir: &Path, manifest: &Value) {
    let bytes = serde_json::to_vec_pretty(manifest).expect("Manifest should serialize");
    fs::write(dir.join(MANIFEST_FILE), bytes).expect("Failed to write manifest");
}
