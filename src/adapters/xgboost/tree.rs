//! Compiled regression trees.

use super::json::Tree as XgbTree;

/// Errors raised while compiling a tree; wrapped into `ModelError` by the loader.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree {0} has no nodes")]
    Empty(usize),

    #[error("tree {tree} array {array} has {actual} entries, expected {expected}")]
    Length {
        tree: usize,
        array: &'static str,
        actual: usize,
        expected: usize,
    },

    #[error("tree {tree}: node {node} references invalid child {child}")]
    InvalidChild { tree: usize, node: usize, child: i32 },

    #[error("tree {tree}: node {node} splits on feature {feature}, model has {columns} columns")]
    InvalidFeature {
        tree: usize,
        node: usize,
        feature: i32,
        columns: usize,
    },

    #[error("tree {tree}: malformed category segment for node {node}")]
    InvalidCategories { tree: usize, node: usize },

    #[error("tree {0} uses vector leaves, which are not supported")]
    VectorLeaf(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f32),
    Numeric {
        feature: usize,
        threshold: f32,
        default_left: bool,
        left: usize,
        right: usize,
    },
    Categorical {
        feature: usize,
        /// Bit `c` set when category code `c` goes right.
        right_set: Vec<u32>,
        default_left: bool,
        left: usize,
        right: usize,
    },
}

/// A single tree, evaluated against one dense row.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Compile an XGBoost tree.
    ///
    /// Children must have a larger index than their parent, so evaluation
    /// always terminates.
    pub fn compile(tree: &XgbTree, index: usize, columns: usize) -> Result<Self, TreeError> {
        if tree.tree_param.size_leaf_vector > 1 {
            return Err(TreeError::VectorLeaf(index));
        }

        let len = usize::try_from(tree.tree_param.num_nodes).unwrap_or(0);
        if len == 0 {
            return Err(TreeError::Empty(index));
        }

        let check = |array: &'static str, actual: usize| {
            if actual == len {
                Ok(())
            } else {
                Err(TreeError::Length {
                    tree: index,
                    array,
                    actual,
                    expected: len,
                })
            }
        };
        check("left_children", tree.left_children.len())?;
        check("right_children", tree.right_children.len())?;
        check("split_indices", tree.split_indices.len())?;
        check("split_conditions", tree.split_conditions.len())?;
        check("default_left", tree.default_left.len())?;

        let mut nodes = Vec::with_capacity(len);
        for node in 0..len {
            let left = tree.left_children[node];
            if left == -1 {
                nodes.push(Node::Leaf(tree.split_conditions[node]));
                continue;
            }

            let child = |raw: i32| -> Result<usize, TreeError> {
                usize::try_from(raw)
                    .ok()
                    .filter(|&c| c > node && c < len)
                    .ok_or(TreeError::InvalidChild {
                        tree: index,
                        node,
                        child: raw,
                    })
            };
            let left = child(left)?;
            let right = child(tree.right_children[node])?;

            let raw_feature = tree.split_indices[node];
            let feature = usize::try_from(raw_feature)
                .ok()
                .filter(|&f| f < columns)
                .ok_or(TreeError::InvalidFeature {
                    tree: index,
                    node,
                    feature: raw_feature,
                    columns,
                })?;
            let default_left = tree.default_left[node];

            if tree.split_type.get(node).copied().unwrap_or(0) == 1 {
                nodes.push(Node::Categorical {
                    feature,
                    right_set: category_bitset(tree, index, node)?,
                    default_left,
                    left,
                    right,
                });
            } else {
                nodes.push(Node::Numeric {
                    feature,
                    threshold: tree.split_conditions[node],
                    default_left,
                    left,
                    right,
                });
            }
        }

        Ok(Self { nodes })
    }

    /// Leaf value reached by `row`; `NaN` cells are missing values.
    #[must_use]
    pub fn evaluate(&self, row: &[f32]) -> f32 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf(value) => return *value,
                Node::Numeric {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let x = row[*feature];
                    let go_left = if x.is_nan() { *default_left } else { x < *threshold };
                    at = if go_left { *left } else { *right };
                }
                Node::Categorical {
                    feature,
                    right_set,
                    default_left,
                    left,
                    right,
                } => {
                    let x = row[*feature];
                    let go_left = if x.is_nan() {
                        *default_left
                    } else {
                        !contains(right_set, x)
                    };
                    at = if go_left { *left } else { *right };
                }
            }
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn category_bitset(tree: &XgbTree, index: usize, node: usize) -> Result<Vec<u32>, TreeError> {
    let malformed = TreeError::InvalidCategories { tree: index, node };

    let Some(slot) = tree
        .categories_nodes
        .iter()
        .position(|&n| usize::try_from(n).ok() == Some(node))
    else {
        // A categorical split with no listed categories sends everything left.
        return Ok(Vec::new());
    };

    let start = tree
        .categories_segments
        .get(slot)
        .and_then(|&s| usize::try_from(s).ok())
        .ok_or_else(|| malformed.clone())?;
    let size = tree
        .categories_sizes
        .get(slot)
        .and_then(|&s| usize::try_from(s).ok())
        .ok_or_else(|| malformed.clone())?;
    let codes = tree
        .categories
        .get(start..start + size)
        .ok_or_else(|| malformed.clone())?;

    let mut bits: Vec<u32> = Vec::new();
    for &code in codes {
        let code = u32::try_from(code).map_err(|_| malformed.clone())?;
        let word = (code / 32) as usize;
        if bits.len() <= word {
            bits.resize(word + 1, 0);
        }
        bits[word] |= 1 << (code % 32);
    }
    Ok(bits)
}

fn contains(bits: &[u32], value: f32) -> bool {
    if value < 0.0 || value.fract() != 0.0 {
        return false;
    }
    let code = value as u64;
    let word = (code / 32) as usize;
    bits.get(word).is_some_and(|w| w & (1 << (code % 32)) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> XgbTree {
        serde_json::from_value(value).expect("Should parse tree")
    }

    fn numeric_stump() -> XgbTree {
        parse(json!({
            "tree_param": { "num_nodes": "3", "size_leaf_vector": "1" },
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [0, 0, 0],
            "split_conditions": [50.0, 0.012, 0.034],
            "default_left": [1, 0, 0],
            "split_type": [0, 0, 0]
        }))
    }

    #[test]
    fn test_numeric_split_and_missing() {
        let tree = RegressionTree::compile(&numeric_stump(), 0, 1).expect("Should compile");
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.evaluate(&[18.0]), 0.012);
        assert_eq!(tree.evaluate(&[50.0]), 0.034);
        assert_eq!(tree.evaluate(&[f32::NAN]), 0.012);
    }

    #[test]
    fn test_categorical_split_sends_set_right() {
        let raw = parse(json!({
            "tree_param": { "num_nodes": "3" },
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [0, 0, 0],
            "split_conditions": [0.0, 0.1, 0.2],
            "default_left": [0, 0, 0],
            "split_type": [1, 0, 0],
            "categories": [0, 33],
            "categories_nodes": [0],
            "categories_segments": [0],
            "categories_sizes": [2]
        }));
        let tree = RegressionTree::compile(&raw, 0, 1).expect("Should compile");

        assert_eq!(tree.evaluate(&[0.0]), 0.2);
        assert_eq!(tree.evaluate(&[33.0]), 0.2);
        assert_eq!(tree.evaluate(&[1.0]), 0.1);
        assert_eq!(tree.evaluate(&[f32::NAN]), 0.2);
    }

    #[test]
    fn test_backward_child_is_rejected() {
        let mut raw = numeric_stump();
        raw.right_children[0] = 0;
        assert_eq!(
            RegressionTree::compile(&raw, 4, 1),
            Err(TreeError::InvalidChild {
                tree: 4,
                node: 0,
                child: 0
            })
        );
    }

    #[test]
    fn test_feature_out_of_range_is_rejected() {
        let raw = numeric_stump();
        assert!(matches!(
            RegressionTree::compile(&raw, 0, 0),
            Err(TreeError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn test_truncated_arrays_are_rejected() {
        let mut raw = numeric_stump();
        raw.split_conditions.pop();
        assert!(matches!(
            RegressionTree::compile(&raw, 0, 1),
            Err(TreeError::Length {
                array: "split_conditions",
                ..
            })
        ));
    }
}
