//! Fitted classifier artifacts.
//!
//! Two exported forms are understood:
//! - `logistic`: linear model with a sigmoid link
//! - `tree_ensemble`: gradient-boosted binary trees (XGBoost / LightGBM dumps)

use serde::{Deserialize, Serialize};

use crate::ports::{Classifier, ModelError};

fn default_threshold() -> f64 {
    0.5
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Comparison used to route a row at a split node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// `x < threshold` goes left (XGBoost)
    #[default]
    LessThan,
    /// `x <= threshold` goes left (LightGBM)
    LessOrEqual,
}

/// One node of a boosted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

/// One boosted tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn score(&self, row: &[f64], rule: SplitRule) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row[*feature];
                    let go_left = match rule {
                        SplitRule::LessThan => x < *threshold,
                        SplitRule::LessOrEqual => x <= *threshold,
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Classifier parameters as exported after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    TreeEnsemble {
        n_features: usize,
        #[serde(default)]
        base_score: f64,
        #[serde(default)]
        split: SplitRule,
        #[serde(default = "default_threshold")]
        threshold: f64,
        trees: Vec<Tree>,
    },
}

impl ClassifierArtifact {
    /// Structural checks run once at load time.
    ///
    /// Tree children must point forward, which also rules out cycles, so
    /// evaluation never needs a bounds check.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Logistic {
                coefficients,
                intercept,
                threshold,
            } => {
                if coefficients.is_empty() {
                    return Err("logistic model has no coefficients".into());
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("logistic parameters must be finite".into());
                }
                check_threshold(*threshold)
            }
            Self::TreeEnsemble {
                n_features,
                base_score,
                threshold,
                trees,
                ..
            } => {
                if *n_features == 0 {
                    return Err("tree ensemble declares zero features".into());
                }
                if trees.is_empty() {
                    return Err("tree ensemble has no trees".into());
                }
                if !base_score.is_finite() {
                    return Err("base_score must be finite".into());
                }
                for (t, tree) in trees.iter().enumerate() {
                    if tree.nodes.is_empty() {
                        return Err(format!("tree {t} has no nodes"));
                    }
                    for (i, node) in tree.nodes.iter().enumerate() {
                        if let TreeNode::Split {
                            feature,
                            left,
                            right,
                            threshold,
                        } = node
                        {
                            if *feature >= *n_features {
                                return Err(format!(
                                    "tree {t} node {i} splits on feature {feature} (n_features={n_features})"
                                ));
                            }
                            let n = tree.nodes.len();
                            if *left <= i || *right <= i || *left >= n || *right >= n {
                                return Err(format!("invalid child reference in tree {t} node {i}"));
                            }
                            if threshold.is_nan() {
                                return Err(format!("tree {t} node {i} has a NaN threshold"));
                            }
                        }
                    }
                }
                check_threshold(*threshold)
            }
        }
    }

    /// Positive-class probability for one scaled row.
    fn probability(&self, row: &[f64]) -> f64 {
        match self {
            Self::Logistic {
                coefficients,
                intercept,
                ..
            } => {
                let margin = coefficients
                    .iter()
                    .zip(row)
                    .fold(*intercept, |acc, (w, x)| acc + w * x);
                sigmoid(margin)
            }
            Self::TreeEnsemble {
                base_score,
                split,
                trees,
                ..
            } => {
                let margin = trees
                    .iter()
                    .fold(*base_score, |acc, tree| acc + tree.score(row, *split));
                sigmoid(margin)
            }
        }
    }

    fn decision_threshold(&self) -> f64 {
        match self {
            Self::Logistic { threshold, .. } | Self::TreeEnsemble { threshold, .. } => *threshold,
        }
    }
}

fn check_threshold(threshold: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(format!("decision threshold {threshold} outside [0, 1]"))
    }
}

impl Classifier for ClassifierArtifact {
    fn n_features(&self) -> usize {
        match self {
            Self::Logistic { coefficients, .. } => coefficients.len(),
            Self::TreeEnsemble { n_features, .. } => *n_features,
        }
    }

    fn predict_label(&self, scaled: &[f64]) -> Result<u8, ModelError> {
        if scaled.len() != self.n_features() {
            return Err(ModelError::UnscaledInput(format!(
                "classifier expects {} features, got {}",
                self.n_features(),
                scaled.len()
            )));
        }
        Ok(u8::from(self.probability(scaled) >= self.decision_threshold()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(rule: SplitRule) -> ClassifierArtifact {
        ClassifierArtifact::TreeEnsemble {
            n_features: 2,
            base_score: 0.0,
            split: rule,
            threshold: 0.5,
            trees: vec![Tree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 1,
                        threshold: 0.0,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf { leaf: -1.0 },
                    TreeNode::Leaf { leaf: 1.0 },
                ],
            }],
        }
    }

    #[test]
    fn test_logistic_labels() {
        let model = ClassifierArtifact::Logistic {
            coefficients: vec![2.0, -1.0],
            intercept: 0.0,
            threshold: 0.5,
        };
        assert_eq!(model.predict_label(&[1.0, 0.0]), Ok(1));
        assert_eq!(model.predict_label(&[0.0, 1.0]), Ok(0));
    }

    #[test]
    fn test_tree_split_rules_differ_on_boundary() {
        let row = [0.0, 0.0];
        assert_eq!(stump(SplitRule::LessThan).predict_label(&row), Ok(1));
        assert_eq!(stump(SplitRule::LessOrEqual).predict_label(&row), Ok(0));
    }

    #[test]
    fn test_width_checked() {
        assert!(matches!(
            stump(SplitRule::LessThan).predict_label(&[1.0]),
            Err(ModelError::UnscaledInput(_))
        ));
    }

    #[test]
    fn test_validate_rejects_backward_children() {
        let model = ClassifierArtifact::TreeEnsemble {
            n_features: 1,
            base_score: 0.0,
            split: SplitRule::LessThan,
            threshold: 0.5,
            trees: vec![Tree {
                nodes: vec![TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 0,
                }],
            }],
        };
        assert!(model.validate().is_err());
        assert!(stump(SplitRule::LessThan).validate().is_ok());
    }

    #[test]
    fn test_parse_tree_dump() {
        let json = r#"{
            "kind": "tree_ensemble",
            "n_features": 2,
            "split": "less_or_equal",
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                {"leaf": -0.3},
                {"leaf": 0.7}
            ]}]
        }"#;
        let model: ClassifierArtifact = serde_json::from_str(json).expect("parse");
        assert!(model.validate().is_ok());
        assert_eq!(model.predict_label(&[1.0, 0.0]), Ok(1));
        assert_eq!(model.predict_label(&[0.0, 0.0]), Ok(0));
    }
}
