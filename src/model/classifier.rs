use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModelError;

/// A class label, encoded in JSON with the same type the model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Integer(i64),
    Text(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Integer(value) => write!(f, "{value}"),
            Label::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    /// One row per class, or a single row for binary problems.
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

/// A fitted binary decision tree in flat array form. Node 0 is the root and
/// `-1` in `children_left` marks a leaf.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights.
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierModel {
    Linear(LinearModel),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Classifier {
    n_features_in: usize,
    classes: Vec<Label>,
    model: ClassifierModel,
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(message.into())
}

impl LinearModel {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), ModelError> {
        let rows = self.coef.len();
        let expected_rows = if n_classes == 2 { 1 } else { n_classes };
        if rows != expected_rows && rows != n_classes {
            return Err(invalid(format!(
                "linear model has {rows} coefficient rows for {n_classes} classes"
            )));
        }
        if self.intercept.len() != rows {
            return Err(invalid(format!(
                "linear model has {} intercepts for {rows} coefficient rows",
                self.intercept.len()
            )));
        }
        if let Some(row) = self.coef.iter().find(|row| row.len() != n_features) {
            return Err(invalid(format!(
                "linear model coefficient row has {} entries, expected {n_features}",
                row.len()
            )));
        }
        Ok(())
    }

    fn decide(&self, x: &[f64]) -> usize {
        let scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect();
        if scores.len() == 1 {
            usize::from(scores[0] > 0.0)
        } else {
            argmax(&scores)
        }
    }
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), ModelError> {
        let nodes = self.children_left.len();
        if nodes == 0 {
            return Err(invalid("decision tree has no nodes"));
        }
        if self.children_right.len() != nodes
            || self.feature.len() != nodes
            || self.threshold.len() != nodes
            || self.value.len() != nodes
        {
            return Err(invalid("decision tree node arrays differ in length"));
        }

        for node in 0..nodes {
            if self.value[node].len() != n_classes {
                return Err(invalid(format!(
                    "decision tree node {node} has {} class weights, expected {n_classes}",
                    self.value[node].len()
                )));
            }
            if self.children_left[node] == -1 {
                continue;
            }
            // Children always come after their parent, so walks terminate.
            for child in [self.children_left[node], self.children_right[node]] {
                if child <= node as i64 || child >= nodes as i64 {
                    return Err(invalid(format!(
                        "decision tree node {node} has invalid child {child}"
                    )));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature >= n_features as i64 {
                return Err(invalid(format!(
                    "decision tree node {node} splits on unknown feature {feature}"
                )));
            }
        }
        Ok(())
    }

    fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            // Split thresholds were fit on single precision inputs.
            let value = x[self.feature[node] as usize] as f32 as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.value[node]
    }

    fn probabilities(&self, x: &[f64]) -> Vec<f64> {
        let weights = self.leaf(x);
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            weights.to_vec()
        }
    }
}

impl RandomForest {
    fn probabilities(&self, x: &[f64], n_classes: usize) -> Vec<f64> {
        let mut sums = vec![0.0; n_classes];
        for tree in &self.trees {
            for (sum, p) in sums.iter_mut().zip(tree.probabilities(x)) {
                *sum += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        sums.iter().map(|s| s / n_trees).collect()
    }
}

impl Classifier {
    pub fn new(n_features_in: usize, classes: Vec<Label>, model: ClassifierModel) -> Self {
        Self {
            n_features_in,
            classes,
            model,
        }
    }

    pub fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub(super) fn validate(&self) -> Result<(), ModelError> {
        if self.classes.is_empty() {
            return Err(invalid("classifier has no classes"));
        }
        let (n_features, n_classes) = (self.n_features_in, self.classes.len());
        match &self.model {
            ClassifierModel::Linear(linear) => linear.validate(n_features, n_classes),
            ClassifierModel::DecisionTree(tree) => tree.validate(n_features, n_classes),
            ClassifierModel::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err(invalid("random forest has no trees"));
                }
                forest
                    .trees
                    .iter()
                    .try_for_each(|tree| tree.validate(n_features, n_classes))
            }
        }
    }

    /// Predicts the label of one reduced feature vector.
    pub fn predict(&self, x: &[f64]) -> Result<Label, ModelError> {
        if x.len() != self.n_features_in {
            return Err(ModelError::FeatureCountMismatch {
                stage: "the classifier",
                expected: self.n_features_in,
                actual: x.len(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let index = match &self.model {
            ClassifierModel::Linear(linear) => linear.decide(x),
            ClassifierModel::DecisionTree(tree) => argmax(&tree.probabilities(x)),
            ClassifierModel::RandomForest(forest) => {
                argmax(&forest.probabilities(x, self.classes.len()))
            }
        };
        self.classes
            .get(index)
            .cloned()
            .ok_or_else(|| invalid(format!("class index {index} out of range")))
    }
}
