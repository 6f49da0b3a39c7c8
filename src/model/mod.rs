//! Pretrained model artifacts: the feature selector and the classifier.
//!
//! Both are exported from the training pipeline as JSON and loaded once at
//! startup. They are immutable afterwards and shared across requests.

mod classifier;
mod selector;

pub use classifier::{Classifier, ClassifierModel, DecisionTree, Label, LinearModel, RandomForest};
pub use selector::FeatureSelector;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::features::{FeatureVector, FEATURE_VECTOR_LEN};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("X has {actual} features, but {stage} is expecting {expected} features as input")]
    FeatureCountMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Input contains NaN or infinity")]
    NonFinite,

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),
}

#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    selector: FeatureSelector,
    classifier: Classifier,
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {:?}", what, path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} {:?}", what, path))
}

impl ModelArtifacts {
    /// Validates the artifacts and checks that the selector output feeds the
    /// classifier.
    pub fn new(selector: FeatureSelector, classifier: Classifier) -> Result<Self, ModelError> {
        selector.validate()?;
        classifier.validate()?;
        if selector.n_features_out() != classifier.n_features_in() {
            return Err(ModelError::InvalidArtifact(format!(
                "selector outputs {} features but the classifier expects {}",
                selector.n_features_out(),
                classifier.n_features_in()
            )));
        }
        Ok(Self {
            selector,
            classifier,
        })
    }

    pub fn load(classifier_path: &Path, selector_path: &Path) -> Result<Self> {
        let classifier: Classifier = read_json(classifier_path, "classifier")?;
        let selector: FeatureSelector = read_json(selector_path, "feature selector")?;
        let artifacts = Self::new(selector, classifier).context("Invalid model artifacts")?;

        if artifacts.selector.n_features_in() != FEATURE_VECTOR_LEN {
            warn!(
                "Feature selector expects {} features but extraction produces {}; every prediction will fail",
                artifacts.selector.n_features_in(),
                FEATURE_VECTOR_LEN
            );
        }
        info!(
            "Loaded model artifacts: {} -> {} features, classes {:?}",
            artifacts.selector.n_features_in(),
            artifacts.selector.n_features_out(),
            artifacts.classifier.classes()
        );
        Ok(artifacts)
    }

    pub fn selector(&self) -> &FeatureSelector {
        &self.selector
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Reduces `features` through the selector and classifies the result.
    pub fn predict(&self, features: &FeatureVector) -> Result<Label, ModelError> {
        let reduced = self.selector.transform(features.as_slice())?;
        self.classifier.predict(&reduced)
    }
}
