use serde::Deserialize;

use super::ModelError;

/// Pre-fit feature selection transform, stored as a support mask.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSelector {
    n_features_in: usize,
    support: Vec<bool>,
}

impl FeatureSelector {
    pub fn new(support: Vec<bool>) -> Self {
        Self {
            n_features_in: support.len(),
            support,
        }
    }

    pub fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    pub fn n_features_out(&self) -> usize {
        self.support.iter().filter(|kept| **kept).count()
    }

    pub(super) fn validate(&self) -> Result<(), ModelError> {
        if self.support.len() != self.n_features_in {
            return Err(ModelError::InvalidArtifact(format!(
                "selector support mask has {} entries but n_features_in is {}",
                self.support.len(),
                self.n_features_in
            )));
        }
        if self.n_features_out() == 0 {
            return Err(ModelError::InvalidArtifact(
                "selector keeps no features".to_string(),
            ));
        }
        Ok(())
    }

    /// Keeps the features whose support flag is set, in order.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.n_features_in {
            return Err(ModelError::FeatureCountMismatch {
                stage: "the feature selector",
                expected: self.n_features_in,
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(&self.support)
            .filter(|(_, kept)| **kept)
            .map(|(value, _)| *value)
            .collect())
    }
}
