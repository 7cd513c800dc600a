//! Model catalog and the serializable set of fitted models

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::adaboost::AdaBoostClassifier;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use super::Classifier;
use crate::error::{AutisenseError, Result};

/// The fixed catalog of classifier strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    Svm,
    RandomForest,
    Knn,
    GradientBoosting,
    AdaBoost,
}

impl ModelKind {
    /// Every strategy, in catalog order
    pub fn all() -> [ModelKind; 6] {
        [
            ModelKind::LogisticRegression,
            ModelKind::Svm,
            ModelKind::RandomForest,
            ModelKind::Knn,
            ModelKind::GradientBoosting,
            ModelKind::AdaBoost,
        ]
    }

    /// Display name used as the key of evaluation results
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::Svm => "SVM",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Knn => "K-Nearest Neighbors",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::AdaBoost => "AdaBoost",
        }
    }

    /// An unfitted model with the catalog defaults
    pub fn build(&self) -> TrainedModel {
        match self {
            ModelKind::LogisticRegression => TrainedModel::LogisticRegression(LogisticRegression::default()),
            ModelKind::Svm => TrainedModel::Svm(SVMClassifier::default()),
            ModelKind::RandomForest => TrainedModel::RandomForest(RandomForest::default()),
            ModelKind::Knn => TrainedModel::Knn(KNNClassifier::default()),
            ModelKind::GradientBoosting => TrainedModel::GradientBoosting(GradientBoostingClassifier::default()),
            ModelKind::AdaBoost => TrainedModel::AdaBoost(AdaBoostClassifier::default()),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = AutisenseError;

    /// Accepts the display name or a short alias, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "logisticregression" | "logistic" | "lr" => Ok(ModelKind::LogisticRegression),
            "svm" | "svc" => Ok(ModelKind::Svm),
            "randomforest" | "rf" => Ok(ModelKind::RandomForest),
            "knearestneighbors" | "knn" => Ok(ModelKind::Knn),
            "gradientboosting" | "gb" | "gbm" => Ok(ModelKind::GradientBoosting),
            "adaboost" | "ada" => Ok(ModelKind::AdaBoost),
            _ => Err(AutisenseError::ConfigError(format!("unknown model '{}'", s))),
        }
    }
}

/// Closed set of fitted (or fittable) models, persisted inside the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    Svm(SVMClassifier),
    RandomForest(RandomForest),
    Knn(KNNClassifier),
    GradientBoosting(GradientBoostingClassifier),
    AdaBoost(AdaBoostClassifier),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::Svm(_) => ModelKind::Svm,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::Knn(_) => ModelKind::Knn,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            TrainedModel::AdaBoost(_) => ModelKind::AdaBoost,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::Svm(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::AdaBoost(m) => m,
        }
    }

    fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::Svm(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::AdaBoost(m) => m,
        }
    }
}

impl From<AdaBoostClassifier> for TrainedModel {
    fn from(model: AdaBoostClassifier) -> Self {
        TrainedModel::AdaBoost(model)
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_classifier_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_classifier().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.as_classifier().predict_proba(x)
    }

    fn supports_feature_importance(&self) -> bool {
        self.as_classifier().supports_feature_importance()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.as_classifier().feature_importances()
    }
}
