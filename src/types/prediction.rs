//! Prediction result data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three pre-trained heart disease classifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[serde(rename = "gb")]
    GradientBoosting,
    #[serde(rename = "rf")]
    RandomForest,
    Knn,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::GradientBoosting,
        ModelKind::RandomForest,
        ModelKind::Knn,
    ];

    /// Short name used in routes (`/showgb`, `/predictgb`, ...)
    pub fn slug(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "gb",
            ModelKind::RandomForest => "rf",
            ModelKind::Knn => "knn",
        }
    }

    /// Page title shown above the classifier form
    pub fn title(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "Heart Disease Classifier",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Knn => "KNN",
        }
    }

    pub fn show_path(&self) -> String {
        format!("/show{}", self.slug())
    }

    pub fn predict_path(&self) -> String {
        format!("/predict{}", self.slug())
    }

    /// Only the primary classifier writes its result to the ledger
    pub fn records_on_ledger(&self) -> bool {
        matches!(self, ModelKind::GradientBoosting)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Risk tier derived from the positive-class probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Determine risk level from a percentage and thresholds.
    ///
    /// Both comparisons are strict: a probability equal to a threshold
    /// falls into the lower tier.
    pub fn from_percentage(percentage: f64, thresholds: &RiskThresholds) -> Self {
        if percentage > thresholds.high {
            RiskLevel::High
        } else if percentage > thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configurable risk tier boundaries, in percent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 40.0,
            high: 70.0,
        }
    }
}

/// Outcome of running one classifier on one form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Unique prediction identifier, used to correlate log lines
    pub prediction_id: String,

    /// Classifier that produced the score
    pub model: ModelKind,

    /// Probability of heart disease in percent (0.0 - 100.0)
    pub probability: f64,

    /// Risk tier
    pub risk_level: RiskLevel,

    pub timestamp: DateTime<Utc>,
}

impl Prediction {
    /// Build a prediction from the model's positive-class probability (0.0 - 1.0)
    pub fn from_probability(model: ModelKind, probability: f64, thresholds: &RiskThresholds) -> Self {
        let percentage = probability * 100.0;
        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            model,
            probability: percentage,
            risk_level: RiskLevel::from_percentage(percentage, thresholds),
            timestamp: Utc::now(),
        }
    }

    /// Probability rendered as text, the form stored on chain
    pub fn probability_text(&self) -> String {
        format_probability(self.probability)
    }
}

/// Format a float like Python's `repr`: the shortest digits that
/// round-trip, a trailing `.0` on integral values, and exponent form
/// (`1e-05`, `1.5e+16`) outside `1e-4 <= |x| < 1e16`.
pub fn format_probability(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let scientific = format!("{:e}", value);
        return match scientific.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => scientific,
        };
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
