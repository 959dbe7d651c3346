//! HTML page templates

use crate::types::prediction::{ModelKind, Prediction};
use askama::Template;

/// Landing page linking to the three classifiers
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub hh_number: String,
    pub patient_address: String,
    pub models: &'static [ModelKind],
}

impl IndexTemplate {
    pub fn new(hh_number: String, patient_address: String) -> Self {
        Self {
            hh_number,
            patient_address,
            models: &ModelKind::ALL,
        }
    }
}

/// Classifier form, optionally showing the last prediction
#[derive(Template)]
#[template(path = "classifier.html")]
pub struct ClassifierTemplate {
    pub model: ModelKind,
    pub feature_names: Vec<&'static str>,
    pub hh_number: String,
    pub patient_address: String,
    pub outcome: Option<OutcomeView>,
}

/// Prediction text as shown under the form
pub struct OutcomeView {
    pub result: &'static str,
    pub positive: String,
    pub res2: String,
    pub risk_level: &'static str,
}

impl From<&Prediction> for OutcomeView {
    fn from(prediction: &Prediction) -> Self {
        Self {
            result: "Probability of having heart disease: ",
            positive: prediction.probability_text(),
            res2: format!("Risk is {}", prediction.risk_level),
            risk_level: prediction.risk_level.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::RiskThresholds;

    #[test]
    fn test_index_links_carry_identity() {
        let html = IndexTemplate::new("123 456".to_string(), "0xabc".to_string())
            .render()
            .unwrap();

        assert!(html.contains("/showgb?hhNumber=123%20456&amp;patientAddress=0xabc")
            || html.contains("/showgb?hhNumber=123%20456&patientAddress=0xabc"));
        assert!(html.contains("Random Forest"));
    }

    #[test]
    fn test_classifier_renders_outcome() {
        let prediction =
            Prediction::from_probability(ModelKind::Knn, 0.25, &RiskThresholds::default());
        let page = ClassifierTemplate {
            model: ModelKind::Knn,
            feature_names: vec!["age", "sex"],
            hh_number: String::new(),
            patient_address: String::new(),
            outcome: Some(OutcomeView::from(&prediction)),
        };

        let html = page.render().unwrap();
        assert!(html.contains("action=\"/predictknn\""));
        assert!(html.contains("name=\"age\""));
        assert!(html.contains("Probability of having heart disease: 25.0"));
        assert!(html.contains("Risk is LOW"));
        assert!(!html.contains("name=\"hhNumber\""));
    }
}
