//! Feature extraction for heart disease model inference.
//!
//! The classifiers were trained on the 13-column heart disease dataset.
//! Form fields are taken in the order the browser submits them, which is
//! the order the inputs appear on the classifier page.

use crate::types::patient::PatientForm;

/// Dataset column names, in the order the classifier pages submit them
pub const HEART_FEATURES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Number of features the classifiers expect
pub const HEART_FEATURE_COUNT: usize = HEART_FEATURES.len();

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FeatureError {
    #[error("Invalid input detected: {key}={value}")]
    InvalidValue { key: String, value: String },
    #[error("Expected {expected} features, got {actual}")]
    WrongCount { expected: usize, actual: usize },
}

/// Turns a submitted form into the model input vector.
///
/// The expected count is the number of rendered inputs, so a page built
/// from `feature_names` always yields a vector of the right length.
pub struct FeatureExtractor {
    names: &'static [&'static str],
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            names: &HEART_FEATURES,
        }
    }

    /// Extract features from a form.
    ///
    /// Identity fields are skipped; every other value must parse as a float.
    pub fn extract(&self, form: &PatientForm) -> Result<Vec<f32>, FeatureError> {
        let mut features = Vec::with_capacity(self.feature_count());

        for (key, value) in form.feature_fields() {
            let parsed = value
                .trim()
                .parse::<f32>()
                .map_err(|_| FeatureError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            features.push(parsed);
        }

        if features.len() != self.feature_count() {
            return Err(FeatureError::WrongCount {
                expected: self.feature_count(),
                actual: features.len(),
            });
        }

        Ok(features)
    }

    pub fn feature_count(&self) -> usize {
        self.names.len()
    }

    /// Names of the form inputs, in submission order
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.names.to_vec()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_form() -> Vec<(String, String)> {
        let values = [
            "63", "1", "3", "145", "233", "1", "0", "150", "0", "2.3", "0", "0", "1",
        ];
        FeatureExtractor::new()
            .feature_names()
            .into_iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        let form = PatientForm::new(sample_form());

        let features = extractor.extract(&form).unwrap();

        assert_eq!(features.len(), extractor.feature_count());
        assert_eq!(features[0], 63.0); // age
        assert_eq!(features[9], 2.3); // oldpeak
    }

    #[test]
    fn test_identity_fields_are_not_features() {
        let mut fields = vec![
            ("hhNumber".to_string(), "998877".to_string()),
            ("patientAddress".to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string()),
        ];
        fields.extend(sample_form());

        let features = FeatureExtractor::new()
            .extract(&PatientForm::new(fields))
            .unwrap();
        assert_eq!(features.len(), HEART_FEATURE_COUNT);
        assert_eq!(features[0], 63.0);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let mut fields = sample_form();
        fields[4].1 = "high".to_string();

        let err = FeatureExtractor::new()
            .extract(&PatientForm::new(fields))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid input detected: chol=high");
    }

    #[test]
    fn test_wrong_feature_count() {
        let mut fields = sample_form();
        fields.pop();

        let err = FeatureExtractor::new()
            .extract(&PatientForm::new(fields))
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::WrongCount {
                expected: 13,
                actual: 12
            }
        );
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 13);
        assert_eq!(extractor.feature_names().len(), extractor.feature_count());
    }

    #[test]
    fn test_rendered_inputs_always_extract() {
        let extractor = FeatureExtractor::new();
        let fields = extractor
            .feature_names()
            .into_iter()
            .map(|name| (name.to_string(), "1".to_string()))
            .collect();

        let features = extractor.extract(&PatientForm::new(fields)).unwrap();
        assert_eq!(features.len(), extractor.feature_count());
    }
}
