//! Patient form submission data structures

use serde::Deserialize;

/// Form key carrying the patient's health identifier
pub const HH_NUMBER_FIELD: &str = "hhNumber";

/// Form key carrying the patient's wallet address
pub const PATIENT_ADDRESS_FIELD: &str = "patientAddress";

/// A submitted health form, with fields kept in submission order.
///
/// Every field other than the two identity fields is a model feature.
#[derive(Debug, Clone, Default)]
pub struct PatientForm {
    fields: Vec<(String, String)>,
}

impl PatientForm {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn hh_number(&self) -> Option<&str> {
        self.get(HH_NUMBER_FIELD)
    }

    pub fn patient_address(&self) -> Option<&str> {
        self.get(PATIENT_ADDRESS_FIELD)
    }

    /// Feature fields in submission order
    pub fn feature_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(k, _)| !is_identity_field(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Validate the identity fields required for recording on the ledger
    pub fn identity(&self) -> Result<PatientIdentity, IdentityError> {
        let hh_number = match self.hh_number() {
            Some(hh) if !hh.is_empty() => hh.to_string(),
            _ => return Err(IdentityError::MissingHhNumber),
        };

        let patient_address = match self.patient_address() {
            Some(addr) if addr.starts_with("0x") => addr.to_string(),
            _ => return Err(IdentityError::InvalidAddress),
        };

        Ok(PatientIdentity {
            hh_number,
            patient_address,
        })
    }
}

impl From<Vec<(String, String)>> for PatientForm {
    fn from(fields: Vec<(String, String)>) -> Self {
        Self::new(fields)
    }
}

fn is_identity_field(key: &str) -> bool {
    key == HH_NUMBER_FIELD || key == PATIENT_ADDRESS_FIELD
}

/// Identity of the patient a prediction belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct PatientIdentity {
    pub hh_number: String,
    pub patient_address: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdentityError {
    #[error("Patient identifier missing")]
    MissingHhNumber,
    #[error("Invalid or missing patient address")]
    InvalidAddress,
}

/// Identity query parameters carried from the dashboard link into the forms
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityQuery {
    #[serde(rename = "hhNumber", default)]
    pub hh_number: String,
    #[serde(rename = "patientAddress", default)]
    pub patient_address: String,
}
