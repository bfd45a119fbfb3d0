//! Feature normalizer: raw request object -> ordered feature vector.
//!
//! Clients send the same fields in several spellings (`blood_pressure`,
//! `bloodPressure`, `BloodPressure`). Keys are compared after lower-casing and
//! dropping `_`, `-` and spaces. Age and pedigree may be derived from a
//! national identifier and a family-history rating when not given directly.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::domain::derived::{age_from_national_id, pedigree_from_family_history};
use crate::domain::{Domain, FeatureValue, FeatureVector, ValidationError};
use crate::GlimpseError;

/// Keys accepted for the national identifier, already folded.
const NATIONAL_ID_KEYS: [&str; 2] = ["cnp", "nationalid"];

/// Key accepted for the family-history rating, already folded.
const FAMILY_HISTORY_KEY: &str = "familyhistory";

/// Fold a key to its convention-free form.
#[must_use]
pub fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Raw input indexed by folded key.
struct FoldedInput<'a> {
    raw: &'a Map<String, Value>,
    folded: Vec<(String, &'a Value)>,
}

impl<'a> FoldedInput<'a> {
    fn new(raw: &'a Map<String, Value>) -> Self {
        let folded = raw.iter().map(|(k, v)| (fold_key(k), v)).collect();
        Self { raw, folded }
    }

    /// Exact key first, then the first key that folds to the same form.
    fn get(&self, name: &str) -> Option<&'a Value> {
        if let Some(v) = self.raw.get(name) {
            return Some(v);
        }
        let wanted = fold_key(name);
        self.folded
            .iter()
            .find(|(k, _)| *k == wanted)
            .map(|(_, v)| *v)
    }

    /// Like `get`, but treats `null` as absent.
    fn get_present(&self, name: &str) -> Option<&'a Value> {
        self.get(name).filter(|v| !v.is_null())
    }
}

fn slot_index(domain: Domain, field: &str) -> Option<usize> {
    domain.feature_names().iter().position(|n| *n == field)
}

/// Build the feature vector for `domain` from a raw JSON object.
///
/// Missing or non-numeric slots are carried through; they are rejected at
/// prediction time.
///
/// # Errors
/// Returns `Validation` when a national identifier or family-history rating
/// is supplied but malformed.
pub fn normalize(
    raw: &Map<String, Value>,
    domain: Domain,
    reference: NaiveDate,
) -> Result<FeatureVector, GlimpseError> {
    let input = FoldedInput::new(raw);

    let mut values: Vec<FeatureValue> = domain
        .feature_names()
        .iter()
        .map(|name| input.get(name).map_or(FeatureValue::Missing, FeatureValue::from_json))
        .collect();

    if let Some(idx) = slot_index(domain, domain.age_field()) {
        if values[idx].is_missing() {
            let id = NATIONAL_ID_KEYS.iter().find_map(|k| input.get_present(k));
            if let Some(id) = id {
                let id = id.as_str().ok_or(ValidationError::MalformedNationalId)?;
                let age = age_from_national_id(id.trim(), reference)?;
                tracing::debug!(%domain, "Derived age from national identifier");
                values[idx] = FeatureValue::Number(f64::from(age));
            }
        }
    }

    if let Some(field) = domain.pedigree_field() {
        if let Some(idx) = slot_index(domain, field) {
            if values[idx].is_missing() {
                if let Some(rating) = input.get_present(FAMILY_HISTORY_KEY) {
                    let rating = numeric_rating(rating)?;
                    let pedigree = pedigree_from_family_history(rating)?;
                    tracing::debug!(%domain, "Derived pedigree from family history");
                    values[idx] = FeatureValue::Number(pedigree);
                }
            }
        }
    }

    FeatureVector::from_values(domain, values).map_err(GlimpseError::InvalidRequest)
}

/// Only JSON numbers count as a rating; numeric strings are rejected.
fn numeric_rating(value: &Value) -> Result<f64, ValidationError> {
    value
        .as_f64()
        .filter(|x| x.is_finite())
        .ok_or(ValidationError::FamilyHistoryNotNumeric)
}
