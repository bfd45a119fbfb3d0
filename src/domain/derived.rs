//! Derived clinical fields.
//!
//! - Age decoded from a 13-digit national identifier (CNP layout)
//! - Diabetes pedigree score rescaled from a 1-5 family-history rating

use chrono::{Datelike, NaiveDate};

/// Errors for malformed derived-field input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("National identifier must be a 13-digit numeric string")]
    MalformedNationalId,

    #[error("Invalid date components in national identifier")]
    InvalidBirthDate,

    #[error("National identifier encodes a birth date after {0}")]
    BirthDateInFuture(NaiveDate),

    #[error("Family history must be a numeric value")]
    FamilyHistoryNotNumeric,

    #[error("Family history must be between 1 and 5, got {0}")]
    FamilyHistoryOutOfRange(f64),
}

const NATIONAL_ID_LEN: usize = 13;

/// Century selected by the leading digit of a national identifier.
#[must_use]
pub fn century_for(digit: u32) -> i32 {
    match digit {
        1 | 2 => 1900,
        3 | 4 => 1800,
        _ => 2000,
    }
}

/// Decode the birth date embedded in a national identifier.
///
/// # Errors
/// Returns `MalformedNationalId` unless the input is exactly 13 ASCII digits,
/// and `InvalidBirthDate` when the encoded date does not exist.
pub fn birth_date_from_national_id(id: &str) -> Result<NaiveDate, ValidationError> {
    if id.len() != NATIONAL_ID_LEN || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedNationalId);
    }

    let digits: Vec<u32> = id.bytes().map(|b| u32::from(b - b'0')).collect();
    let two = |i: usize| digits[i] * 10 + digits[i + 1];

    let year = century_for(digits[0]) + two(1) as i32;
    let month = two(3);
    let day = two(5);

    NaiveDate::from_ymd_opt(year, month, day).ok_or(ValidationError::InvalidBirthDate)
}

/// Age in whole years at `reference`.
///
/// # Errors
/// Propagates identifier errors, and rejects birth dates after `reference`.
pub fn age_from_national_id(id: &str, reference: NaiveDate) -> Result<u32, ValidationError> {
    let birth = birth_date_from_national_id(id)?;
    if birth > reference {
        return Err(ValidationError::BirthDateInFuture(reference));
    }

    let mut age = reference.year() - birth.year();
    if (reference.month(), reference.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }

    // birth <= reference keeps this non-negative
    Ok(age.max(0) as u32)
}

/// Rescale a 1-5 family-history rating to the pedigree range [0.00, 1.50].
///
/// # Errors
/// Returns `FamilyHistoryOutOfRange` outside [1, 5].
pub fn pedigree_from_family_history(rating: f64) -> Result<f64, ValidationError> {
    if !rating.is_finite() {
        return Err(ValidationError::FamilyHistoryNotNumeric);
    }
    if !(1.0..=5.0).contains(&rating) {
        return Err(ValidationError::FamilyHistoryOutOfRange(rating));
    }

    let pedigree = (rating - 1.0) * (1.5 / 4.0);
    Ok((pedigree * 100.0).round_ties_even() / 100.0)
}
