//! Raw form input and its coercion into typed values.
//!
//! Forms carry exactly what was typed. Required fields are checked and
//! numbers parsed here, so registry operations only ever see typed values.

use crate::error::{OpResult, RegistryError};

/// Admin form for creating or updating a user
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub name: String,
    pub age: String,
    pub address: String,
    pub household_size: String,
    pub income: String,
    pub profession: String,
}

/// Self-service profile form (no username or password)
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub name: String,
    pub age: String,
    pub address: String,
    pub household_size: String,
    pub income: String,
    pub profession: String,
}

/// Admin form for creating or updating a farm site
#[derive(Debug, Clone, Default)]
pub struct SiteForm {
    pub name: String,
    pub address: String,
    pub responsible_person: String,
    pub contact: String,
    pub floors: String,
    pub area_m2: String,
}

/// Profile fields after coercion
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInput {
    pub name: String,
    pub age: u32,
    pub address: String,
    pub household_size: u32,
    pub income: f64,
    pub profession: String,
}

/// Fail with `MissingField` for the first blank value
pub fn require(fields: &[(&'static str, &str)]) -> OpResult<()> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(RegistryError::MissingField(*field)),
        None => Ok(()),
    }
}

/// Parse a non-negative whole number
pub fn parse_count(field: &'static str, raw: &str) -> OpResult<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| RegistryError::invalid_number(field, raw))
}

/// Parse a finite, non-negative amount
pub fn parse_amount(field: &'static str, raw: &str) -> OpResult<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(RegistryError::invalid_number(field, raw)),
    }
}

/// Blank input means "keep the previous value"
pub fn parse_count_or(field: &'static str, raw: &str, previous: u32) -> OpResult<u32> {
    if raw.trim().is_empty() {
        Ok(previous)
    } else {
        parse_count(field, raw)
    }
}

pub fn parse_amount_or(field: &'static str, raw: &str, previous: f64) -> OpResult<f64> {
    if raw.trim().is_empty() {
        Ok(previous)
    } else {
        parse_amount(field, raw)
    }
}

pub fn text_or(raw: &str, previous: &str) -> String {
    if raw.trim().is_empty() {
        previous.to_string()
    } else {
        raw.to_string()
    }
}

impl ProfileForm {
    /// Check that every field is present and coerce the numbers
    pub fn parse(&self) -> OpResult<ProfileInput> {
        require(&[
            ("name", self.name.as_str()),
            ("age", self.age.as_str()),
            ("address", self.address.as_str()),
            ("household_size", self.household_size.as_str()),
            ("income", self.income.as_str()),
            ("profession", self.profession.as_str()),
        ])?;
        Ok(ProfileInput {
            name: self.name.clone(),
            age: parse_count("age", &self.age)?,
            address: self.address.clone(),
            household_size: parse_count("household_size", &self.household_size)?,
            income: parse_amount("income", &self.income)?,
            profession: self.profession.clone(),
        })
    }
}

impl UserForm {
    pub fn profile(&self) -> ProfileForm {
        ProfileForm {
            name: self.name.clone(),
            age: self.age.clone(),
            address: self.address.clone(),
            household_size: self.household_size.clone(),
            income: self.income.clone(),
            profession: self.profession.clone(),
        }
    }
}
