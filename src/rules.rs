//! Eligibility and capacity rules for applicants and farm sites.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Minimum applicant age
pub const MIN_AGE: u32 = 18;
/// Maximum applicant income
pub const MAX_INCOME: f64 = 2000.0;
/// Minimum production capacity for a site to qualify
pub const MIN_CAPACITY: f64 = 1000.0;
/// Placeholder for derived fields that do not apply
pub const NOT_APPLICABLE: &str = "N/A";

/// Which deadline offset applies to an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineRule {
    /// Record created from the admin form
    Creation,
    /// Admin update or self-service profile save
    Renewal,
}

impl DeadlineRule {
    // Creation and renewal offsets have always differed; kept as observed.
    pub fn days(&self) -> u64 {
        match self {
            Self::Creation => 15,
            Self::Renewal => 30,
        }
    }
}

/// Site eligibility label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum SiteEligibility {
    #[serde(alias = "Sim")]
    Yes,
    #[default]
    #[serde(alias = "Não", alias = "Nao")]
    No,
}

impl SiteEligibility {
    pub fn from_capacity(capacity: f64) -> Self {
        if capacity >= MIN_CAPACITY {
            Self::Yes
        } else {
            Self::No
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

impl std::fmt::Display for SiteEligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applicant eligibility for already-typed values
pub fn is_eligible(age: u32, income: f64) -> bool {
    age >= MIN_AGE && income <= MAX_INCOME
}

/// Applicant eligibility from raw input. Anything that does not coerce is ineligible.
pub fn eligibility(age: &str, income: &str) -> bool {
    match (age.trim().parse::<u32>(), income.trim().parse::<f64>()) {
        (Ok(age), Ok(income)) if !income.is_nan() => is_eligible(age, income),
        _ => false,
    }
}

/// Production capacity: floors * area * 2
pub fn capacity(floors: u32, area_m2: f64) -> f64 {
    f64::from(floors) * area_m2 * 2.0
}

/// Production capacity from raw input, 0 when either value does not coerce
pub fn production_capacity(floors: &str, area_m2: &str) -> f64 {
    match (floors.trim().parse::<u32>(), area_m2.trim().parse::<f64>()) {
        (Ok(floors), Ok(area)) if area.is_finite() => capacity(floors, area),
        _ => 0.0,
    }
}

/// Site assigned to an applicant: their own address when eligible
pub fn assigned_site(eligible: bool, address: &str) -> String {
    if eligible {
        address.to_string()
    } else {
        NOT_APPLICABLE.to_string()
    }
}

/// ISO date of the appointment deadline, or "N/A" when not eligible
pub fn appointment_deadline(eligible: bool, today: NaiveDate, rule: DeadlineRule) -> String {
    if !eligible {
        return NOT_APPLICABLE.to_string();
    }
    today
        .checked_add_days(Days::new(rule.days()))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}
