//! Persisted record types for applicants and farm sites.
//!
//! Field names on disk are English. Documents written by the older
//! Portuguese-language tool are still readable through serde aliases.

use crate::input::ProfileInput;
use crate::rules::{self, DeadlineRule, SiteEligibility, NOT_APPLICABLE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Users keyed by username
pub type UserMap = BTreeMap<String, UserRecord>;
/// Sites keyed by site name
pub type SiteMap = BTreeMap<String, SiteRecord>;

/// Message attached to every site record
pub const SITE_NOTE: &str = "The responsible person will be contacted for more information.";

fn not_applicable() -> String {
    NOT_APPLICABLE.to_string()
}

/// A registered account. Pending accounts carry only a password.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "StoredUser")]
pub struct UserRecord {
    #[serde(default, alias = "senha")]
    pub password: String,
    #[serde(default, alias = "registrado")]
    pub registered: bool,
    #[serde(flatten)]
    pub profile: Option<UserProfile>,
}

/// On-disk shape of a user. The profile is read as a plain struct so a bad
/// field fails the record instead of dropping the profile.
#[derive(Deserialize)]
struct StoredUser {
    #[serde(default, alias = "senha")]
    password: String,
    #[serde(default, alias = "registrado")]
    registered: bool,
    #[serde(flatten)]
    profile: UserProfile,
}

impl From<StoredUser> for UserRecord {
    fn from(stored: StoredUser) -> Self {
        // Pending records have no profile keys, which reads as all defaults
        let profile = if !stored.registered && stored.profile == UserProfile::empty() {
            None
        } else {
            Some(stored.profile)
        };
        Self {
            password: stored.password,
            registered: stored.registered,
            profile,
        }
    }
}

/// Full applicant profile plus the fields derived from it
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default, alias = "nome")]
    pub name: String,
    #[serde(default, alias = "idade")]
    pub age: u32,
    #[serde(default, alias = "endereco")]
    pub address: String,
    #[serde(default, alias = "pessoas_casa")]
    pub household_size: u32,
    #[serde(default, alias = "renda")]
    pub income: f64,
    #[serde(default, alias = "profissao")]
    pub profession: String,
    #[serde(default, alias = "apto")]
    pub eligible: bool,
    #[serde(default = "not_applicable", alias = "local_designado")]
    pub assigned_site: String,
    #[serde(default = "not_applicable", alias = "prazo_comparecimento")]
    pub appointment_deadline: String,
}

impl UserProfile {
    /// Build a profile and derive eligibility, site and deadline
    pub fn derive(input: ProfileInput, today: NaiveDate, rule: DeadlineRule) -> Self {
        let mut profile = Self {
            name: input.name,
            age: input.age,
            address: input.address,
            household_size: input.household_size,
            income: input.income,
            profession: input.profession,
            ..Self::default()
        };
        profile.refresh(today, rule);
        profile
    }

    /// Recompute the derived fields from the current profile values
    pub fn refresh(&mut self, today: NaiveDate, rule: DeadlineRule) {
        self.eligible = rules::is_eligible(self.age, self.income);
        self.assigned_site = rules::assigned_site(self.eligible, &self.address);
        self.appointment_deadline = rules::appointment_deadline(self.eligible, today, rule);
    }
}

impl UserRecord {
    /// A freshly self-registered account awaiting its profile
    pub fn pending(password: &str) -> Self {
        Self {
            password: password.to_string(),
            registered: false,
            profile: None,
        }
    }

    pub fn with_profile(password: &str, profile: UserProfile) -> Self {
        Self {
            password: password.to_string(),
            registered: true,
            profile: Some(profile),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.registered || self.profile.is_none()
    }

    /// One-line summary for listings
    pub fn summary(&self, username: &str) -> String {
        match &self.profile {
            Some(p) => format!(
                "{} | {} | age {} | {} | eligible: {}",
                username,
                p.name,
                p.age,
                p.address,
                if p.eligible { "Yes" } else { "No" }
            ),
            None => format!("{} | (pending profile)", username),
        }
    }
}

impl UserProfile {
    fn empty() -> Self {
        Self {
            assigned_site: not_applicable(),
            appointment_deadline: not_applicable(),
            ..Self::default()
        }
    }
}

/// A candidate vertical-farm site
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteRecord {
    #[serde(default, alias = "endereco")]
    pub address: String,
    #[serde(default, alias = "responsavel")]
    pub responsible_person: String,
    #[serde(default, alias = "contato")]
    pub contact: String,
    #[serde(default, alias = "andares")]
    pub floors: u32,
    #[serde(default, alias = "area")]
    pub area_m2: f64,
    #[serde(default, alias = "capacidade_producao")]
    pub production_capacity: f64,
    #[serde(default, alias = "apto")]
    pub eligible: SiteEligibility,
    #[serde(default, alias = "mensagem")]
    pub note: String,
}

impl SiteRecord {
    pub fn new(
        address: String,
        responsible_person: String,
        contact: String,
        floors: u32,
        area_m2: f64,
    ) -> Self {
        let mut site = Self {
            address,
            responsible_person,
            contact,
            floors,
            area_m2,
            production_capacity: 0.0,
            eligible: SiteEligibility::No,
            note: SITE_NOTE.to_string(),
        };
        site.refresh();
        site
    }

    /// Recompute capacity and eligibility label
    pub fn refresh(&mut self) {
        self.production_capacity = rules::capacity(self.floors, self.area_m2);
        self.eligible = SiteEligibility::from_capacity(self.production_capacity);
    }

    pub fn summary(&self, name: &str) -> String {
        format!(
            "{} | {} | {} | capacity {:.1} | eligible: {}",
            name, self.address, self.responsible_person, self.production_capacity, self.eligible
        )
    }
}
