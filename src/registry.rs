//! The registry owns both collections, the login session and the storage
//! handle. Every operation checks the session, validates its form, mutates
//! the in-memory collections and then rewrites both documents.

use crate::config::AdminConfig;
use crate::error::{OpResult, RegistryError};
use crate::input::{self, ProfileForm, SiteForm, UserForm};
use crate::records::{SiteMap, SiteRecord, UserMap, UserProfile, UserRecord};
use crate::rules::DeadlineRule;
use crate::session::Session;
use crate::storage::Storage;
use chrono::{Local, NaiveDate};

pub struct Registry {
    storage: Storage,
    admin: AdminConfig,
    users: UserMap,
    sites: SiteMap,
    session: Session,
    today: Option<NaiveDate>,
}

impl Registry {
    /// Load both collections. Returned warnings describe documents that
    /// could not be read and were replaced by empty collections.
    pub fn open(storage: Storage, admin: AdminConfig) -> (Self, Vec<String>) {
        let loaded = storage.load();
        let registry = Self {
            storage,
            admin,
            users: loaded.users,
            sites: loaded.sites,
            session: Session::LoggedOut,
            today: None,
        };
        (registry, loaded.warnings)
    }

    /// Pin the date used for appointment deadlines
    #[cfg(test)]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Discard in-memory state and re-read both documents
    pub fn reload(&mut self) -> Vec<String> {
        let loaded = self.storage.load();
        self.users = loaded.users;
        self.sites = loaded.sites;
        loaded.warnings
    }

    fn persist(&self) -> OpResult<()> {
        self.storage
            .save(&self.users, &self.sites)
            .map_err(RegistryError::Persist)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn admin_name(&self) -> &str {
        &self.admin.username
    }

    pub fn user(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn site(&self, name: &str) -> Option<&SiteRecord> {
        self.sites.get(name)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn login(&mut self, username: &str, password: &str) -> OpResult {
        if self.session.is_logged_in() {
            return Err(RegistryError::AlreadyLoggedIn(
                self.session.label(&self.admin.username),
            ));
        }

        if username == self.admin.username && password == self.admin.password {
            self.session = Session::Admin;
            return Ok("Administrator login successful.".to_string());
        }

        match self.users.get(username) {
            Some(user) if user.password == password => {
                self.session = Session::User(username.to_string());
                Ok(format!("Welcome, {}!", username))
            }
            _ => Err(RegistryError::InvalidCredentials),
        }
    }

    /// Return to the logged-out state, handing back the session that ended
    pub fn logout(&mut self) -> Session {
        std::mem::take(&mut self.session)
    }

    /// Self-service sign-up: creates a pending account
    pub fn register(&mut self, username: &str, password: &str, confirmation: &str) -> OpResult {
        input::require(&[
            ("username", username),
            ("password", password),
            ("confirmation", confirmation),
        ])?;
        if self.users.contains_key(username) || username == self.admin.username {
            return Err(RegistryError::UsernameTaken(username.to_string()));
        }
        if password != confirmation {
            return Err(RegistryError::PasswordMismatch);
        }

        self.users
            .insert(username.to_string(), UserRecord::pending(password));
        self.persist()?;
        Ok("User registered! Log in to fill in your details.".to_string())
    }

    pub fn require_admin(&self) -> OpResult<()> {
        match self.session {
            Session::Admin => Ok(()),
            _ => Err(RegistryError::AdminRequired),
        }
    }

    fn current_user(&self) -> OpResult<&str> {
        self.session.username().ok_or(RegistryError::NotLoggedIn)
    }

    // ------------------------------------------------------------------
    // Users (administrator)
    // ------------------------------------------------------------------

    /// Users visible to the administrator, in key order
    pub fn list_users(&self) -> OpResult<Vec<(&str, &UserRecord)>> {
        self.require_admin()?;
        Ok(self
            .users
            .iter()
            .filter(|(name, _)| **name != self.admin.username)
            .map(|(name, user)| (name.as_str(), user))
            .collect())
    }

    pub fn create_user(&mut self, form: &UserForm) -> OpResult {
        self.require_admin()?;
        input::require(&[
            ("username", form.username.as_str()),
            ("password", form.password.as_str()),
            ("name", form.name.as_str()),
            ("age", form.age.as_str()),
            ("address", form.address.as_str()),
            ("household_size", form.household_size.as_str()),
            ("income", form.income.as_str()),
            ("profession", form.profession.as_str()),
        ])?;
        if self.users.contains_key(&form.username) || form.username == self.admin.username {
            return Err(RegistryError::UsernameTaken(form.username.clone()));
        }

        let profile = UserProfile::derive(
            form.profile().parse()?,
            self.today(),
            DeadlineRule::Creation,
        );
        self.users.insert(
            form.username.clone(),
            UserRecord::with_profile(&form.password, profile),
        );
        self.persist()?;
        Ok(format!("User '{}' added.", form.username))
    }

    /// Blank form fields keep the stored values
    pub fn update_user(&mut self, form: &UserForm) -> OpResult {
        self.require_admin()?;
        input::require(&[("username", form.username.as_str())])?;
        if form.username == self.admin.username {
            return Err(RegistryError::AdminProtected);
        }
        let Some(existing) = self.users.get(&form.username) else {
            return Err(RegistryError::UserNotFound(form.username.clone()));
        };

        let previous = existing.profile.clone().unwrap_or_default();
        let mut profile = UserProfile {
            name: input::text_or(&form.name, &previous.name),
            age: input::parse_count_or("age", &form.age, previous.age)?,
            address: input::text_or(&form.address, &previous.address),
            household_size: input::parse_count_or(
                "household_size",
                &form.household_size,
                previous.household_size,
            )?,
            income: input::parse_amount_or("income", &form.income, previous.income)?,
            profession: input::text_or(&form.profession, &previous.profession),
            ..previous
        };
        profile.refresh(self.today(), DeadlineRule::Renewal);

        let updated = UserRecord::with_profile(
            &input::text_or(&form.password, &existing.password),
            profile,
        );
        self.users.insert(form.username.clone(), updated);
        self.persist()?;
        Ok(format!("User '{}' updated.", form.username))
    }

    pub fn remove_user(&mut self, username: &str) -> OpResult {
        self.require_admin()?;
        input::require(&[("username", username)])?;
        if username == self.admin.username {
            return Err(RegistryError::AdminProtected);
        }
        if self.users.remove(username).is_none() {
            return Err(RegistryError::UserNotFound(username.to_string()));
        }
        self.persist()?;
        Ok(format!("User '{}' removed.", username))
    }

    // ------------------------------------------------------------------
    // Sites (administrator)
    // ------------------------------------------------------------------

    pub fn list_sites(&self) -> OpResult<Vec<(&str, &SiteRecord)>> {
        self.require_admin()?;
        Ok(self
            .sites
            .iter()
            .map(|(name, site)| (name.as_str(), site))
            .collect())
    }

    pub fn create_site(&mut self, form: &SiteForm) -> OpResult {
        self.require_admin()?;
        input::require(&[
            ("name", form.name.as_str()),
            ("address", form.address.as_str()),
            ("responsible_person", form.responsible_person.as_str()),
            ("contact", form.contact.as_str()),
            ("floors", form.floors.as_str()),
            ("area_m2", form.area_m2.as_str()),
        ])?;
        if self.sites.contains_key(&form.name) {
            return Err(RegistryError::SiteExists(form.name.clone()));
        }
        let floors = input::parse_count("floors", &form.floors)?;
        let area_m2 = input::parse_amount("area_m2", &form.area_m2)?;

        let site = SiteRecord::new(
            form.address.clone(),
            form.responsible_person.clone(),
            form.contact.clone(),
            floors,
            area_m2,
        );
        self.sites.insert(form.name.clone(), site);
        self.persist()?;
        Ok(format!("Site '{}' added.", form.name))
    }

    /// Blank form fields keep the stored values
    pub fn update_site(&mut self, form: &SiteForm) -> OpResult {
        self.require_admin()?;
        input::require(&[("name", form.name.as_str())])?;
        let Some(existing) = self.sites.get(&form.name) else {
            return Err(RegistryError::SiteNotFound(form.name.clone()));
        };

        let mut site = SiteRecord {
            address: input::text_or(&form.address, &existing.address),
            responsible_person: input::text_or(
                &form.responsible_person,
                &existing.responsible_person,
            ),
            contact: input::text_or(&form.contact, &existing.contact),
            floors: input::parse_count_or("floors", &form.floors, existing.floors)?,
            area_m2: input::parse_amount_or("area_m2", &form.area_m2, existing.area_m2)?,
            ..existing.clone()
        };
        site.refresh();

        self.sites.insert(form.name.clone(), site);
        self.persist()?;
        Ok(format!("Site '{}' updated.", form.name))
    }

    pub fn remove_site(&mut self, name: &str) -> OpResult {
        self.require_admin()?;
        input::require(&[("name", name)])?;
        if self.sites.remove(name).is_none() {
            return Err(RegistryError::SiteNotFound(name.to_string()));
        }
        self.persist()?;
        Ok(format!("Site '{}' removed.", name))
    }

    // ------------------------------------------------------------------
    // Self-service (logged-in user)
    // ------------------------------------------------------------------

    /// The logged-in user's own record
    pub fn profile(&self) -> OpResult<(&str, &UserRecord)> {
        let username = self.current_user()?;
        self.users
            .get_key_value(username)
            .map(|(name, user)| (name.as_str(), user))
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))
    }

    /// Fill in or replace the logged-in user's profile. The password is kept.
    pub fn save_profile(&mut self, form: &ProfileForm) -> OpResult {
        let username = self.current_user()?.to_string();
        let parsed = form.parse()?;
        let today = self.today();

        let Some(user) = self.users.get_mut(&username) else {
            return Err(RegistryError::UserNotFound(username));
        };
        user.profile = Some(UserProfile::derive(parsed, today, DeadlineRule::Renewal));
        user.registered = true;

        self.persist()?;
        Ok("Your details have been saved.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SiteEligibility;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    fn open(dir: &TempDir) -> Registry {
        let storage = Storage::new(dir.path(), "users.json", "sites.json");
        let (registry, warnings) = Registry::open(storage, AdminConfig::default());
        assert!(warnings.is_empty());
        registry.with_today(today())
    }

    fn admin(dir: &TempDir) -> Registry {
        let mut registry = open(dir);
        registry.login("admin", "admin").unwrap();
        registry
    }

    fn user_form(username: &str, age: &str, income: &str) -> UserForm {
        UserForm {
            username: username.to_string(),
            password: "pw123".to_string(),
            name: "Maria Silva".to_string(),
            age: age.to_string(),
            address: "Rua das Hortas, 42".to_string(),
            household_size: "3".to_string(),
            income: income.to_string(),
            profession: "Cook".to_string(),
        }
    }

    fn site_form(name: &str, floors: &str, area: &str) -> SiteForm {
        SiteForm {
            name: name.to_string(),
            address: "Av. Industrial, 900".to_string(),
            responsible_person: "Paulo".to_string(),
            contact: "paulo@example.com".to_string(),
            floors: floors.to_string(),
            area_m2: area.to_string(),
        }
    }

    fn profile_of<'a>(registry: &'a Registry, username: &str) -> &'a UserProfile {
        registry
            .user(username)
            .and_then(|u| u.profile.as_ref())
            .unwrap()
    }

    #[test]
    fn test_admin_login_ignores_user_collection() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry.login("admin", "admin").unwrap();
        assert!(registry.session().is_admin());

        // An "admin" entry in the user file does not shadow the admin identity
        registry.users.insert("admin".to_string(), UserRecord::pending("other"));
        registry.logout();
        registry.login("admin", "admin").unwrap();
        assert!(registry.session().is_admin());
    }

    #[test]
    fn test_login_failures_stay_logged_out() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry.register("lia", "pw", "pw").unwrap();

        assert!(matches!(
            registry.login("lia", "PW"),
            Err(RegistryError::InvalidCredentials)
        ));
        assert!(matches!(
            registry.login("ghost", "pw"),
            Err(RegistryError::InvalidCredentials)
        ));
        assert_eq!(*registry.session(), Session::LoggedOut);

        registry.login("lia", "pw").unwrap();
        assert_eq!(registry.session().username(), Some("lia"));
        assert!(matches!(
            registry.login("admin", "admin"),
            Err(RegistryError::AlreadyLoggedIn(_))
        ));

        let ended = registry.logout();
        assert_eq!(ended, Session::User("lia".to_string()));
        assert_eq!(*registry.session(), Session::LoggedOut);
    }

    #[test]
    fn test_register_rules() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);

        assert!(matches!(
            registry.register("", "pw", "pw"),
            Err(RegistryError::MissingField("username"))
        ));
        assert!(matches!(
            registry.register("admin", "pw", "pw"),
            Err(RegistryError::UsernameTaken(_))
        ));
        assert!(matches!(
            registry.register("nina", "pw", "wp"),
            Err(RegistryError::PasswordMismatch)
        ));
        assert_eq!(registry.user_count(), 0);

        registry.register("nina", "pw", "pw").unwrap();
        assert!(registry.user("nina").unwrap().is_pending());
        assert!(matches!(
            registry.register("nina", "x", "x"),
            Err(RegistryError::UsernameTaken(_))
        ));
        assert_eq!(registry.user("nina").unwrap().password, "pw");
    }

    #[test]
    fn test_create_user_derives_fields() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();

        let user = registry.user("maria").unwrap();
        assert!(user.registered);
        let profile = profile_of(&registry, "maria");
        assert!(profile.eligible);
        assert_eq!(profile.assigned_site, "Rua das Hortas, 42");
        assert_eq!(profile.appointment_deadline, "2024-02-04");
    }

    #[test]
    fn test_create_user_ineligible() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("rico", "40", "5000")).unwrap();

        let profile = profile_of(&registry, "rico");
        assert!(!profile.eligible);
        assert_eq!(profile.assigned_site, "N/A");
        assert_eq!(profile.appointment_deadline, "N/A");
    }

    #[test]
    fn test_create_user_duplicate_leaves_collection_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();
        let before = registry.users.clone();

        let mut dup = user_form("maria", "50", "100");
        dup.name = "Someone Else".to_string();
        assert!(matches!(
            registry.create_user(&dup),
            Err(RegistryError::UsernameTaken(_))
        ));
        assert!(matches!(
            registry.create_user(&user_form("admin", "30", "100")),
            Err(RegistryError::UsernameTaken(_))
        ));
        assert_eq!(registry.users, before);
    }

    #[test]
    fn test_create_user_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);

        let mut missing = user_form("leo", "20", "1500");
        missing.profession.clear();
        assert!(matches!(
            registry.create_user(&missing),
            Err(RegistryError::MissingField("profession"))
        ));
        assert!(matches!(
            registry.create_user(&user_form("leo", "twenty", "1500")),
            Err(RegistryError::InvalidNumber { field: "age", .. })
        ));
        assert_eq!(registry.user_count(), 0);
        assert!(!registry.storage().users_path().exists());
    }

    #[test]
    fn test_update_keeps_blank_fields_and_renews_deadline() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();

        let update = UserForm {
            username: "maria".to_string(),
            income: "1800".to_string(),
            ..UserForm::default()
        };
        registry.update_user(&update).unwrap();

        let user = registry.user("maria").unwrap();
        assert_eq!(user.password, "pw123");
        let profile = profile_of(&registry, "maria");
        assert_eq!(profile.address, "Rua das Hortas, 42");
        assert_eq!(profile.name, "Maria Silva");
        assert_eq!(profile.income, 1800.0);
        assert!(profile.eligible);
        assert_eq!(profile.assigned_site, "Rua das Hortas, 42");
        assert_eq!(profile.appointment_deadline, "2024-02-19");
    }

    #[test]
    fn test_update_recomputes_eligibility() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();

        let update = UserForm {
            username: "maria".to_string(),
            income: "2500".to_string(),
            ..UserForm::default()
        };
        registry.update_user(&update).unwrap();
        let profile = profile_of(&registry, "maria");
        assert!(!profile.eligible);
        assert_eq!(profile.assigned_site, "N/A");
        assert_eq!(profile.appointment_deadline, "N/A");
    }

    #[test]
    fn test_update_invalid_number_does_not_mutate() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();
        let before = registry.user("maria").cloned();

        let update = UserForm {
            username: "maria".to_string(),
            password: "new-pass".to_string(),
            name: "Maria S.".to_string(),
            age: "21".to_string(),
            income: "a lot".to_string(),
            ..UserForm::default()
        };
        assert!(matches!(
            registry.update_user(&update),
            Err(RegistryError::InvalidNumber { field: "income", .. })
        ));
        assert_eq!(registry.user("maria").cloned(), before);
    }

    #[test]
    fn test_update_pending_user_completes_registration() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry.register("tom", "pw", "pw").unwrap();
        registry.login("admin", "admin").unwrap();

        let update = UserForm {
            username: "tom".to_string(),
            age: "19".to_string(),
            address: "Rua E".to_string(),
            ..UserForm::default()
        };
        registry.update_user(&update).unwrap();
        let user = registry.user("tom").unwrap();
        assert!(user.registered);
        assert_eq!(user.password, "pw");
        let profile = profile_of(&registry, "tom");
        assert!(profile.eligible);
        assert_eq!(profile.assigned_site, "Rua E");
    }

    #[test]
    fn test_update_and_remove_targets() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);

        let missing = UserForm {
            username: "nobody".to_string(),
            ..UserForm::default()
        };
        assert!(matches!(
            registry.update_user(&missing),
            Err(RegistryError::UserNotFound(_))
        ));
        let admin_form = UserForm {
            username: "admin".to_string(),
            ..UserForm::default()
        };
        assert!(matches!(
            registry.update_user(&admin_form),
            Err(RegistryError::AdminProtected)
        ));
        assert!(matches!(
            registry.remove_user("admin"),
            Err(RegistryError::AdminProtected)
        ));
        assert!(matches!(
            registry.remove_user("nobody"),
            Err(RegistryError::UserNotFound(_))
        ));
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn test_remove_user_persists() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();
        registry.create_user(&user_form("jose", "30", "900")).unwrap();
        registry.remove_user("maria").unwrap();

        let (reopened, _) = Registry::open(registry.storage().clone(), AdminConfig::default());
        assert!(reopened.user("maria").is_none());
        assert!(reopened.user("jose").is_some());
    }

    #[test]
    fn test_list_users_hides_admin_entry() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();
        registry.users.insert("admin".to_string(), UserRecord::pending("x"));

        let names: Vec<&str> = registry
            .list_users()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["maria"]);
    }

    #[test]
    fn test_admin_operations_require_admin_session() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        assert!(matches!(
            registry.create_user(&user_form("maria", "20", "1500")),
            Err(RegistryError::AdminRequired)
        ));
        assert!(matches!(
            registry.create_site(&site_form("Galpão", "2", "300")),
            Err(RegistryError::AdminRequired)
        ));
        assert!(registry.list_sites().is_err());

        registry.register("ana", "pw", "pw").unwrap();
        registry.login("ana", "pw").unwrap();
        assert!(matches!(
            registry.remove_user("ana"),
            Err(RegistryError::AdminRequired)
        ));
        assert!(registry.user("ana").is_some());
    }

    #[test]
    fn test_site_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);

        registry.create_site(&site_form("Galpão", "2", "300")).unwrap();
        let site = registry.site("Galpão").unwrap();
        assert_eq!(site.production_capacity, 1200.0);
        assert_eq!(site.eligible, SiteEligibility::Yes);

        assert!(matches!(
            registry.create_site(&site_form("Galpão", "1", "1")),
            Err(RegistryError::SiteExists(_))
        ));
        assert!(matches!(
            registry.create_site(&site_form("Outro", "two", "10")),
            Err(RegistryError::InvalidNumber { field: "floors", .. })
        ));

        let update = SiteForm {
            name: "Galpão".to_string(),
            floors: "1".to_string(),
            ..SiteForm::default()
        };
        registry.update_site(&update).unwrap();
        let site = registry.site("Galpão").unwrap();
        assert_eq!(site.address, "Av. Industrial, 900");
        assert_eq!(site.area_m2, 300.0);
        assert_eq!(site.production_capacity, 600.0);
        assert_eq!(site.eligible, SiteEligibility::No);

        assert!(matches!(
            registry.remove_site("Nowhere"),
            Err(RegistryError::SiteNotFound(_))
        ));
        assert_eq!(registry.site_count(), 1);
        registry.remove_site("Galpão").unwrap();
        assert_eq!(registry.site_count(), 0);
    }

    #[test]
    fn test_update_whitespace_fields_keep_previous() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();
        registry.create_site(&site_form("Estufa", "3", "100")).unwrap();

        let update = UserForm {
            username: "maria".to_string(),
            password: "  ".to_string(),
            name: "   ".to_string(),
            address: "\t".to_string(),
            ..UserForm::default()
        };
        registry.update_user(&update).unwrap();
        assert_eq!(registry.user("maria").unwrap().password, "pw123");
        let profile = profile_of(&registry, "maria");
        assert_eq!(profile.name, "Maria Silva");
        assert_eq!(profile.address, "Rua das Hortas, 42");

        let update = SiteForm {
            name: "Estufa".to_string(),
            address: "  ".to_string(),
            responsible_person: " ".to_string(),
            ..SiteForm::default()
        };
        registry.update_site(&update).unwrap();
        let site = registry.site("Estufa").unwrap();
        assert_eq!(site.address, "Av. Industrial, 900");
        assert_eq!(site.responsible_person, "Paulo");
    }

    #[test]
    fn test_update_site_bad_area_keeps_record() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_site(&site_form("Estufa", "3", "100")).unwrap();
        let before = registry.site("Estufa").cloned();

        let update = SiteForm {
            name: "Estufa".to_string(),
            contact: "new contact".to_string(),
            area_m2: "wide".to_string(),
            ..SiteForm::default()
        };
        assert!(registry.update_site(&update).is_err());
        assert_eq!(registry.site("Estufa").cloned(), before);
    }

    #[test]
    fn test_self_service_profile() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry.register("bia", "pw", "pw").unwrap();

        let form = ProfileForm {
            name: "Beatriz".to_string(),
            age: "25".to_string(),
            address: "Rua F, 7".to_string(),
            household_size: "2".to_string(),
            income: "1999.99".to_string(),
            profession: "Designer".to_string(),
        };
        assert!(matches!(
            registry.save_profile(&form),
            Err(RegistryError::NotLoggedIn)
        ));

        registry.login("bia", "pw").unwrap();
        let (name, record) = registry.profile().unwrap();
        assert_eq!(name, "bia");
        assert!(record.is_pending());

        registry.save_profile(&form).unwrap();
        let (_, record) = registry.profile().unwrap();
        assert!(!record.is_pending());
        assert_eq!(record.password, "pw");
        let profile = record.profile.as_ref().unwrap();
        assert!(profile.eligible);
        assert_eq!(profile.appointment_deadline, "2024-02-19");
    }

    #[test]
    fn test_save_profile_requires_every_field() {
        let dir = TempDir::new().unwrap();
        let mut registry = open(&dir);
        registry.register("bia", "pw", "pw").unwrap();
        registry.login("bia", "pw").unwrap();

        let form = ProfileForm {
            name: "Beatriz".to_string(),
            ..ProfileForm::default()
        };
        assert!(matches!(
            registry.save_profile(&form),
            Err(RegistryError::MissingField("age"))
        ));
        assert!(registry.user("bia").unwrap().is_pending());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_user(&user_form("maria", "20", "1500")).unwrap();
        registry.create_site(&site_form("Galpão", "2", "300")).unwrap();

        let (reopened, warnings) =
            Registry::open(registry.storage().clone(), AdminConfig::default());
        assert!(warnings.is_empty());
        assert_eq!(reopened.users, registry.users);
        assert_eq!(reopened.sites, registry.sites);
    }

    #[test]
    fn test_reload_reports_corruption() {
        let dir = TempDir::new().unwrap();
        let mut registry = admin(&dir);
        registry.create_site(&site_form("Galpão", "2", "300")).unwrap();
        std::fs::write(registry.storage().sites_path(), "not json").unwrap();

        let warnings = registry.reload();
        assert_eq!(warnings.len(), 1);
        assert_eq!(registry.site_count(), 0);
        assert!(registry.session().is_admin());
    }
}
