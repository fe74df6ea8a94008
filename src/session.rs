//! Login state for the single interactive session.

/// Who is currently logged in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    LoggedOut,
    Admin,
    User(String),
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        !matches!(self, Self::LoggedOut)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Username of a regular user session
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::User(name) => Some(name),
            _ => None,
        }
    }

    /// Label for prompts and status lines
    pub fn label(&self, admin_name: &str) -> String {
        match self {
            Self::LoggedOut => "logged out".to_string(),
            Self::Admin => format!("{} (administrator)", admin_name),
            Self::User(name) => name.clone(),
        }
    }
}
