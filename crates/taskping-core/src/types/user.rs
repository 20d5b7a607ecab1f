//! User records as seen by the notification core (read-only).

use serde::{Deserialize, Serialize};

/// Role of a user in the study tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Partner,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Partner => write!(f, "partner"),
        }
    }
}

/// A user that may receive notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: UserRole,
    /// Phone number used as the delivery address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Opt-in flag. Unset means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_notifications_enabled: Option<bool>,
    #[serde(default, alias = "dailyStreak")]
    pub daily_streak: u32,
}

impl User {
    pub fn new(id: &str, name: &str, role: UserRole) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: String::new(),
            role,
            phone_number: None,
            sms_notifications_enabled: None,
            daily_streak: 0,
        }
    }

    /// Builder-style helper to attach a phone number.
    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone_number = Some(phone.to_string());
        self
    }

    pub fn notifications_enabled(&self) -> bool {
        self.sms_notifications_enabled.unwrap_or(true)
    }

    /// The trimmed delivery address, if any.
    pub fn address(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn is_student(&self) -> bool {
        self.role == UserRole::Student
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_default_enabled() {
        let user = User::new("u1", "Asha", UserRole::Student);
        assert!(user.notifications_enabled());

        let mut opted_out = user.clone();
        opted_out.sms_notifications_enabled = Some(false);
        assert!(!opted_out.notifications_enabled());
    }

    #[test]
    fn test_blank_address_is_none() {
        let user = User::new("u1", "Asha", UserRole::Student).with_phone("   ");
        assert_eq!(user.address(), None);

        let user = User::new("u2", "Ravi", UserRole::Partner).with_phone(" +15550001111 ");
        assert_eq!(user.address(), Some("+15550001111"));
    }

    #[test]
    fn test_deserialize_with_camel_case_streak() {
        let json = r#"{"id":"u1","name":"Asha","role":"student","dailyStreak":4}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.daily_streak, 4);
        assert!(user.is_student());
        assert!(user.phone_number.is_none());
    }
}
