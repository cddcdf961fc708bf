//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Live session table, keyed by bearer token
pub type SessionTable = HashMap<String, Session>;

/// A user account as held by a user store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Case-sensitive unique key
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Create a user with a freshly generated identifier
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: password_hash.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// An authenticated session.
///
/// Username and roles are a snapshot taken at login time; later changes to
/// the owning [`User`] do not reach sessions that already exist. The expiry
/// is fixed at creation and never extended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is expired from its expiry instant onwards
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Redacted projection without the bearer token
    pub fn view(&self) -> SessionView {
        SessionView::from(self)
    }
}

/// Session projection for administrative listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            roles: session.roles.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_session() -> Session {
        let created_at = Utc.with_ymd_and_hms(2026, 2, 16, 0, 0, 0).unwrap();
        Session {
            id: "sid-1".to_string(),
            token: "tok-1".to_string(),
            user_id: "u-1".to_string(),
            username: "admin".to_string(),
            roles: vec!["admin".to_string()],
            created_at,
            expires_at: created_at + Duration::seconds(60),
        }
    }

    #[test]
    fn test_session_expiry_boundary() {
        let session = sample_session();

        assert!(!session.is_expired(session.created_at));
        assert!(!session.is_expired(session.expires_at - Duration::nanoseconds(1)));
        assert!(session.is_expired(session.expires_at));
        assert!(session.is_expired(session.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_view_drops_token() {
        let session = sample_session();
        let view = session.view();

        assert_eq!(view.id, session.id);
        assert_eq!(view.roles, session.roles);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("token").is_none());
    }

    #[test]
    fn test_user_roles() {
        let user = User::new("alice", "hash").with_roles(["admin", "ops"]);

        assert!(!user.id.is_empty());
        assert!(user.has_role("ops"));
        assert!(!user.has_role("Admin"));
    }

    #[test]
    fn test_session_json_round_trip_keeps_nanoseconds() {
        let mut session = sample_session();
        session.created_at = session.created_at + Duration::nanoseconds(123_456_789);

        let json = serde_json::to_string(&session).unwrap();
        let decoded: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, session);
    }
}
