use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::{LibError, Result};

/// Role string the back end assigns to administrators.
pub const ROLE_ADMIN: &str = "ADMIN";
/// Role string the back end assigns to clinical staff.
pub const ROLE_DOCTOR: &str = "DOCTOR";

/// Roles that may change reporting lines.
pub const ORG_CHART_EDITOR_ROLES: &[&str] = &[ROLE_ADMIN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Doctor,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Doctor => ROLE_DOCTOR,
        }
    }

    pub fn from_role_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            ROLE_ADMIN => Some(Role::Admin),
            ROLE_DOCTOR => Some(Role::Doctor),
            _ => None,
        }
    }

    pub fn can_edit_org_chart(self) -> bool {
        ORG_CHART_EDITOR_ROLES.contains(&self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// The signed-in user, handed to the controller at construction. Populated
/// after the session check and cleared on logout; clones share the same
/// state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    user: Arc<RwLock<Option<SessionUser>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: SessionUser) -> Self {
        let session = Self::new();
        session.populate(user);
        session
    }

    pub fn populate(&self, user: SessionUser) {
        tracing::debug!(user_id = user.id, role = user.role.as_str(), "session populated");
        let mut slot = self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(user);
    }

    pub fn clear(&self) {
        let mut slot = self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.take().is_some() {
            tracing::debug!("session cleared");
        }
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.user
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn require_org_chart_editor(&self) -> Result<SessionUser> {
        let Some(user) = self.user() else {
            return Err(LibError::forbidden(
                "Sign in to edit the org chart",
                anyhow!("no active session"),
            ));
        };
        if !user.role.can_edit_org_chart() {
            return Err(LibError::forbidden(
                "Only administrators can edit the org chart",
                anyhow!("user {} has role {}", user.id, user.role.as_str()),
            ));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn user(role: Role) -> SessionUser {
        SessionUser {
            id: 1,
            username: "admin".to_string(),
            role,
        }
    }

    #[test]
    fn only_admins_edit_the_chart() {
        let session = SessionContext::signed_in(user(Role::Admin));
        assert!(session.require_org_chart_editor().is_ok());

        session.populate(user(Role::Doctor));
        let err = session
            .require_org_chart_editor()
            .expect_err("doctors cannot edit");
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[test]
    fn clearing_the_session_revokes_access() {
        let session = SessionContext::signed_in(user(Role::Admin));
        let shared = session.clone();
        session.clear();
        assert!(shared.user().is_none());
        assert!(shared.require_org_chart_editor().is_err());
    }

    #[test]
    fn role_names_parse_case_insensitively() {
        assert_eq!(Role::from_role_name("admin"), Some(Role::Admin));
        assert_eq!(Role::from_role_name(" DOCTOR "), Some(Role::Doctor));
        assert_eq!(Role::from_role_name("nurse"), None);
        let parsed: SessionUser =
            serde_json::from_str(r#"{"id": 3, "username": "d", "role": "DOCTOR"}"#)
                .expect("session user should deserialize");
        assert_eq!(parsed.role, Role::Doctor);
    }
}
