use uuid::Uuid;

use crate::error::AppError;

/// A resolved, authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

/// Explicit per-request session context handed to every service call.
/// An anonymous session can read public data only.
#[derive(Debug, Clone, Default)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// The owner id for owner-scoped calls.
    pub fn owner(&self) -> Result<Uuid, AppError> {
        self.identity
            .as_ref()
            .map(|i| i.user_id)
            .ok_or(AppError::AuthenticationRequired)
    }

    pub fn require(&self) -> Result<&Identity, AppError> {
        self.identity.as_ref().ok_or(AppError::AuthenticationRequired)
    }
}

#[cfg(test)]
impl Session {
    pub fn for_user(user_id: Uuid) -> Self {
        Session::authenticated(Identity {
            user_id,
            session_id: Uuid::new_v4(),
        })
    }
}
