/// Session state
///
/// Keeps the locally cached profile consistent with the identity provider's
/// session: the cache either holds the active user's profile or nothing.

pub mod cache;
pub mod reconciler;

pub use cache::SessionCache;
pub use reconciler::SessionReconciler;

use crate::store::{Profile, PLACEHOLDER_NAME};
use serde::Serialize;

/// What the application currently knows about the user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthState {
    LoggedOut,
    /// Profile is None until the fetch resolves, or after it failed
    Authenticated {
        user_id: String,
        profile: Option<Profile>,
    },
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::LoggedOut => None,
            AuthState::Authenticated { user_id, .. } => Some(user_id),
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            AuthState::LoggedOut => None,
            AuthState::Authenticated { profile, .. } => profile.as_ref(),
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            AuthState::LoggedOut => None,
            AuthState::Authenticated { profile, .. } => Some(
                profile
                    .as_ref()
                    .map(Profile::display_name)
                    .unwrap_or(PLACEHOLDER_NAME),
            ),
        }
    }
}
