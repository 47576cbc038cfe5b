use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::auth::decoder::DecodedToken;

/// The identity embedded in a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub authority: BTreeSet<String>,
    #[serde(default)]
    pub is_first_login: bool,
}

impl UserIdentity {
    /// Derive the identity from access-token claims plus the login response flag.
    pub fn from_claims(decoded: &DecodedToken, is_first_login: bool) -> Self {
        UserIdentity {
            id: decoded.subject.clone(),
            name: decoded
                .username
                .clone()
                .unwrap_or_else(|| decoded.subject.clone()),
            email: decoded.email.clone(),
            authority: decoded.roles.iter().cloned().collect(),
            is_first_login,
        }
    }
}
