use serde::{Deserialize, Serialize};

use crate::account::types::Privilege;

/// Identity snapshot taken at login. Not refreshed if the account changes later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub privilege: Privilege,
}

impl Identity {
    pub fn new(id: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            id: id.into(),
            privilege,
        }
    }
}
