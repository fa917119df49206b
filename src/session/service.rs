use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;

use super::types::Identity;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::memory::ConcurrentMap;

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 16;

pub struct SessionService {
    sessions: ConcurrentMap<String, Identity>,
}

impl SessionService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: ConcurrentMap::new(),
        })
    }

    /// Issues a token for `identity`.
    ///
    /// Returns an empty string, and stores nothing, if the entropy source fails.
    /// Callers must treat an empty token as a failed login.
    pub fn login(&self, identity: Identity) -> String {
        let Some(token) = generate_token() else {
            return String::new();
        };
        tracing::info!(
            "User {} with privilege {} got a session token",
            identity.id,
            identity.privilege
        );
        self.sessions.write(token.clone(), identity);
        token
    }

    pub fn resolve(&self, token: &str) -> ServiceResult<Identity> {
        self.sessions.read(&token.to_string()).ok_or_else(|| {
            tracing::warn!("Access denied: invalid token");
            ServiceError::InvalidToken
        })
    }

    pub fn logout(&self, token: &str) -> ServiceResult<()> {
        match self.sessions.delete(&token.to_string()) {
            Some(identity) => {
                tracing::info!("User {} logged out", identity.id);
                Ok(())
            }
            None => {
                tracing::warn!("Logout failed: invalid token");
                Err(ServiceError::InvalidToken)
            }
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

fn generate_token() -> Option<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
        tracing::error!("Failed to generate random bytes for token: {}", e);
        return None;
    }
    Some(hex::encode(bytes))
}
