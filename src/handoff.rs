//! Plaintext passwords of freshly provisioned coordinators, kept only in
//! process memory and only for as long as the admin session that created
//! them. Nothing here is ever written to the store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
struct SessionCredentials {
    expires_at: DateTime<Utc>,
    credentials: Vec<IssuedCredential>,
}

impl SessionCredentials {
    fn live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Default)]
pub struct CredentialHandoff {
    by_session: RwLock<HashMap<String, SessionCredentials>>,
}

impl CredentialHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `credential` until `session` ends. Entries of sessions that have
    /// already expired are dropped on the way.
    pub async fn remember(
        &self,
        session: &str,
        expires_at: DateTime<Utc>,
        credential: IssuedCredential,
    ) {
        let now = Utc::now();
        let mut sessions = self.by_session.write().await;
        sessions.retain(|_, held| held.live(now));
        sessions
            .entry(session.to_string())
            .or_insert_with(|| SessionCredentials {
                expires_at,
                credentials: Vec::new(),
            })
            .credentials
            .push(credential);
    }

    pub async fn list(&self, session: &str) -> Vec<IssuedCredential> {
        let now = Utc::now();
        self.by_session
            .read()
            .await
            .get(session)
            .filter(|held| held.live(now))
            .map(|held| held.credentials.clone())
            .unwrap_or_default()
    }

    /// Drop a credential everywhere, e.g. once its account is deleted.
    pub async fn forget_email(&self, email: &str) {
        let mut sessions = self.by_session.write().await;
        for held in sessions.values_mut() {
            held.credentials
                .retain(|c| !c.email.eq_ignore_ascii_case(email));
        }
    }

    pub async fn evict(&self, session: &str) {
        self.by_session.write().await.remove(session);
    }

    /// Sessions currently holding credentials, expired or not.
    pub async fn held_sessions(&self) -> usize {
        self.by_session.read().await.len()
    }
}
