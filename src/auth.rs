//! Password hashing and token sessions for the operator API.
//!
//! Passwords are stored as `salt:digest` where both halves are hex and the
//! digest is SHA-256 over salt-bytes then password-bytes. Tokens are 32
//! random bytes, hex-encoded, held in an in-memory store with a TTL.

use chrono::Utc;
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::{Employee, Ms};

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}:{}", hex::encode(salt), digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    digest(&salt, password) == digest_hex
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub employee_id: Uuid,
    pub groups: Vec<String>,
    pub expires_at: Ms,
}

/// In-memory token → session map. Groups are copied into the session at
/// login so authorization does not chase the employee record on every
/// request; changing an employee's groups takes effect at next login.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl_ms: Ms,
}

impl SessionStore {
    pub fn new(ttl_ms: Ms) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl_ms,
        }
    }

    pub fn issue(&self, employee: &Employee, now: Ms) -> Session {
        let session = Session {
            token: generate_token(),
            employee_id: employee.id,
            groups: employee.groups.clone(),
            expires_at: now + self.ttl_ms,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        session
    }

    /// Look up a token. Expired sessions are dropped on the spot.
    pub fn authenticate(&self, token: &str, now: Ms) -> Option<Session> {
        let session = self.sessions.get(token)?.value().clone();
        if session.expires_at <= now {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    /// Invalidate every session belonging to one employee, e.g. after the
    /// account is deleted or terminated.
    pub fn revoke_employee(&self, employee_id: Uuid) {
        self.sessions.retain(|_, s| s.employee_id != employee_id);
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
    }

    pub fn purge_expired(&self, now: Ms) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        let purged = before - self.sessions.len();
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        purged
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn employee(groups: &[&str]) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            username: "mgrant".into(),
            password_hash: hash_password("hunter2hunter2"),
            email: "m.grant@example.com".into(),
            first_name: "Morgan".into(),
            last_name: "Grant".into(),
            position: "Receptionist".into(),
            department: "Front Desk".into(),
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 15),
            date_of_termination: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn password_roundtrip() {
        let stored = hash_password("hunter2hunter2");
        assert!(verify_password("hunter2hunter2", &stored));
        assert!(!verify_password("hunter3hunter3", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "no-colon"));
        assert!(!verify_password("anything", "zz:not-hex"));
    }

    #[test]
    fn sessions_expire_and_purge() {
        let store = SessionStore::new(1_000);
        let e = employee(&["IT"]);
        let session = store.issue(&e, 0);

        assert!(store.authenticate(&session.token, 500).is_some());
        assert!(store.authenticate(&session.token, 1_000).is_none());
        // The expired lookup already dropped it.
        assert_eq!(store.active_count(), 0);

        let session = store.issue(&e, 0);
        assert_eq!(store.purge_expired(2_000), 1);
        assert!(store.authenticate(&session.token, 500).is_none());
    }

    #[test]
    fn revoke_drops_all_of_an_employees_sessions() {
        let store = SessionStore::new(10_000);
        let a = employee(&["IT"]);
        let b = employee(&["IT"]);
        let sa1 = store.issue(&a, 0);
        let sa2 = store.issue(&a, 0);
        let sb = store.issue(&b, 0);

        store.revoke_employee(a.id);
        assert!(store.authenticate(&sa1.token, 1).is_none());
        assert!(store.authenticate(&sa2.token, 1).is_none());
        assert!(store.authenticate(&sb.token, 1).is_some());
    }

    #[test]
    fn unknown_token_rejected() {
        let store = SessionStore::new(10_000);
        assert!(store.authenticate("deadbeef", 0).is_none());
    }
}
