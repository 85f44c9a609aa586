use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::{now_ms, SessionStore};
use crate::engine::Engine;

/// Background task that periodically drops expired operator sessions.
pub async fn run_session_reaper(sessions: Arc<SessionStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let purged = sessions.purge_expired(now_ms());
        if purged > 0 {
            info!("reaped {purged} expired sessions");
        }
    }
}

/// Background task that rewrites the WAL once enough appends have piled
/// up since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => tracing::error!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::model::Employee;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[tokio::test]
    async fn purge_is_what_the_reaper_runs() {
        let sessions = SessionStore::new(0);
        let employee = Employee {
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
            groups: vec!["IT".into()],
        };
        sessions.issue(&employee, now_ms() - 1);
        assert_eq!(sessions.purge_expired(now_ms()), 1);
        assert_eq!(sessions.active_count(), 0);
    }
}
