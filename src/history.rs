//! History Store (C8) — append-only audit log of lifecycle events (§4.8),
//! backed by `sqlx`/SQLite. The core only owns `media` snapshots and
//! `history_events`; `users` and `keep_requests` are written as a side
//! effect for the out-of-scope HTTP front-end to read (§6 "persisted state
//! layout").

use crate::adapters::TitleRef;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteQueryResult};
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Marked,
    KeepRequested,
    KeepAccepted,
    KeepDeclined,
    ForceKept,
    Deleted,
    Unmonitored,
    Ignored,
}

impl EventType {
    fn as_str(&self) -> &'static str {
        match self {
            EventType::Marked => "marked",
            EventType::KeepRequested => "keep_requested",
            EventType::KeepAccepted => "keep_accepted",
            EventType::KeepDeclined => "keep_declined",
            EventType::ForceKept => "force_kept",
            EventType::Deleted => "deleted",
            EventType::Unmonitored => "unmonitored",
            EventType::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryEvent {
    pub id: String,
    pub manager_kind: String,
    pub manager_id: i64,
    pub library: String,
    pub title: String,
    pub year: Option<i32>,
    pub event_type: String,
    pub actor: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(reference: &TitleRef, event_type: EventType, actor: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            manager_kind: reference.manager_kind.as_str().to_string(),
            manager_id: reference.manager_id as i64,
            library: reference.library.clone(),
            title: reference.title.clone(),
            year: reference.year,
            event_type: event_type.as_str().to_string(),
            actor: actor.map(str::to_owned),
            occurred_at: Utc::now(),
        }
    }
}

pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn connect(database_path: &str) -> anyhow::Result<Self> {
        let url = format!("sqlite://{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn record(&self, event: HistoryEvent) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO history_events
                (id, manager_kind, manager_id, library, title, year, event_type, actor, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.manager_kind)
        .bind(event.manager_id)
        .bind(&event.library)
        .bind(&event.title)
        .bind(event.year)
        .bind(&event.event_type)
        .bind(&event.actor)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;

        self.upsert_media(&event).await?;
        Ok(())
    }

    async fn upsert_media(&self, event: &HistoryEvent) -> anyhow::Result<SqliteQueryResult> {
        Ok(sqlx::query(
            "INSERT INTO media (manager_kind, manager_id, library, title, year)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(manager_kind, manager_id)
             DO UPDATE SET library = excluded.library, title = excluded.title, year = excluded.year",
        )
        .bind(&event.manager_kind)
        .bind(event.manager_id)
        .bind(&event.library)
        .bind(&event.title)
        .bind(event.year)
        .execute(&self.pool)
        .await?)
    }

    pub async fn list_for_title(&self, reference: &TitleRef) -> anyhow::Result<Vec<HistoryEvent>> {
        let events = sqlx::query_as::<_, HistoryEvent>(
            "SELECT id, manager_kind, manager_id, library, title, year, event_type, actor, occurred_at
             FROM history_events
             WHERE manager_kind = ? AND manager_id = ?
             ORDER BY occurred_at DESC",
        )
        .bind(reference.manager_kind.as_str())
        .bind(reference.manager_id as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn list_recent(&self, limit: i64, event_type: Option<EventType>) -> anyhow::Result<Vec<HistoryEvent>> {
        let events = match event_type {
            Some(t) => {
                sqlx::query_as::<_, HistoryEvent>(
                    "SELECT id, manager_kind, manager_id, library, title, year, event_type, actor, occurred_at
                     FROM history_events
                     WHERE event_type = ?
                     ORDER BY occurred_at DESC
                     LIMIT ?",
                )
                .bind(t.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, HistoryEvent>(
                    "SELECT id, manager_kind, manager_id, library, title, year, event_type, actor, occurred_at
                     FROM history_events
                     ORDER BY occurred_at DESC
                     LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(events)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Denormalized snapshot for the out-of-scope HTTP front-end (§6). The
    /// core never reads this table back; it only writes it as a side effect
    /// of a keep-request submission.
    pub async fn insert_keep_request(
        &self,
        reference: &TitleRef,
        requester: &str,
        requested_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO keep_requests
                (id, manager_kind, manager_id, requester, requested_at, expires_at, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(reference.manager_kind.as_str())
        .bind(reference.manager_id as i64)
        .bind(requester)
        .bind(requested_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks the most recent unresolved keep-request for this title as
    /// resolved. A no-op if none is open (e.g. a `force_keep` that never
    /// went through the keep-request flow).
    pub async fn resolve_keep_request(&self, reference: &TitleRef) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE keep_requests SET resolved_at = ?
             WHERE id = (
                 SELECT id FROM keep_requests
                 WHERE manager_kind = ? AND manager_id = ? AND resolved_at IS NULL
                 ORDER BY requested_at DESC
                 LIMIT 1
             )",
        )
        .bind(Utc::now())
        .bind(reference.manager_kind.as_str())
        .bind(reference.manager_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts the streaming-server's user directory (§6 "users ... via the
    /// streaming-server /Users lookup"). Called once per pipeline run, never
    /// read back by the core itself.
    pub async fn sync_user(&self, streaming_server_id: &str, username: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (streaming_server_id, username) VALUES (?, ?)
             ON CONFLICT(streaming_server_id) DO UPDATE SET username = excluded.username",
        )
        .bind(streaming_server_id)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ManagerKind;

    fn reference() -> TitleRef {
        TitleRef {
            manager_kind: ManagerKind::Movie,
            manager_id: 42,
            streaming_server_id: "abc".into(),
            library: "Movies".into(),
            title: "The Foo".into(),
            year: Some(2020),
            tmdb_id: None,
        }
    }

    #[tokio::test]
    async fn test_record_and_list_for_title() -> anyhow::Result<()> {
        let store = HistoryStore::connect(":memory:").await?;
        let reference = reference();
        store
            .record(HistoryEvent::new(&reference, EventType::Marked, None))
            .await?;
        store
            .record(HistoryEvent::new(&reference, EventType::Deleted, Some("admin")))
            .await?;

        let events = store.list_for_title(&reference).await?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "deleted");
        assert_eq!(events[1].event_type, "marked");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_recent_filters_by_event_type() -> anyhow::Result<()> {
        let store = HistoryStore::connect(":memory:").await?;
        let reference = reference();
        store
            .record(HistoryEvent::new(&reference, EventType::Marked, None))
            .await?;
        store
            .record(HistoryEvent::new(&reference, EventType::Deleted, None))
            .await?;

        let deleted = store.list_recent(10, Some(EventType::Deleted)).await?;
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].event_type, "deleted");
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_keep_request_marks_latest_open_one() -> anyhow::Result<()> {
        let store = HistoryStore::connect(":memory:").await?;
        let reference = reference();
        let now = Utc::now();
        store
            .insert_keep_request(&reference, "alice", now, now + chrono::Duration::days(30))
            .await?;
        store.resolve_keep_request(&reference).await?;

        let resolved_at: Option<String> =
            sqlx::query_scalar("SELECT resolved_at FROM keep_requests WHERE requester = 'alice'")
                .fetch_one(store.pool())
                .await?;
        assert!(resolved_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_user_upserts_on_conflict() -> anyhow::Result<()> {
        let store = HistoryStore::connect(":memory:").await?;
        store.sync_user("srv-1", "alice").await?;
        store.sync_user("srv-1", "alice_renamed").await?;

        let username: String =
            sqlx::query_scalar("SELECT username FROM users WHERE streaming_server_id = 'srv-1'")
                .fetch_one(store.pool())
                .await?;
        assert_eq!(username, "alice_renamed");
        Ok(())
    }
}
