//! External HTTP Boundary (C10) — read-only query functions for the
//! out-of-scope HTTP front-end (spec.md §1 "out of scope"). No HTTP
//! framework is wired in here; these are the functions such a front-end
//! would call directly, matching "consumers of the engine, not part of it."

use crate::adapters::TitleRef;
use crate::history::{EventType, HistoryEvent, HistoryStore};
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct KeepRequestSummary {
    pub manager_kind: String,
    pub manager_id: i64,
    pub requester: String,
    pub requested_at: String,
    pub expires_at: String,
}

/// Keep-requests still awaiting an admin decision.
pub async fn pending_keep_requests(history: &HistoryStore) -> anyhow::Result<Vec<KeepRequestSummary>> {
    let rows = sqlx::query(
        "SELECT manager_kind, manager_id, requester, requested_at, expires_at
         FROM keep_requests
         WHERE resolved_at IS NULL
         ORDER BY requested_at ASC",
    )
    .fetch_all(history.pool())
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| KeepRequestSummary {
            manager_kind: row.get("manager_kind"),
            manager_id: row.get("manager_id"),
            requester: row.get("requester"),
            requested_at: row.get("requested_at"),
            expires_at: row.get("expires_at"),
        })
        .collect())
}

/// Most recent lifecycle events, optionally filtered by type.
pub async fn recent_history(
    history: &HistoryStore,
    limit: i64,
    filter: Option<EventType>,
) -> anyhow::Result<Vec<HistoryEvent>> {
    history.list_recent(limit, filter).await
}

/// Full event history for a single title, newest first.
pub async fn title_status(history: &HistoryStore, reference: &TitleRef) -> anyhow::Result<Vec<HistoryEvent>> {
    history.list_for_title(reference).await
}
