//! Best-effort notification fan-out.
//!
//! Notifications and bus events are side effects of business operations;
//! a failure here is logged and swallowed, never bubbled up to fail the
//! operation that triggered it.

use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

pub async fn notify(
    state: &AppState,
    user_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
    link: &str,
) {
    let result = sqlx::query(
        "INSERT INTO notifications (id, user_id, title, message, type, link, is_read, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .bind(link)
    .execute(&state.db)
    .await;

    if let Err(e) = result {
        tracing::warn!(%user_id, error = %e, "failed to deliver notification");
    }
}

/// Notify every admin-role account.
pub async fn notify_admins(state: &AppState, title: &str, message: &str, kind: &str, link: &str) {
    let admins: Vec<(Uuid,)> = match sqlx::query_as("SELECT id FROM users WHERE role = 'admin'")
        .fetch_all(&state.db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "failed to look up admin accounts");
            return;
        }
    };
    for (admin_id,) in admins {
        notify(state, admin_id, title, message, kind, link).await;
    }
}

/// Publish a domain event to the bus, if one is connected.
pub async fn publish_event(state: &AppState, subject: &str, payload: Value) {
    if let Some(nats) = &state.nats {
        if let Err(e) = nats
            .publish(subject.to_string(), payload.to_string().into())
            .await
        {
            tracing::warn!(subject, error = %e, "failed to publish event");
        }
    }
}
