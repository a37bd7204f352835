//! Status transitions and the notifications they produce.

use chrono::Utc;

use crate::store::{AchievementCommit, Store, StoreError};
use crate::types::{Achievement, NewNotification, Notification, Status};

pub fn notification_message(title: &str, status: Status, notes: &str) -> String {
    let mut message = format!("Your achievement \"{}\" has been {}.", title, status);
    if !notes.is_empty() {
        message.push_str(" Note: ");
        message.push_str(notes);
    }
    message
}

/// Notification owed when `next` moves from the persisted `prior` status into
/// a reviewed state. `None` on creation or when the status did not change.
pub fn status_notification(
    prior: Option<&Achievement>,
    next: &Achievement,
) -> Option<NewNotification> {
    let prior = prior?;
    if prior.status == next.status || next.status == Status::Pending {
        return None;
    }
    Some(NewNotification {
        user: next.student,
        achievement: next.id,
        achievement_title: next.title.clone(),
        message: notification_message(&next.title, next.status, &next.verification_notes),
    })
}

/// Persists `next` over `prior` as one conditional write, together with any
/// notification the change triggers. Fails with `Conflict` if the stored
/// status moved since `prior` was read.
pub async fn apply<S: Store>(
    store: &S,
    prior: &Achievement,
    mut next: Achievement,
) -> Result<(Achievement, Option<Notification>), StoreError> {
    next.id = prior.id;
    next.student = prior.student;
    next.created_at = prior.created_at;
    next.updated_at = Utc::now();

    let notification = status_notification(Some(prior), &next);
    let written = store
        .commit_achievement(AchievementCommit {
            achievement: next.clone(),
            expected_status: prior.status,
            notification,
        })
        .await?;
    if let Some(n) = &written {
        tracing::info!(
            "Achievement {} moved {} -> {}, notified user {}",
            next.id,
            prior.status,
            next.status,
            n.user
        );
    }
    Ok((next, written))
}
