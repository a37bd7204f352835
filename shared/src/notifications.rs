use lambda_http::http::StatusCode;
use serde_json::json;

use crate::access::Caller;
use crate::blobs::BlobStore;
use crate::error::ApiError;
use crate::http::{json_response, ApiResult};
use crate::store::Store;
use crate::AppState;

pub async fn list<S: Store, B: BlobStore>(state: &AppState<S, B>, caller: &Caller) -> ApiResult {
    let user = caller.user()?;
    let notifications = state.store.list_notifications(user.id).await?;
    json_response(StatusCode::OK, &notifications)
}

pub async fn get<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
) -> ApiResult {
    let user = caller.user()?;
    let notification = state
        .store
        .get_notification(user.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;
    json_response(StatusCode::OK, &notification)
}

pub async fn mark_read<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
) -> ApiResult {
    let user = caller.user()?;
    state.store.mark_notification_read(user.id, id).await?;
    json_response(StatusCode::OK, &json!({"status": "marked as read"}))
}

pub async fn mark_all_read<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
) -> ApiResult {
    let user = caller.user()?;
    let flipped = state.store.mark_all_notifications_read(user.id).await?;
    tracing::info!("Marked {} notifications read for user {}", flipped, user.id);
    json_response(StatusCode::OK, &json!({"status": "all marked as read"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AchievementCommit;
    use crate::testing::{caller, json, state, TestState};
    use crate::types::{Achievement, Category, NewAchievement, NewNotification, Role, Status};

    async fn notify(state: &TestState, student: u64, title: &str) -> u64 {
        let achievement = state
            .store
            .create_achievement(NewAchievement {
                student,
                student_name: "s".to_string(),
                title: title.to_string(),
                description: "d".to_string(),
                category: Category::Cultural,
                proof_document: None,
                achievement_date: None,
            })
            .await
            .unwrap();
        let notification = state
            .store
            .commit_achievement(AchievementCommit {
                achievement: Achievement {
                    status: Status::Verified,
                    ..achievement.clone()
                },
                expected_status: Status::Pending,
                notification: Some(NewNotification {
                    user: student,
                    achievement: achievement.id,
                    achievement_title: title.to_string(),
                    message: format!("Your achievement \"{}\" has been verified.", title),
                }),
            })
            .await
            .unwrap();
        notification.unwrap().id
    }

    #[tokio::test]
    async fn mark_all_read_touches_only_the_callers_unread() {
        let state = state();
        let a = caller(&state, "21CS001", Role::Student).await;
        let b = caller(&state, "21CS002", Role::Student).await;
        let a_id = a.user().unwrap().id;
        let b_id = b.user().unwrap().id;

        let already_read = notify(&state, a_id, "One").await;
        notify(&state, a_id, "Two").await;
        notify(&state, b_id, "Theirs").await;
        mark_read(&state, &a, already_read).await.unwrap();

        let response = mark_all_read(&state, &a).await.unwrap();
        assert_eq!(json(&response)["status"], "all marked as read");

        let mine = state.store.list_notifications(a_id).await.unwrap();
        assert!(mine.iter().all(|n| n.is_read));
        let theirs = state.store.list_notifications(b_id).await.unwrap();
        assert!(theirs.iter().all(|n| !n.is_read));
    }

    #[tokio::test]
    async fn foreign_notifications_are_not_found() {
        let state = state();
        let a = caller(&state, "21CS001", Role::Student).await;
        let b = caller(&state, "21CS002", Role::Student).await;
        let id = notify(&state, a.user().unwrap().id, "Mine").await;

        let response = get(&state, &a, id).await.unwrap();
        assert_eq!(json(&response)["achievement_title"], "Mine");
        assert_eq!(get(&state, &b, id).await.unwrap_err().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            mark_read(&state, &b, id).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );

        let listed = json(&list(&state, &b).await.unwrap());
        assert!(listed.as_array().unwrap().is_empty());

        let response = mark_read(&state, &a, id).await.unwrap();
        assert_eq!(json(&response)["status"], "marked as read");
        assert_eq!(
            list(&state, &Caller::Anonymous).await.unwrap_err().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
