//! Record storage for users, profiles, achievements and notifications.
//!
//! [`DynamoStore`] is the deployed backend; [`MemoryStore`] backs local runs and tests.

pub mod dynamo;
pub mod memory;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

use std::future::Future;

use crate::filters::AchievementFilter;
use crate::types::{
    Achievement, NewAchievement, NewNotification, NewUser, Notification, ProfileFields, Status,
    StudentProfile, User,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate value for {field}")]
    Duplicate { field: &'static str },
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Achievement write checked against the status it was read with.
///
/// Committed only if the persisted status still equals `expected_status`;
/// the achievement and the optional notification land together or not at all.
#[derive(Debug, Clone)]
pub struct AchievementCommit {
    pub achievement: Achievement,
    pub expected_status: Status,
    pub notification: Option<NewNotification>,
}

pub trait Store: Send + Sync {
    // ---- users ----
    /// Fails with `Duplicate` when `student_id` or `email` is taken.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User, StoreError>> + Send;
    fn get_user(&self, id: u64) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;
    fn find_user_by_login(
        &self,
        student_id: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    // ---- profiles ----
    /// Fails with `Duplicate { field: "user" }` when the user already has one.
    fn create_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> impl Future<Output = Result<StudentProfile, StoreError>> + Send;
    fn get_profile(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<StudentProfile>, StoreError>> + Send;
    fn get_profile_for_user(
        &self,
        user_id: u64,
    ) -> impl Future<Output = Result<Option<StudentProfile>, StoreError>> + Send;
    /// Newest first.
    fn list_profiles(&self) -> impl Future<Output = Result<Vec<StudentProfile>, StoreError>> + Send;
    fn save_profile(
        &self,
        profile: &StudentProfile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // ---- achievements ----
    fn create_achievement(
        &self,
        achievement: NewAchievement,
    ) -> impl Future<Output = Result<Achievement, StoreError>> + Send;
    fn get_achievement(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<Achievement>, StoreError>> + Send;
    /// Newest first.
    fn list_achievements(
        &self,
        filter: &AchievementFilter,
    ) -> impl Future<Output = Result<Vec<Achievement>, StoreError>> + Send;
    /// Returns the notification written alongside, if any.
    fn commit_achievement(
        &self,
        commit: AchievementCommit,
    ) -> impl Future<Output = Result<Option<Notification>, StoreError>> + Send;
    /// Removes the achievement and every notification that references it.
    fn delete_achievement(&self, id: u64) -> impl Future<Output = Result<(), StoreError>> + Send;

    // ---- notifications ----
    /// Newest first.
    fn list_notifications(
        &self,
        user_id: u64,
    ) -> impl Future<Output = Result<Vec<Notification>, StoreError>> + Send;
    /// Scoped to `user_id`; another user's notification is `None`.
    fn get_notification(
        &self,
        user_id: u64,
        id: u64,
    ) -> impl Future<Output = Result<Option<Notification>, StoreError>> + Send;
    fn mark_notification_read(
        &self,
        user_id: u64,
        id: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Returns how many notifications flipped.
    fn mark_all_notifications_read(
        &self,
        user_id: u64,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

pub(crate) fn newest_first_achievements(items: &mut [Achievement]) {
    items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

pub(crate) fn newest_first_notifications(items: &mut [Notification]) {
    items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

pub(crate) fn newest_first_profiles(items: &mut [StudentProfile]) {
    items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}
