use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{
    newest_first_achievements, newest_first_notifications, newest_first_profiles,
    AchievementCommit, Store, StoreError,
};
use crate::filters::AchievementFilter;
use crate::types::{
    Achievement, NewAchievement, NewUser, Notification, ProfileFields, StudentProfile, User,
};

/// Process-local store. One lock covers every table, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    last_user_id: u64,
    last_profile_id: u64,
    last_achievement_id: u64,
    last_notification_id: u64,
    users: BTreeMap<u64, User>,
    profiles: BTreeMap<u64, StudentProfile>,
    achievements: BTreeMap<u64, Achievement>,
    notifications: BTreeMap<u64, Notification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.student_id == user.student_id) {
            return Err(StoreError::Duplicate { field: "student_id" });
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        t.last_user_id += 1;
        let created = User {
            id: t.last_user_id,
            student_id: user.student_id,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: true,
            is_superuser: false,
            date_joined: Utc::now(),
        };
        t.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, student_id: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users.values().find(|u| u.student_id == student_id).cloned())
    }

    async fn create_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> Result<StudentProfile, StoreError> {
        let mut t = self.tables.lock();
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("User {}", user_id)));
        }
        if t.profiles.values().any(|p| p.user_id == user_id) {
            return Err(StoreError::Duplicate { field: "user" });
        }
        t.last_profile_id += 1;
        let now = Utc::now();
        let mut profile = StudentProfile {
            id: t.last_profile_id,
            user_id,
            profile_picture: None,
            bio: String::new(),
            department: String::new(),
            year: String::new(),
            cgpa: None,
            phone: String::new(),
            linkedin_url: String::new(),
            github_url: String::new(),
            created_at: now,
            updated_at: now,
        };
        profile.apply(fields);
        t.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, id: u64) -> Result<Option<StudentProfile>, StoreError> {
        Ok(self.tables.lock().profiles.get(&id).cloned())
    }

    async fn get_profile_for_user(
        &self,
        user_id: u64,
    ) -> Result<Option<StudentProfile>, StoreError> {
        let t = self.tables.lock();
        Ok(t.profiles.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<StudentProfile>, StoreError> {
        let mut profiles: Vec<_> = self.tables.lock().profiles.values().cloned().collect();
        newest_first_profiles(&mut profiles);
        Ok(profiles)
    }

    async fn save_profile(&self, profile: &StudentProfile) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        match t.profiles.get_mut(&profile.id) {
            Some(existing) => {
                *existing = profile.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Profile {}", profile.id))),
        }
    }

    async fn create_achievement(
        &self,
        achievement: NewAchievement,
    ) -> Result<Achievement, StoreError> {
        let mut t = self.tables.lock();
        t.last_achievement_id += 1;
        let now = Utc::now();
        let created = Achievement {
            id: t.last_achievement_id,
            student: achievement.student,
            student_name: achievement.student_name,
            title: achievement.title,
            description: achievement.description,
            category: achievement.category,
            status: crate::types::Status::Pending,
            proof_document: achievement.proof_document,
            achievement_date: achievement.achievement_date,
            verified_by: None,
            verified_by_name: None,
            verification_notes: String::new(),
            created_at: now,
            updated_at: now,
        };
        t.achievements.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_achievement(&self, id: u64) -> Result<Option<Achievement>, StoreError> {
        Ok(self.tables.lock().achievements.get(&id).cloned())
    }

    async fn list_achievements(
        &self,
        filter: &AchievementFilter,
    ) -> Result<Vec<Achievement>, StoreError> {
        let mut items: Vec<_> = self
            .tables
            .lock()
            .achievements
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        newest_first_achievements(&mut items);
        Ok(items)
    }

    async fn commit_achievement(
        &self,
        commit: AchievementCommit,
    ) -> Result<Option<Notification>, StoreError> {
        let mut t = self.tables.lock();
        let id = commit.achievement.id;
        let current = t
            .achievements
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Achievement {}", id)))?;
        if current.status != commit.expected_status {
            return Err(StoreError::Conflict(format!(
                "Achievement {} changed status concurrently",
                id
            )));
        }

        let notification = commit.notification.map(|n| {
            t.last_notification_id += 1;
            Notification {
                id: t.last_notification_id,
                user: n.user,
                achievement: n.achievement,
                achievement_title: n.achievement_title,
                message: n.message,
                is_read: false,
                created_at: Utc::now(),
            }
        });
        if let Some(n) = &notification {
            t.notifications.insert(n.id, n.clone());
        }
        t.achievements.insert(id, commit.achievement);
        Ok(notification)
    }

    async fn delete_achievement(&self, id: u64) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if t.achievements.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("Achievement {}", id)));
        }
        t.notifications.retain(|_, n| n.achievement != id);
        Ok(())
    }

    async fn list_notifications(&self, user_id: u64) -> Result<Vec<Notification>, StoreError> {
        let mut items: Vec<_> = self
            .tables
            .lock()
            .notifications
            .values()
            .filter(|n| n.user == user_id)
            .cloned()
            .collect();
        newest_first_notifications(&mut items);
        Ok(items)
    }

    async fn get_notification(
        &self,
        user_id: u64,
        id: u64,
    ) -> Result<Option<Notification>, StoreError> {
        let t = self.tables.lock();
        Ok(t.notifications.get(&id).filter(|n| n.user == user_id).cloned())
    }

    async fn mark_notification_read(&self, user_id: u64, id: u64) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        match t.notifications.get_mut(&id) {
            Some(n) if n.user == user_id => {
                n.is_read = true;
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("Notification {}", id))),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: u64) -> Result<usize, StoreError> {
        let mut t = self.tables.lock();
        let mut flipped = 0;
        for n in t.notifications.values_mut() {
            if n.user == user_id && !n.is_read {
                n.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}
