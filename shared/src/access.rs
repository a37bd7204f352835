//! Role and ownership checks. The only place that inspects [`Role`].

use crate::error::ApiError;
use crate::types::{Achievement, Role, StudentProfile, User};

/// Who is making the request.
#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    User(User),
}

impl Caller {
    /// The authenticated user, or 401.
    pub fn user(&self) -> Result<&User, ApiError> {
        match self {
            Caller::User(user) => Ok(user),
            Caller::Anonymous => Err(ApiError::unauthenticated()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementAction {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
    ListOwn,
    ListPending,
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAction {
    List,
    Retrieve,
    Create,
    Own,
    Update,
}

pub fn is_coordinator(user: &User) -> bool {
    user.role == Role::Coordinator
}

/// Only roles that may be chosen at registration.
pub fn self_assignable(role: Role) -> bool {
    matches!(role, Role::Student | Role::Coordinator)
}

pub fn authorize_achievement(
    caller: &Caller,
    action: AchievementAction,
    target: Option<&Achievement>,
) -> Result<(), ApiError> {
    use AchievementAction::*;

    match action {
        List | Retrieve => Ok(()),
        Create | ListOwn => caller.user().map(|_| ()),
        ListPending | Verify => {
            if is_coordinator(caller.user()?) {
                Ok(())
            } else {
                Err(ApiError::forbidden())
            }
        }
        Update | Delete => {
            let user = caller.user()?;
            let owns = target.is_some_and(|a| a.student == user.id);
            if owns || is_coordinator(user) {
                Ok(())
            } else {
                Err(ApiError::forbidden())
            }
        }
    }
}

pub fn authorize_profile(
    caller: &Caller,
    action: ProfileAction,
    target: Option<&StudentProfile>,
) -> Result<(), ApiError> {
    match action {
        ProfileAction::List | ProfileAction::Retrieve => Ok(()),
        ProfileAction::Create | ProfileAction::Own => caller.user().map(|_| ()),
        ProfileAction::Update => {
            let user = caller.user()?;
            if target.is_some_and(|p| p.user_id == user.id) {
                Ok(())
            } else {
                Err(ApiError::forbidden())
            }
        }
    }
}

/// Whether the caller's edits are limited to achievements still awaiting review.
pub fn edits_restricted_to_pending(caller: &Caller) -> bool {
    caller.user().map_or(true, |user| !is_coordinator(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Status};
    use chrono::Utc;
    use lambda_http::http::StatusCode;

    fn user(id: u64, role: Role) -> Caller {
        Caller::User(User {
            id,
            student_id: format!("S{}", id),
            email: format!("s{}@example.com", id),
            password_hash: String::new(),
            role,
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_superuser: false,
            date_joined: Utc::now(),
        })
    }

    fn owned_by(student: u64) -> Achievement {
        let now = Utc::now();
        Achievement {
            id: 1,
            student,
            student_name: format!("S{}", student),
            title: "t".to_string(),
            description: "d".to_string(),
            category: Category::Other,
            status: Status::Pending,
            proof_document: None,
            achievement_date: None,
            verified_by: None,
            verified_by_name: None,
            verification_notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn status_of(result: Result<(), ApiError>) -> Option<StatusCode> {
        result.err().map(|e| e.status())
    }

    #[test]
    fn anonymous_reads_but_never_writes() {
        let anon = Caller::Anonymous;
        assert!(authorize_achievement(&anon, AchievementAction::List, None).is_ok());
        assert!(authorize_achievement(&anon, AchievementAction::Retrieve, None).is_ok());
        assert_eq!(
            status_of(authorize_achievement(&anon, AchievementAction::Create, None)),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            status_of(authorize_profile(&anon, ProfileAction::Update, None)),
            Some(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn verify_and_pending_need_coordinator_regardless_of_ownership() {
        let target = owned_by(1);
        for caller in [user(1, Role::Student), user(2, Role::Admin)] {
            for action in [AchievementAction::Verify, AchievementAction::ListPending] {
                assert_eq!(
                    status_of(authorize_achievement(&caller, action, Some(&target))),
                    Some(StatusCode::FORBIDDEN)
                );
            }
        }
        let coordinator = user(9, Role::Coordinator);
        assert!(authorize_achievement(&coordinator, AchievementAction::Verify, Some(&target)).is_ok());
    }

    #[test]
    fn owners_and_coordinators_write_achievements() {
        let target = owned_by(1);
        assert!(authorize_achievement(&user(1, Role::Student), AchievementAction::Update, Some(&target)).is_ok());
        assert!(authorize_achievement(&user(3, Role::Coordinator), AchievementAction::Delete, Some(&target)).is_ok());
        assert_eq!(
            status_of(authorize_achievement(&user(2, Role::Student), AchievementAction::Delete, Some(&target))),
            Some(StatusCode::FORBIDDEN)
        );
        assert!(edits_restricted_to_pending(&user(1, Role::Student)));
        assert!(!edits_restricted_to_pending(&user(3, Role::Coordinator)));
    }

    #[test]
    fn admin_cannot_be_self_assigned() {
        assert!(self_assignable(Role::Student));
        assert!(self_assignable(Role::Coordinator));
        assert!(!self_assignable(Role::Admin));
    }
}
