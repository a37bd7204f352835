use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A value outside one of the closed choice sets below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid choice.")]
pub struct InvalidChoice(pub String);

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(InvalidChoice(other.to_string())),
                }
            }
        }
    };
}

choice_enum! {
    Role {
        Student => "student",
        Coordinator => "coordinator",
        Admin => "admin",
    }
}

choice_enum! {
    /// Lifecycle of an achievement. `Pending` is the initial state.
    Status {
        Pending => "pending",
        Verified => "verified",
        Rejected => "rejected",
    }
}

choice_enum! {
    Category {
        Academic => "academic",
        Sports => "sports",
        Cultural => "cultural",
        Technical => "technical",
        Leadership => "leadership",
        Community => "community",
        Research => "research",
        Other => "other",
    }
}

// ========== USER ==========
/// Stored identity. Never serialized directly; see [`UserView`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub student_id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub student_id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: u64,
    pub student_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            student_id: user.student_id.clone(),
            username: user.student_id.clone(),
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "username")]
    pub student_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username")]
    pub student_id: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

// ========== PROFILE ==========
/// Grade point average with exactly two decimal places, held as hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cgpa(u64);

impl Cgpa {
    const MAX_DIGITS: usize = 10;
    const DECIMAL_PLACES: usize = 2;

    /// Accepts a JSON number or a numeric string.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::String(s) => s.parse(),
            serde_json::Value::Number(n) => n.to_string().parse(),
            _ => Err("A valid number is required.".to_string()),
        }
    }
}

impl FromStr for Cgpa {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err("Ensure this value is greater than or equal to 0.".to_string());
        }
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        let numeric = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !numeric(whole) || !numeric(fraction) {
            return Err("A valid number is required.".to_string());
        }
        if fraction.len() > Self::DECIMAL_PLACES {
            return Err(format!(
                "Ensure that there are no more than {} decimal places.",
                Self::DECIMAL_PLACES
            ));
        }
        let whole = whole.trim_start_matches('0');
        if whole.len() + Self::DECIMAL_PLACES > Self::MAX_DIGITS {
            return Err(format!(
                "Ensure that there are no more than {} digits in total.",
                Self::MAX_DIGITS
            ));
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| "A valid number is required.".to_string())?
        };
        let mut cents = 0;
        for (i, digit) in fraction.chars().enumerate() {
            let digit = u64::from(digit.to_digit(10).unwrap_or(0));
            cents += digit * if i == 0 { 10 } else { 1 };
        }
        Ok(Self(whole * 100 + cents))
    }
}

impl fmt::Display for Cgpa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Cgpa {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentProfile {
    pub id: u64,
    pub user_id: u64,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub department: String,
    pub year: String,
    pub cgpa: Option<Cgpa>,
    pub phone: String,
    pub linkedin_url: String,
    pub github_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile content before the store assigns `id` and timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub profile_picture: Option<String>,
    pub bio: String,
    pub department: String,
    pub year: String,
    pub cgpa: Option<Cgpa>,
    pub phone: String,
    pub linkedin_url: String,
    pub github_url: String,
}

impl StudentProfile {
    pub fn fields(&self) -> ProfileFields {
        ProfileFields {
            profile_picture: self.profile_picture.clone(),
            bio: self.bio.clone(),
            department: self.department.clone(),
            year: self.year.clone(),
            cgpa: self.cgpa,
            phone: self.phone.clone(),
            linkedin_url: self.linkedin_url.clone(),
            github_url: self.github_url.clone(),
        }
    }

    pub fn apply(&mut self, fields: ProfileFields) {
        self.profile_picture = fields.profile_picture;
        self.bio = fields.bio;
        self.department = fields.department;
        self.year = fields.year;
        self.cgpa = fields.cgpa;
        self.phone = fields.phone;
        self.linkedin_url = fields.linkedin_url;
        self.github_url = fields.github_url;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: u64,
    pub user: UserView,
    pub student_id: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub department: String,
    pub year: String,
    pub cgpa: Option<Cgpa>,
    pub phone: String,
    pub linkedin_url: String,
    pub github_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn new(profile: &StudentProfile, user: &User) -> Self {
        let full_name = format!("{} {}", user.first_name, user.last_name)
            .trim()
            .to_string();
        Self {
            id: profile.id,
            user: UserView::from(user),
            student_id: user.student_id.clone(),
            email: user.email.clone(),
            full_name: if full_name.is_empty() {
                user.student_id.clone()
            } else {
                full_name
            },
            profile_picture: profile.profile_picture.clone(),
            bio: profile.bio.clone(),
            department: profile.department.clone(),
            year: profile.year.clone(),
            cgpa: profile.cgpa,
            phone: profile.phone.clone(),
            linkedin_url: profile.linkedin_url.clone(),
            github_url: profile.github_url.clone(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Absent keys stay `None`; explicit `null` becomes `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfilePayload {
    pub bio: Option<String>,
    pub department: Option<String>,
    pub year: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub cgpa: Option<Option<serde_json::Value>>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub profile_picture: Option<Option<UploadedFile>>,
}

// ========== UPLOAD ==========
/// Inline file upload carried in a JSON body.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub file_data: String, // base64 encoded
}

// ========== ACHIEVEMENT ==========
#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub id: u64,
    pub student: u64,
    pub student_name: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: Status,
    pub proof_document: Option<String>,
    pub achievement_date: Option<NaiveDate>,
    pub verified_by: Option<u64>,
    pub verified_by_name: Option<String>,
    pub verification_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAchievement {
    pub student: u64,
    pub student_name: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub proof_document: Option<String>,
    pub achievement_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    pub id: u64,
    pub student: u64,
    pub student_name: String,
    pub student_id: u64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: Status,
    pub proof_document: Option<String>,
    pub achievement_date: Option<NaiveDate>,
    pub verified_by: Option<u64>,
    pub verified_by_name: Option<String>,
    pub verification_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Achievement> for AchievementView {
    fn from(a: &Achievement) -> Self {
        Self {
            id: a.id,
            student: a.student,
            student_name: a.student_name.clone(),
            student_id: a.student,
            title: a.title.clone(),
            description: a.description.clone(),
            category: a.category,
            status: a.status,
            proof_document: a.proof_document.clone(),
            achievement_date: a.achievement_date,
            verified_by: a.verified_by,
            verified_by_name: a.verified_by_name.clone(),
            verification_notes: a.verification_notes.clone(),
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Content fields a student may write. Anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct AchievementPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub achievement_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub proof_document: Option<Option<UploadedFile>>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub status: Option<String>,
    #[serde(alias = "verification_notes")]
    pub notes: Option<String>,
}

// ========== NOTIFICATION ==========
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub user: u64,
    pub achievement: u64,
    pub achievement_title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user: u64,
    pub achievement: u64,
    pub achievement_title: String,
    pub message: String,
}
