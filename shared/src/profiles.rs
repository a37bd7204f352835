use chrono::Utc;
use lambda_http::http::StatusCode;
use serde_json::{json, Value};

use crate::access::{authorize_profile, Caller, ProfileAction};
use crate::blobs::{upload, BlobStore, UploadFolder};
use crate::error::{ApiError, FieldErrors};
use crate::http::{json_response, parse_json, ApiResult};
use crate::store::{Store, StoreError};
use crate::types::{
    Cgpa, ProfileFields, ProfilePayload, ProfileView, StudentProfile, UploadedFile, User,
};
use crate::AppState;

const MAX_DEPARTMENT_LENGTH: usize = 25;
const MAX_YEAR_LENGTH: usize = 4;
const MAX_PHONE_LENGTH: usize = 20;

/// Validated profile fields. `None` leaves the stored value alone.
#[derive(Debug, Default)]
struct ProfileChanges {
    bio: Option<String>,
    department: Option<String>,
    year: Option<String>,
    cgpa: Option<Option<Cgpa>>,
    phone: Option<String>,
    linkedin_url: Option<String>,
    github_url: Option<String>,
    profile_picture: Option<Option<UploadedFile>>,
}

impl ProfileChanges {
    fn validate(payload: ProfilePayload) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();

        let bio = payload.bio.map(|v| v.trim().to_string());
        let department = bounded(&mut errors, "department", payload.department, MAX_DEPARTMENT_LENGTH);
        let year = bounded(&mut errors, "year", payload.year, MAX_YEAR_LENGTH);
        let phone = bounded(&mut errors, "phone", payload.phone, MAX_PHONE_LENGTH);
        let linkedin_url = url(&mut errors, "linkedin_url", payload.linkedin_url);
        let github_url = url(&mut errors, "github_url", payload.github_url);

        let cgpa = match payload.cgpa {
            None => None,
            Some(None) => Some(None),
            Some(Some(Value::String(s))) if s.trim().is_empty() => Some(None),
            Some(Some(value)) => match Cgpa::from_json(&value) {
                Ok(cgpa) => Some(Some(cgpa)),
                Err(message) => {
                    errors.add("cgpa", message);
                    None
                }
            },
        };

        errors.into_result()?;
        Ok(Self {
            bio,
            department,
            year,
            cgpa,
            phone,
            linkedin_url,
            github_url,
            profile_picture: payload.profile_picture,
        })
    }

    async fn apply_to<S: Store, B: BlobStore>(
        self,
        state: &AppState<S, B>,
        fields: &mut ProfileFields,
    ) -> Result<(), ApiError> {
        if let Some(bio) = self.bio {
            fields.bio = bio;
        }
        if let Some(department) = self.department {
            fields.department = department;
        }
        if let Some(year) = self.year {
            fields.year = year;
        }
        if let Some(cgpa) = self.cgpa {
            fields.cgpa = cgpa;
        }
        if let Some(phone) = self.phone {
            fields.phone = phone;
        }
        if let Some(url) = self.linkedin_url {
            fields.linkedin_url = url;
        }
        if let Some(url) = self.github_url {
            fields.github_url = url;
        }
        if let Some(picture) = self.profile_picture {
            fields.profile_picture = match picture {
                Some(file) => Some(
                    upload(
                        &state.blobs,
                        UploadFolder::ProfilePictures,
                        &file,
                        &state.config.media_base_url,
                    )
                    .await?,
                ),
                None => None,
            };
        }
        Ok(())
    }
}

fn bounded(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let value = value?.trim().to_string();
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
        return None;
    }
    Some(value)
}

fn url(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = value?.trim().to_string();
    if value.is_empty() || is_valid_url(&value) {
        Some(value)
    } else {
        errors.add(field, "Enter a valid URL.");
        None
    }
}

fn is_valid_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    let Some(rest) = rest else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.rsplit_once(':').map_or(host, |(h, _)| h);
    !value.chars().any(char::is_whitespace)
        && (host == "localhost"
            || (host.contains('.') && host.split('.').all(|label| !label.is_empty())))
}

async fn owner_of<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    profile: &StudentProfile,
) -> Result<User, ApiError> {
    state
        .store
        .get_user(profile.user_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Profile {} has no user", profile.id)))
}

async fn load<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    id: u64,
) -> Result<StudentProfile, ApiError> {
    state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))
}

async fn render<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    status: StatusCode,
    profile: &StudentProfile,
) -> ApiResult {
    let user = owner_of(state, profile).await?;
    json_response(status, &ProfileView::new(profile, &user))
}

pub async fn list<S: Store, B: BlobStore>(state: &AppState<S, B>, caller: &Caller) -> ApiResult {
    authorize_profile(caller, ProfileAction::List, None)?;
    let profiles = state.store.list_profiles().await?;
    let mut views = Vec::with_capacity(profiles.len());
    for profile in &profiles {
        views.push(ProfileView::new(profile, &owner_of(state, profile).await?));
    }
    json_response(StatusCode::OK, &views)
}

pub async fn get<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
) -> ApiResult {
    let profile = load(state, id).await?;
    authorize_profile(caller, ProfileAction::Retrieve, Some(&profile))?;
    render(state, StatusCode::OK, &profile).await
}

pub async fn me<S: Store, B: BlobStore>(state: &AppState<S, B>, caller: &Caller) -> ApiResult {
    authorize_profile(caller, ProfileAction::Own, None)?;
    let user = caller.user()?;
    match state.store.get_profile_for_user(user.id).await? {
        Some(profile) => json_response(StatusCode::OK, &ProfileView::new(&profile, user)),
        None => json_response(StatusCode::NOT_FOUND, &json!({"error": "Profile not found"})),
    }
}

pub async fn create<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    body: &[u8],
) -> ApiResult {
    authorize_profile(caller, ProfileAction::Create, None)?;
    let user = caller.user()?;
    let changes = ProfileChanges::validate(parse_json(body)?)?;
    if state.store.get_profile_for_user(user.id).await?.is_some() {
        return Err(duplicate_profile());
    }

    let mut fields = ProfileFields::default();
    changes.apply_to(state, &mut fields).await?;
    let profile = state
        .store
        .create_profile(user.id, fields)
        .await
        .map_err(profile_error)?;
    tracing::info!("Profile {} created for {}", profile.id, user.student_id);
    json_response(StatusCode::CREATED, &ProfileView::new(&profile, user))
}

/// PUT and PATCH alike: every profile field is optional, so absent keys keep their value.
pub async fn update<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
    body: &[u8],
) -> ApiResult {
    caller.user()?;
    let mut profile = load(state, id).await?;
    authorize_profile(caller, ProfileAction::Update, Some(&profile))?;
    let changes = ProfileChanges::validate(parse_json(body)?)?;

    let mut fields = profile.fields();
    changes.apply_to(state, &mut fields).await?;
    profile.apply(fields);
    profile.updated_at = Utc::now();
    state.store.save_profile(&profile).await?;
    render(state, StatusCode::OK, &profile).await
}

/// Upsert of the caller's own profile.
pub async fn update_me<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    body: &[u8],
) -> ApiResult {
    authorize_profile(caller, ProfileAction::Own, None)?;
    let user = caller.user()?;
    let changes = ProfileChanges::validate(parse_json(body)?)?;

    match state.store.get_profile_for_user(user.id).await? {
        Some(mut profile) => {
            let mut fields = profile.fields();
            changes.apply_to(state, &mut fields).await?;
            profile.apply(fields);
            profile.updated_at = Utc::now();
            state.store.save_profile(&profile).await?;
            json_response(StatusCode::OK, &ProfileView::new(&profile, user))
        }
        None => {
            let mut fields = ProfileFields::default();
            changes.apply_to(state, &mut fields).await?;
            let profile = state
                .store
                .create_profile(user.id, fields)
                .await
                .map_err(profile_error)?;
            json_response(StatusCode::OK, &ProfileView::new(&profile, user))
        }
    }
}

fn duplicate_profile() -> ApiError {
    ApiError::field("user", "student profile with this user already exists.")
}

fn profile_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Duplicate { .. } => duplicate_profile(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body, caller, json, state};
    use crate::types::Role;
    use base64::Engine;

    #[tokio::test]
    async fn me_is_404_until_first_write() {
        let state = state();
        let student = caller(&state, "21CS001", Role::Student).await;

        let response = me(&state, &student).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(&response), json!({"error": "Profile not found"}));

        let response = update_me(&state, &student, &body(json!({"department": "CSE", "cgpa": "8.5"})))
            .await
            .unwrap();
        let view = json(&response);
        assert_eq!(view["department"], "CSE");
        assert_eq!(view["cgpa"], "8.50");
        assert_eq!(view["full_name"], "21CS001");
        assert_eq!(view["student_id"], "21CS001");

        let response = update_me(&state, &student, &body(json!({"year": "2024"})))
            .await
            .unwrap();
        let view = json(&response);
        assert_eq!(view["department"], "CSE");
        assert_eq!(view["year"], "2024");
        assert_eq!(state.store.list_profiles().await.unwrap().len(), 1);

        let response = me(&state, &student).await.unwrap();
        assert_eq!(json(&response)["year"], "2024");
    }

    #[tokio::test]
    async fn one_profile_per_user() {
        let state = state();
        let student = caller(&state, "21CS001", Role::Student).await;
        let response = create(&state, &student, &body(json!({"bio": "hi"}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let err = create(&state, &student, &body(json!({"bio": "again"}))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.field_errors().unwrap().get("user").is_some());

        let err = create(&state, &Caller::Anonymous, &body(json!({}))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn field_limits_are_enforced() {
        let state = state();
        let student = caller(&state, "21CS001", Role::Student).await;
        let err = create(
            &state,
            &student,
            &body(json!({
                "department": "d".repeat(26),
                "year": "20245",
                "phone": "1".repeat(21),
                "cgpa": "3.141",
                "linkedin_url": "linkedin.com/in/me",
                "github_url": "https://github.com/me",
            })),
        )
        .await
        .unwrap_err();
        let fields = err.field_errors().unwrap();
        for field in ["department", "year", "phone", "cgpa", "linkedin_url"] {
            assert!(fields.get(field).is_some(), "{} should be rejected", field);
        }
        assert!(fields.get("github_url").is_none());
    }

    #[tokio::test]
    async fn only_owner_updates_and_reads_are_open() {
        let state = state();
        let owner = caller(&state, "21CS001", Role::Student).await;
        let coordinator = caller(&state, "coord", Role::Coordinator).await;
        let id = json(&create(&state, &owner, &body(json!({"bio": "hi"}))).await.unwrap())["id"]
            .as_u64()
            .unwrap();

        let err = update(&state, &coordinator, id, &body(json!({"bio": "hacked"})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let picture = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let response = update(
            &state,
            &owner,
            id,
            &body(json!({
                "bio": "updated",
                "profile_picture": {"file_name": "me.png", "content_type": "image/png", "file_data": picture},
            })),
        )
        .await
        .unwrap();
        let view = json(&response);
        assert_eq!(view["bio"], "updated");
        assert!(view["profile_picture"]
            .as_str()
            .unwrap()
            .starts_with("/media/profile_pictures/"));

        let listed = json(&list(&state, &Caller::Anonymous).await.unwrap());
        assert_eq!(listed[0]["bio"], "updated");
        let fetched = json(&get(&state, &Caller::Anonymous, id).await.unwrap());
        assert_eq!(fetched["user"]["student_id"], "21CS001");
        assert_eq!(
            get(&state, &Caller::Anonymous, id + 100).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn anonymous_update_is_401_even_for_missing_ids() {
        let state = state();
        let owner = caller(&state, "21CS001", Role::Student).await;
        let id = json(&create(&state, &owner, &body(json!({"bio": "hi"}))).await.unwrap())["id"]
            .as_u64()
            .unwrap();
        for target in [id, 999] {
            let err = update(&state, &Caller::Anonymous, target, &body(json!({"bio": "x"})))
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
        let err = update(&state, &owner, 999, &body(json!({"bio": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_picture_must_be_an_image() {
        let state = state();
        let owner = caller(&state, "21CS001", Role::Student).await;
        let page = base64::engine::general_purpose::STANDARD.encode(b"<script>alert(1)</script>");
        let err = update_me(
            &state,
            &owner,
            &body(json!({
                "profile_picture": {"file_name": "me.html", "content_type": "image/png", "file_data": page},
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.list_profiles().await.unwrap().is_empty());
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_url("https://github.com/someone"));
        assert!(is_valid_url("http://localhost:8000/x"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("https://nohost"));
        assert!(!is_valid_url("https://exa mple.com"));
    }
}
