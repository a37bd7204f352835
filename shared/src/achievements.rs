use chrono::NaiveDate;
use lambda_http::http::StatusCode;

use crate::access::{authorize_achievement, edits_restricted_to_pending, AchievementAction, Caller};
use crate::blobs::{upload, BlobStore, UploadFolder};
use crate::error::{ApiError, FieldErrors};
use crate::filters::AchievementFilter;
use crate::http::{json_response, no_content, parse_json, ApiResult};
use crate::store::Store;
use crate::transitions;
use crate::types::{
    Achievement, AchievementPayload, AchievementView, Category, NewAchievement, Status,
    UploadedFile, VerifyRequest,
};
use crate::AppState;

const MAX_TITLE_LENGTH: usize = 200;

/// Validated content fields. `None` leaves the stored value alone.
#[derive(Debug, Default)]
struct ContentChanges {
    title: Option<String>,
    description: Option<String>,
    category: Option<Category>,
    achievement_date: Option<Option<NaiveDate>>,
    proof_document: Option<Option<UploadedFile>>,
}

impl ContentChanges {
    /// `full` requires title, description and category (create and PUT).
    fn validate(payload: AchievementPayload, full: bool) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();

        let title = text(&mut errors, "title", payload.title, full);
        if let Some(title) = &title {
            if title.chars().count() > MAX_TITLE_LENGTH {
                errors.add(
                    "title",
                    format!(
                        "Ensure this field has no more than {} characters.",
                        MAX_TITLE_LENGTH
                    ),
                );
            }
        }
        let description = text(&mut errors, "description", payload.description, full);

        let category = match payload.category {
            None if full => {
                errors.add("category", "This field is required.");
                None
            }
            None => None,
            Some(raw) => match raw.trim().parse::<Category>() {
                Ok(category) => Some(category),
                Err(e) => {
                    errors.add("category", e.to_string());
                    None
                }
            },
        };

        let achievement_date = match payload.achievement_date {
            Some(Some(raw)) if !raw.trim().is_empty() => {
                match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                    Ok(date) => Some(Some(date)),
                    Err(_) => {
                        errors.add(
                            "achievement_date",
                            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                        );
                        None
                    }
                }
            }
            Some(_) => Some(None),
            None => None,
        };

        errors.into_result()?;
        Ok(Self {
            title,
            description,
            category,
            achievement_date,
            proof_document: payload.proof_document,
        })
    }

    async fn apply_to<S: Store, B: BlobStore>(
        self,
        state: &AppState<S, B>,
        achievement: &mut Achievement,
    ) -> Result<(), ApiError> {
        if let Some(title) = self.title {
            achievement.title = title;
        }
        if let Some(description) = self.description {
            achievement.description = description;
        }
        if let Some(category) = self.category {
            achievement.category = category;
        }
        if let Some(date) = self.achievement_date {
            achievement.achievement_date = date;
        }
        if let Some(proof) = self.proof_document {
            achievement.proof_document = store_proof(state, proof.as_ref()).await?;
        }
        Ok(())
    }
}

fn text(errors: &mut FieldErrors, field: &str, value: Option<String>, required: bool) -> Option<String> {
    match value {
        None => {
            if required {
                errors.add(field, "This field is required.");
            }
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, "This field may not be blank.");
            None
        }
        Some(v) => Some(v.trim().to_string()),
    }
}

async fn store_proof<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    file: Option<&UploadedFile>,
) -> Result<Option<String>, ApiError> {
    match file {
        Some(file) => Ok(Some(
            upload(
                &state.blobs,
                UploadFolder::AchievementProofs,
                file,
                &state.config.media_base_url,
            )
            .await?,
        )),
        None => Ok(None),
    }
}

async fn load<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    id: u64,
) -> Result<Achievement, ApiError> {
    state
        .store
        .get_achievement(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Achievement"))
}

async fn respond_list<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    filter: &AchievementFilter,
) -> ApiResult {
    let achievements = state.store.list_achievements(filter).await?;
    let views: Vec<AchievementView> = achievements.iter().map(AchievementView::from).collect();
    json_response(StatusCode::OK, &views)
}

pub async fn list<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    filter: &AchievementFilter,
) -> ApiResult {
    authorize_achievement(caller, AchievementAction::List, None)?;
    respond_list(state, filter).await
}

pub async fn my_achievements<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
) -> ApiResult {
    authorize_achievement(caller, AchievementAction::ListOwn, None)?;
    let user = caller.user()?;
    respond_list(state, &AchievementFilter::for_student(user.id)).await
}

pub async fn pending<S: Store, B: BlobStore>(state: &AppState<S, B>, caller: &Caller) -> ApiResult {
    authorize_achievement(caller, AchievementAction::ListPending, None)?;
    respond_list(state, &AchievementFilter::pending()).await
}

pub async fn get<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
) -> ApiResult {
    let achievement = load(state, id).await?;
    authorize_achievement(caller, AchievementAction::Retrieve, Some(&achievement))?;
    json_response(StatusCode::OK, &AchievementView::from(&achievement))
}

/// The caller becomes the student; status starts pending whatever the body says.
pub async fn create<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    body: &[u8],
) -> ApiResult {
    authorize_achievement(caller, AchievementAction::Create, None)?;
    let user = caller.user()?;
    let changes = ContentChanges::validate(parse_json(body)?, true)?;

    let (Some(title), Some(description), Some(category)) =
        (changes.title, changes.description, changes.category)
    else {
        return Err(ApiError::BadRequest("Invalid input.".to_string()));
    };
    let proof_document = match changes.proof_document {
        Some(file) => store_proof(state, file.as_ref()).await?,
        None => None,
    };

    let achievement = state
        .store
        .create_achievement(NewAchievement {
            student: user.id,
            student_name: user.student_id.clone(),
            title,
            description,
            category,
            proof_document,
            achievement_date: changes.achievement_date.flatten(),
        })
        .await?;
    tracing::info!(
        "Achievement {} created by {}",
        achievement.id,
        user.student_id
    );
    json_response(StatusCode::CREATED, &AchievementView::from(&achievement))
}

/// PUT when `partial` is false, PATCH otherwise. Only content fields are written.
pub async fn update<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
    body: &[u8],
    partial: bool,
) -> ApiResult {
    caller.user()?;
    let current = load(state, id).await?;
    authorize_achievement(caller, AchievementAction::Update, Some(&current))?;
    if edits_restricted_to_pending(caller) && current.status != Status::Pending {
        return Err(ApiError::BadRequest(
            "Only pending achievements can be edited.".to_string(),
        ));
    }
    let changes = ContentChanges::validate(parse_json(body)?, !partial)?;

    let mut next = current.clone();
    changes.apply_to(state, &mut next).await?;
    let (saved, _) = transitions::apply(&state.store, &current, next).await?;
    json_response(StatusCode::OK, &AchievementView::from(&saved))
}

pub async fn delete<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
) -> ApiResult {
    caller.user()?;
    let achievement = load(state, id).await?;
    authorize_achievement(caller, AchievementAction::Delete, Some(&achievement))?;
    state.store.delete_achievement(id).await?;
    no_content()
}

/// Coordinator review: sets status, verifier and notes, then notifies the student.
pub async fn verify<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    caller: &Caller,
    id: u64,
    body: &[u8],
) -> ApiResult {
    authorize_achievement(caller, AchievementAction::Verify, None)?;
    let reviewer = caller.user()?;
    let current = load(state, id).await?;
    let req: VerifyRequest = parse_json(body)?;

    let status = match req.status.as_deref().map(str::trim) {
        None | Some("") => return Err(ApiError::field("status", "This field is required.")),
        Some("verified") => Status::Verified,
        Some("rejected") => Status::Rejected,
        Some(_) => {
            return Err(ApiError::field(
                "status",
                "Status must be either verified or rejected.",
            ))
        }
    };

    let next = Achievement {
        status,
        verified_by: Some(reviewer.id),
        verified_by_name: Some(reviewer.student_id.clone()),
        verification_notes: req.notes.unwrap_or_default().trim().to_string(),
        ..current.clone()
    };
    let (saved, _) = transitions::apply(&state.store, &current, next).await?;
    tracing::info!(
        "Achievement {} marked {} by {}",
        saved.id,
        saved.status,
        reviewer.student_id
    );
    json_response(StatusCode::OK, &AchievementView::from(&saved))
}
