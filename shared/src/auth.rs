use lambda_http::http::StatusCode;
use serde_json::json;

use crate::access::{self_assignable, Caller};
use crate::blobs::BlobStore;
use crate::error::{ApiError, FieldErrors};
use crate::http::{json_response, parse_json, ApiResult};
use crate::store::Store;
use crate::tokens::{TokenError, TokenType};
use crate::types::{LoginRequest, NewUser, RefreshRequest, RegisterRequest, Role, UserView};
use crate::AppState;

const MAX_LOGIN_LENGTH: usize = 10;

/// Resolve the caller from an `Authorization: Bearer <access>` header.
///
/// No header, or a scheme other than Bearer, is anonymous. A bearer token
/// that fails verification, or names a missing or inactive user, is a 401.
pub async fn authenticate<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    authorization: Option<&str>,
) -> Result<Caller, ApiError> {
    let Some(header) = authorization else {
        return Ok(Caller::Anonymous);
    };
    let mut parts = header.split_whitespace();
    if parts.next() != Some("Bearer") {
        return Ok(Caller::Anonymous);
    }
    let (Some(token), None) = (parts.next(), parts.next()) else {
        return Err(ApiError::Unauthenticated(
            "Authorization header must contain two space-delimited values".to_string(),
        ));
    };

    let claims = state
        .tokens
        .verify(token, TokenType::Access)
        .map_err(|e| {
            tracing::warn!("Rejected access token: {}", e);
            ApiError::Unauthenticated("Given token not valid for any token type".to_string())
        })?;

    match state.store.get_user(claims.user_id).await? {
        Some(user) if user.is_active => Ok(Caller::User(user)),
        Some(_) => Err(ApiError::Unauthenticated("User is inactive".to_string())),
        None => Err(ApiError::Unauthenticated("User not found".to_string())),
    }
}

pub async fn register<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    body: &[u8],
) -> ApiResult {
    let req: RegisterRequest = parse_json(body)?;
    let mut errors = FieldErrors::new();

    let student_id = required(&mut errors, "student_id", req.student_id);
    if let Some(id) = &student_id {
        if id.chars().count() > MAX_LOGIN_LENGTH {
            errors.add(
                "student_id",
                format!(
                    "Ensure this field has no more than {} characters.",
                    MAX_LOGIN_LENGTH
                ),
            );
        }
    }
    let email = required(&mut errors, "email", req.email);
    if let Some(email) = &email {
        if !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }
    let password = required(&mut errors, "password", req.password);
    let role = match req.role.as_deref().map(str::trim) {
        None | Some("") => Role::Student,
        Some(raw) => match raw.parse::<Role>() {
            Ok(role) if self_assignable(role) => role,
            _ => {
                errors.add("role", format!("\"{}\" is not a valid choice.", raw));
                Role::Student
            }
        },
    };
    errors.into_result()?;

    let (Some(student_id), Some(email), Some(password)) = (student_id, email, password) else {
        return Err(ApiError::BadRequest("Invalid input.".to_string()));
    };

    let password_hash = state
        .hasher
        .hash(&password)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let user = state
        .store
        .create_user(NewUser {
            student_id,
            email,
            password_hash,
            role,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
        })
        .await?;

    tracing::info!("Registered user {} as {}", user.student_id, user.role);
    json_response(StatusCode::CREATED, &UserView::from(&user))
}

pub async fn login<S: Store, B: BlobStore>(state: &AppState<S, B>, body: &[u8]) -> ApiResult {
    let req: LoginRequest = parse_json(body)?;
    let credentials = req
        .student_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .zip(req.password.filter(|p| !p.is_empty()));
    let Some((student_id, password)) = credentials else {
        return login_failed("Please provide both student ID and password");
    };

    let user = match state.store.find_user_by_login(&student_id).await? {
        Some(user) if state.hasher.verify(&password, &user.password_hash) => user,
        _ => {
            tracing::warn!("Failed login for {}", student_id);
            return login_failed("Invalid credentials");
        }
    };
    if !user.is_active {
        return login_failed("Account is disabled");
    }

    let tokens = state
        .tokens
        .issue(&user)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::info!("User {} logged in", user.student_id);
    json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "message": "Login successful",
            "user": UserView::from(&user),
            "tokens": tokens,
        }),
    )
}

/// Exchange a refresh token for a fresh access token.
pub async fn refresh_token<S: Store, B: BlobStore>(
    state: &AppState<S, B>,
    body: &[u8],
) -> ApiResult {
    let req: RefreshRequest = parse_json(body)?;
    let Some(token) = req.refresh.filter(|t| !t.trim().is_empty()) else {
        return Err(ApiError::field("refresh", "This field is required."));
    };

    let claims = state
        .tokens
        .verify(token.trim(), TokenType::Refresh)
        .map_err(|e| match e {
            TokenError::WrongType => ApiError::Unauthenticated("Token has wrong type".to_string()),
            TokenError::Invalid(_) => {
                ApiError::Unauthenticated("Token is invalid or expired".to_string())
            }
        })?;
    let user = match state.store.get_user(claims.user_id).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::Unauthenticated("User not found".to_string())),
    };

    let access = state
        .tokens
        .issue_access(&user)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    json_response(StatusCode::OK, &json!({ "access": access }))
}

fn login_failed(error: &str) -> ApiResult {
    json_response(
        StatusCode::BAD_REQUEST,
        &json!({ "success": false, "error": error }),
    )
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        None => {
            errors.add(field, "This field is required.");
            None
        }
        Some(v) if v.is_empty() => {
            errors.add(field, "This field may not be blank.");
            None
        }
        Some(v) => Some(v),
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
