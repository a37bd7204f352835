use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::sync::Arc;
use tracker_shared::access::Caller;
use tracker_shared::blobs::BlobStore;
use tracker_shared::error::ApiError;
use tracker_shared::filters::AchievementFilter;
use tracker_shared::http::{cors_preflight, ApiResult};
use tracker_shared::store::Store;
use tracker_shared::{achievements, auth, media, notifications, profiles, users, AppState};

/// Main Lambda handler - routes requests to the identity, achievement,
/// notification, profile and media endpoints
pub(crate) async fn function_handler<S: Store, B: BlobStore>(
    event: Request,
    state: Arc<AppState<S, B>>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("Achievement API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    let result = if method == Method::OPTIONS {
        cors_preflight()
    } else {
        route(&event, &state, &method, &path).await
    };

    match result {
        Ok(response) => Ok(response),
        Err(e) => {
            if e.status() == StatusCode::UNAUTHORIZED || e.status() == StatusCode::FORBIDDEN {
                tracing::warn!("Rejected {} {}: {}", method, path, e);
            }
            e.into_response()
        }
    }
}

async fn route<S: Store, B: BlobStore>(
    event: &Request,
    state: &AppState<S, B>,
    method: &Method,
    path: &str,
) -> ApiResult {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let body: &[u8] = event.body().as_ref();

    // Login, registration, refresh and media need no caller; unrouted paths are a plain 404
    let caller = if is_public(&parts) || !is_known_path(&parts) {
        Caller::Anonymous
    } else {
        let authorization = event
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok());
        auth::authenticate(state, authorization).await?
    };

    match (method, parts.as_slice()) {
        // --- IDENTITY ---
        // `/api/auth/*` is kept as an alias of `/api/users/*`
        (&Method::POST, ["api", "users" | "auth", "login"]) => auth::login(state, body).await,
        (&Method::POST, ["api", "users" | "auth", "register"]) => {
            auth::register(state, body).await
        }
        (&Method::POST, ["api", "users" | "auth", "refresh"]) => {
            auth::refresh_token(state, body).await
        }
        (&Method::GET, ["api", "users" | "auth", "me"]) => users::current_user(&caller),

        // --- ACHIEVEMENTS ---
        // GET /api/achievements/list?student_id=&status=&category=
        (&Method::GET, ["api", "achievements", "list"]) => {
            let params = event.query_string_parameters();
            let filter = AchievementFilter::from_query(params.iter())?;
            achievements::list(state, &caller, &filter).await
        }
        (&Method::POST, ["api", "achievements", "list"]) => {
            achievements::create(state, &caller, body).await
        }
        (&Method::GET, ["api", "achievements", "list", "my_achievements"]) => {
            achievements::my_achievements(state, &caller).await
        }
        (&Method::GET, ["api", "achievements", "list", "pending"]) => {
            achievements::pending(state, &caller).await
        }
        (&Method::POST, ["api", "achievements", "notifications", "mark_all_read"]) => {
            notifications::mark_all_read(state, &caller).await
        }
        (&Method::GET, ["api", "profiles", "me"]) => profiles::me(state, &caller).await,
        (&Method::PATCH, ["api", "profiles", "me"]) => {
            profiles::update_me(state, &caller, body).await
        }

        // Named actions never fall through to an id
        (
            method,
            ["api", "achievements", "list", "my_achievements" | "pending"]
            | ["api", "achievements", "notifications", "mark_all_read"]
            | ["api", "profiles", "me"],
        ) => Err(ApiError::MethodNotAllowed(method.to_string())),

        (&Method::GET, ["api", "achievements", "list", id]) => {
            achievements::get(state, &caller, parse_id(id)?).await
        }
        (&Method::PUT, ["api", "achievements", "list", id]) => {
            achievements::update(state, &caller, parse_id(id)?, body, false).await
        }
        (&Method::PATCH, ["api", "achievements", "list", id]) => {
            achievements::update(state, &caller, parse_id(id)?, body, true).await
        }
        (&Method::DELETE, ["api", "achievements", "list", id]) => {
            achievements::delete(state, &caller, parse_id(id)?).await
        }
        (&Method::POST, ["api", "achievements", "list", id, "verify"]) => {
            achievements::verify(state, &caller, parse_id(id)?, body).await
        }

        // --- NOTIFICATIONS ---
        (&Method::GET, ["api", "achievements", "notifications"]) => {
            notifications::list(state, &caller).await
        }
        (&Method::GET, ["api", "achievements", "notifications", id]) => {
            notifications::get(state, &caller, parse_id(id)?).await
        }
        (&Method::POST, ["api", "achievements", "notifications", id, "mark_read"]) => {
            notifications::mark_read(state, &caller, parse_id(id)?).await
        }

        // --- PROFILES ---
        (&Method::GET, ["api", "profiles"]) => profiles::list(state, &caller).await,
        (&Method::POST, ["api", "profiles"]) => profiles::create(state, &caller, body).await,
        (&Method::GET, ["api", "profiles", id]) => {
            profiles::get(state, &caller, parse_id(id)?).await
        }
        (&Method::PUT | &Method::PATCH, ["api", "profiles", id]) => {
            profiles::update(state, &caller, parse_id(id)?, body).await
        }

        // --- MEDIA ---
        (&Method::GET, ["media", key @ ..]) if !key.is_empty() => {
            media::serve(&state.blobs, &key.join("/")).await
        }

        (method, parts) if is_known_path(parts) => {
            Err(ApiError::MethodNotAllowed(method.to_string()))
        }
        _ => {
            // No matching route
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            Err(ApiError::NotFound("Not found".to_string()))
        }
    }
}

fn is_public(parts: &[&str]) -> bool {
    matches!(
        parts,
        ["api", "users" | "auth", "login" | "register" | "refresh"] | ["media", ..]
    )
}

/// Paths some method is routed for, used to tell 405 from 404.
fn is_known_path(parts: &[&str]) -> bool {
    matches!(
        parts,
        ["api", "users" | "auth", "login" | "register" | "refresh" | "me"]
            | ["api", "achievements", "list"]
            | ["api", "achievements", "list", _]
            | ["api", "achievements", "list", _, "verify"]
            | ["api", "achievements", "notifications"]
            | ["api", "achievements", "notifications", _]
            | ["api", "achievements", "notifications", _, "mark_read"]
            | ["api", "profiles"]
            | ["api", "profiles", _]
            | ["media", _, ..]
    )
}

/// A path segment that is not an id names nothing.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("Not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tracker_shared::blobs::MemoryBlobStore;
    use tracker_shared::config::Config;
    use tracker_shared::store::MemoryStore;

    type TestState = Arc<AppState<MemoryStore, MemoryBlobStore>>;

    fn state() -> TestState {
        AppState::new(Config::for_tests(), MemoryStore::new(), MemoryBlobStore::new()).unwrap()
    }

    fn request(method: &str, path: &str, token: Option<&str>, body: Value) -> Request {
        let mut builder = lambda_http::http::Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = if body.is_null() {
            Body::Empty
        } else {
            Body::from(body.to_string())
        };
        builder.body(body).unwrap()
    }

    async fn call(state: &TestState, request: Request) -> (StatusCode, Value) {
        let response = function_handler(request, Arc::clone(state)).await.unwrap();
        let status = response.status();
        let body = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Registers and logs in, returning the access token.
    async fn sign_up(state: &TestState, login: &str, role: &str) -> String {
        let (status, _) = call(
            state,
            request(
                "POST",
                "/api/users/register/",
                None,
                json!({
                    "student_id": login,
                    "email": format!("{}@example.com", login.to_lowercase()),
                    "password": "s3cret-pw",
                    "role": role,
                    "first_name": "Test",
                    "last_name": login,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            state,
            request(
                "POST",
                "/api/users/login/",
                None,
                json!({"student_id": login, "password": "s3cret-pw"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["tokens"]["access"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn rejection_reaches_the_student_as_one_notification() {
        let state = state();
        let student = sign_up(&state, "21CS001", "student").await;
        let coordinator = sign_up(&state, "coord", "coordinator").await;

        let (status, created) = call(
            &state,
            request(
                "POST",
                "/api/achievements/list/",
                Some(&student),
                json!({"title": "Won X", "description": "State final", "category": "sports"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_u64().unwrap();

        let (status, queue) = call(
            &state,
            request("GET", "/api/achievements/list/pending/", Some(&coordinator), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(queue[0]["title"], "Won X");

        let (status, _) = call(
            &state,
            request("GET", "/api/achievements/list/pending/", Some(&student), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, reviewed) = call(
            &state,
            request(
                "POST",
                &format!("/api/achievements/list/{}/verify/", id),
                Some(&coordinator),
                json!({"status": "rejected", "notes": "insufficient evidence"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reviewed["status"], "rejected");
        assert_eq!(reviewed["verified_by_name"], "coord");

        let (status, inbox) = call(
            &state,
            request("GET", "/api/achievements/notifications/", Some(&student), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let inbox = inbox.as_array().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(
            inbox[0]["message"],
            "Your achievement \"Won X\" has been rejected. Note: insufficient evidence"
        );
        assert_eq!(inbox[0]["is_read"], false);
        assert_eq!(inbox[0]["achievement"], id);

        let (_, coordinator_inbox) = call(
            &state,
            request("GET", "/api/achievements/notifications", Some(&coordinator), Value::Null),
        )
        .await;
        assert!(coordinator_inbox.as_array().unwrap().is_empty());

        let notification = inbox[0]["id"].as_u64().unwrap();
        let (status, _) = call(
            &state,
            request(
                "POST",
                &format!("/api/achievements/notifications/{}/mark_read/", notification),
                Some(&coordinator),
                Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = call(
            &state,
            request(
                "POST",
                "/api/achievements/notifications/mark_all_read/",
                Some(&student),
                Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "all marked as read");
    }

    #[tokio::test]
    async fn anonymous_reads_but_cannot_create() {
        let state = state();
        let (status, listed) = call(
            &state,
            request("GET", "/api/achievements/list/", None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(listed.as_array().unwrap().is_empty());

        let (status, body) = call(
            &state,
            request(
                "POST",
                "/api/achievements/list/",
                None,
                json!({"title": "Won X", "description": "d", "category": "sports"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "NotAuthenticated");

        let (status, _) = call(
            &state,
            request("GET", "/api/achievements/list/", Some("forged.token.value"), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn category_filter_comes_from_query_parameters() {
        let state = state();
        let student = sign_up(&state, "21CS002", "student").await;
        for (title, category) in [("Paper", "research"), ("Relay", "sports")] {
            let (status, _) = call(
                &state,
                request(
                    "POST",
                    "/api/achievements/list",
                    Some(&student),
                    json!({"title": title, "description": "d", "category": category}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let query = |category: &str| {
            request("GET", "/api/achievements/list/", None, Value::Null)
                .with_query_string_parameters(HashMap::from([(
                    "category".to_string(),
                    category.to_string(),
                )]))
        };
        let (_, research) = call(&state, query("research")).await;
        let research = research.as_array().unwrap();
        assert_eq!(research.len(), 1);
        assert_eq!(research[0]["title"], "Paper");

        let (_, cultural) = call(&state, query("cultural")).await;
        assert!(cultural.as_array().unwrap().is_empty());

        let (status, body) = call(&state, query("gaming")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["category"].is_array());
    }

    #[tokio::test]
    async fn identity_and_profile_routes() {
        let state = state();
        let student = sign_up(&state, "21CS003", "student").await;

        let (status, me) = call(&state, request("GET", "/api/auth/me/", Some(&student), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["student_id"], "21CS003");
        let (status, _) = call(&state, request("GET", "/api/users/me", None, Value::Null)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&state, request("GET", "/api/profiles/me/", Some(&student), Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Profile not found");

        let (status, profile) = call(
            &state,
            request("PATCH", "/api/profiles/me/", Some(&student), json!({"department": "CSE"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["full_name"], "Test 21CS003");

        let other = sign_up(&state, "21CS004", "student").await;
        let id = profile["id"].as_u64().unwrap();
        let (status, _) = call(
            &state,
            request("PATCH", &format!("/api/profiles/{}/", id), Some(&other), json!({"bio": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, fetched) = call(
            &state,
            request("GET", &format!("/api/profiles/{}", id), None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["department"], "CSE");
    }

    #[tokio::test]
    async fn uploaded_proof_is_served_from_media() {
        let state = state();
        let student = sign_up(&state, "21CS005", "student").await;
        let data = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.7");
        let (status, created) = call(
            &state,
            request(
                "POST",
                "/api/achievements/list/",
                Some(&student),
                json!({
                    "title": "Paper",
                    "description": "Accepted",
                    "category": "research",
                    "proof_document": {"file_name": "paper.pdf", "file_data": data},
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let reference = created["proof_document"].as_str().unwrap();
        let response = function_handler(
            request("GET", reference, None, Value::Null),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Content-Type"], "application/pdf");
        assert_eq!(&response.body()[..], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn preflight_unknown_routes_and_wrong_methods() {
        let state = state();
        let response = function_handler(
            request("OPTIONS", "/api/achievements/list/", None, Value::Null),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");

        let (status, _) = call(&state, request("GET", "/api/users/login/", None, Value::Null)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = call(&state, request("GET", "/api/nothing", None, Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(
            &state,
            request("GET", "/api/achievements/list/abc/", None, Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_paths_are_404_before_authentication() {
        let state = state();
        for path in ["/api/nothing", "/api/achievements/list/1/2/3", "/media"] {
            let (status, _) =
                call(&state, request("GET", path, Some("not-a-token"), Value::Null)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
        }

        // A routed path still authenticates first
        let (status, _) = call(
            &state,
            request("GET", "/api/achievements/notifications/", Some("not-a-token"), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn named_actions_reject_other_methods() {
        let state = state();
        let token = sign_up(&state, "21CS009", "student").await;

        for (method, path) in [
            ("GET", "/api/achievements/notifications/mark_all_read/"),
            ("DELETE", "/api/achievements/notifications/mark_all_read/"),
            ("DELETE", "/api/achievements/list/pending/"),
            ("PUT", "/api/achievements/list/my_achievements/"),
            ("PUT", "/api/profiles/me/"),
        ] {
            let (status, _) = call(&state, request(method, path, Some(&token), Value::Null)).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, path);
        }

        let (status, _) = call(
            &state,
            request(
                "POST",
                "/api/achievements/notifications/mark_all_read/",
                Some(&token),
                Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
