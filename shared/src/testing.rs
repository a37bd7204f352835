//! Fixtures for handler tests.

use serde_json::Value;
use std::sync::Arc;

use crate::access::Caller;
use crate::blobs::MemoryBlobStore;
use crate::config::Config;
use crate::store::{MemoryStore, Store};
use crate::types::{NewUser, Role, User};
use crate::AppState;

pub(crate) type TestState = Arc<AppState<MemoryStore, MemoryBlobStore>>;

pub(crate) fn state() -> TestState {
    AppState::new(Config::for_tests(), MemoryStore::new(), MemoryBlobStore::new())
        .expect("test state")
}

pub(crate) async fn user(state: &TestState, login: &str, role: Role) -> User {
    state
        .store
        .create_user(NewUser {
            student_id: login.to_string(),
            email: format!("{}@example.com", login.to_lowercase()),
            password_hash: state.hasher.hash("pw").expect("hash"),
            role,
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect("seed user")
}

pub(crate) async fn caller(state: &TestState, login: &str, role: Role) -> Caller {
    Caller::User(user(state, login, role).await)
}

pub(crate) fn body(value: Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

pub(crate) fn json(response: &lambda_http::Response<lambda_http::Body>) -> Value {
    serde_json::from_slice(response.body()).expect("json body")
}
