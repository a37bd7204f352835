use lambda_http::http::StatusCode;

use crate::access::Caller;
use crate::http::{json_response, ApiResult};
use crate::types::UserView;

/// The authenticated caller's own record.
pub fn current_user(caller: &Caller) -> ApiResult {
    let user = caller.user()?;
    json_response(StatusCode::OK, &UserView::from(user))
}
