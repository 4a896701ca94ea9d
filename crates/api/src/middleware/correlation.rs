//! Makes the `x-request-id` of the current request available to code that
//! has no access to the request, such as [`AppError`](crate::error::AppError)
//! rendering.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static CORRELATION_ID: Option<String>;
}

/// Run the rest of the stack with the request id in scope.
///
/// Must sit inside `SetRequestIdLayer` so the header is already present.
pub async fn scope(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    CORRELATION_ID.scope(id, next.run(request)).await
}

/// The current request's id, or `None` outside a request.
pub fn current() -> Option<String> {
    CORRELATION_ID.try_with(Clone::clone).ok().flatten()
}
