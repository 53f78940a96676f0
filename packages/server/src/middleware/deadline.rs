use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::middleware::request_id::RequestId;

/// Overall deadline for the API request path.
const REQUEST_DEADLINE: Duration = Duration::from_secs(10);

pub async fn request_deadline(req: Request<Body>, next: Next) -> Response {
    let request_id = req.extensions().get::<RequestId>().cloned();

    match tokio::time::timeout(REQUEST_DEADLINE, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            let error = ApiError::Internal("request deadline exceeded".to_string());
            match request_id {
                Some(id) => error.with_request_id(&id).into_response(),
                None => error.into_response(),
            }
        }
    }
}
