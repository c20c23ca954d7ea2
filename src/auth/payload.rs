use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::header,
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::{error::AppError, response::FieldIssue};

/// Request body read as JSON, or as a urlencoded form when the client says so.
/// An unreadable body becomes a validation error on the `body` field.
#[derive(Debug)]
pub struct Payload<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            ct.trim()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

fn body_issue(text: String) -> AppError {
    AppError::Validation(vec![FieldIssue::new("body", text)])
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| body_issue(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| body_issue(e.body_text()))?;
            Ok(Self(value))
        }
    }
}
