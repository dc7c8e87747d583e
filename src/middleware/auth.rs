use crate::{
    error::AppError,
    models::{User, UserModel},
    utils::jwt::{decode_jwt, is_access_token},
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// The signed-in user, if any.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<UserModel>);

/// A signed-in user; rejects anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserModel);

/// Resolves the bearer token (when present) to a user and stores it as `Viewer`.
///
/// A missing header yields an anonymous viewer; a malformed or expired token,
/// or one naming a user that does not exist, is rejected.
pub async fn viewer_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let viewer = match extract_bearer_token(&headers) {
        None => None,
        Some(token) => {
            let claims = decode_jwt(&token).map_err(|_| AppError::Unauthorized)?;
            if !is_access_token(&claims) {
                return Err(AppError::Unauthorized);
            }
            let user_id: i32 = claims
                .sub
                .parse()
                .map_err(|_| AppError::Validation("Invalid user ID in token".to_string()))?;
            let user = User::find_by_id(user_id)
                .one(&db)
                .await?
                .ok_or(AppError::Unauthorized)?;
            Some(user)
        }
    };

    request.extensions_mut().insert(Viewer(viewer));
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .unwrap_or(Viewer(None)))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|v| v.0.clone())
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
