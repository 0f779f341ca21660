pub mod admin;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod wallet;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::str::FromStr;

use crate::{
    errors::ServiceError,
    models::{Viewer, ViewerRole, USER_ID_HEADER, USER_ROLE_HEADER},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Identity comes from headers set by the upstream auth proxy.
#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Missing user identity".to_string()))?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => ViewerRole::User,
            Some(raw) => raw
                .to_str()
                .ok()
                .and_then(|r| ViewerRole::from_str(r.trim()).ok())
                .ok_or_else(|| ServiceError::Unauthorized("Unknown user role".to_string()))?,
        };

        Ok(Viewer {
            user_id: user_id.to_string(),
            role,
        })
    }
}

/// JSON body extractor whose rejections render as [`crate::errors::ErrorResponse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path extractor; a malformed segment is a 400 envelope rather than plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// A [`Viewer`] that must hold the admin role.
#[derive(Clone, Debug)]
pub struct RequireAdmin(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let viewer = Viewer::from_request_parts(parts, state).await?;
        if !viewer.is_admin() {
            return Err(ServiceError::Forbidden(
                "Administrator role required".to_string(),
            ));
        }
        Ok(RequireAdmin(viewer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/user/orders");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_bad_request() {
        let request = Request::builder()
            .uri("/api/user/orders")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{\"items\": ["))
            .unwrap();
        assert_matches!(
            ApiJson::<serde_json::Value>::from_request(request, &()).await,
            Err(ServiceError::BadRequest(_))
        );

        let untyped = Request::builder()
            .uri("/api/user/orders")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        assert_matches!(
            ApiJson::<serde_json::Value>::from_request(untyped, &()).await,
            Err(ServiceError::BadRequest(_))
        );
    }

    #[tokio::test]
    async fn role_defaults_to_user() {
        let mut parts = parts(&[(USER_ID_HEADER, "alice")]);
        let viewer = Viewer::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(viewer, Viewer::user("alice"));
    }

    #[tokio::test]
    async fn admin_role_is_case_insensitive() {
        let mut parts = parts(&[(USER_ID_HEADER, "ops"), (USER_ROLE_HEADER, "Admin")]);
        let RequireAdmin(viewer) = RequireAdmin::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(viewer, Viewer::admin("ops"));
    }

    #[tokio::test]
    async fn rejects_missing_identity_and_unknown_roles() {
        let mut anonymous = parts(&[]);
        assert_matches!(
            Viewer::from_request_parts(&mut anonymous, &()).await,
            Err(ServiceError::Unauthorized(_))
        );

        let mut bogus = parts(&[(USER_ID_HEADER, "alice"), (USER_ROLE_HEADER, "root")]);
        assert_matches!(
            Viewer::from_request_parts(&mut bogus, &()).await,
            Err(ServiceError::Unauthorized(_))
        );

        let mut customer = parts(&[(USER_ID_HEADER, "alice"), (USER_ROLE_HEADER, "user")]);
        assert_matches!(
            RequireAdmin::from_request_parts(&mut customer, &()).await,
            Err(ServiceError::Forbidden(_))
        );
    }
}
