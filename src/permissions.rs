//! Access policies for the resource endpoints.
//!
//! A policy is checked twice: once per request (method + requester) and, for the
//! endpoints that act on an authored record, once per object. Denials for anonymous
//! requesters become 401, denials for authenticated ones become 403.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{Method, request::Parts},
};

use crate::{auth::AuthUser, config::AppConfig, error::ApiError, repository::RepositoryState};

/// GET, HEAD and OPTIONS never modify state.
pub fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Authenticated admin (role `admin` or superuser).
    AdminOnly,
    /// Anyone may read; only admins may write.
    AdminOrReadOnly,
    /// Anyone may read; any authenticated user may create; only the author, a
    /// moderator or an admin may modify an existing record.
    AdminModeratorOrAuthor,
}

impl Policy {
    pub fn message(self) -> &'static str {
        match self {
            Policy::AdminOnly | Policy::AdminOrReadOnly => "Admin rights required",
            Policy::AdminModeratorOrAuthor => "Admin, moderator or author rights required",
        }
    }

    pub fn has_permission(self, method: &Method, requester: Option<&AuthUser>) -> bool {
        match self {
            Policy::AdminOnly => requester.is_some_and(AuthUser::is_admin),
            Policy::AdminOrReadOnly => {
                is_safe(method) || requester.is_some_and(AuthUser::is_admin)
            }
            Policy::AdminModeratorOrAuthor => is_safe(method) || requester.is_some(),
        }
    }

    /// `author_id` is the owner of the record being accessed.
    pub fn has_object_permission(
        self,
        method: &Method,
        requester: Option<&AuthUser>,
        author_id: i64,
    ) -> bool {
        match self {
            Policy::AdminModeratorOrAuthor => {
                is_safe(method)
                    || requester.is_some_and(|user| {
                        user.is_admin() || user.is_moderator() || user.id == author_id
                    })
            }
            Policy::AdminOnly | Policy::AdminOrReadOnly => self.has_permission(method, requester),
        }
    }

    pub fn authorize(self, method: &Method, requester: Option<&AuthUser>) -> Result<(), ApiError> {
        if self.has_permission(method, requester) {
            Ok(())
        } else {
            Err(self.denied(requester))
        }
    }

    pub fn authorize_object(
        self,
        method: &Method,
        requester: Option<&AuthUser>,
        author_id: i64,
    ) -> Result<(), ApiError> {
        if self.has_object_permission(method, requester, author_id) {
            Ok(())
        } else {
            Err(self.denied(requester))
        }
    }

    fn denied(self, requester: Option<&AuthUser>) -> ApiError {
        match requester {
            Some(_) => ApiError::Forbidden(self.message().to_string()),
            None => ApiError::Unauthorized(
                "Authentication credentials were not provided".to_string(),
            ),
        }
    }
}

/// Requires an authenticated admin. Rejects with 401 without credentials and
/// 403 for any other role.
///
/// ```ignore
/// async fn list_users(AdminUser(admin): AdminUser) -> ApiResult<Json<Vec<User>>> { .. }
/// ```
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Policy::AdminOnly.authorize(&parts.method, Some(&user))?;
        Ok(AdminUser(user))
    }
}
