use super::error::ApiErrorCode;
use crate::application_port::{AuthContext, AuthError, AuthService};
use std::sync::Arc;
use warp::{Filter, Rejection, reject};

/// Declarative route authorization, composed at route-registration time.
/// `roles` is the set of roles admitted to the route (empty = any valid
/// token); `allow_anonymous` lets requests without a usable token through.
#[derive(Debug, Clone, Copy)]
pub struct RouteGuard {
    pub roles: &'static [&'static str],
    pub allow_anonymous: bool,
}

impl RouteGuard {
    pub const fn roles(roles: &'static [&'static str]) -> Self {
        Self {
            roles,
            allow_anonymous: false,
        }
    }

    pub const fn allow_anonymous(roles: &'static [&'static str]) -> Self {
        Self {
            roles,
            allow_anonymous: true,
        }
    }
}

/// Guard for routes that require an authenticated caller.
pub fn with_authorization(
    auth_service: Arc<dyn AuthService>,
    guard: RouteGuard,
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let auth_service = auth_service.clone();
        async move {
            match check(header, auth_service, guard).await? {
                Some(context) => Ok(context),
                None => Err(reject::custom(ApiErrorCode::InvalidToken)),
            }
        }
    })
}

/// Guard for routes that also serve anonymous callers.
pub fn with_optional_authorization(
    auth_service: Arc<dyn AuthService>,
    guard: RouteGuard,
) -> impl Filter<Extract = (Option<AuthContext>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let auth_service = auth_service.clone();
        async move { check(header, auth_service, guard).await }
    })
}

async fn check(
    header: Option<String>,
    auth_service: Arc<dyn AuthService>,
    guard: RouteGuard,
) -> Result<Option<AuthContext>, Rejection> {
    let token = header
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        if guard.allow_anonymous {
            return Ok(None);
        }
        return Err(reject::custom(ApiErrorCode::InvalidToken));
    };

    let context = match auth_service.authorize(token).await {
        Ok(context) => context,
        // A bad token degrades to anonymous where that is allowed. A token
        // that verified but names a dead role or user never does.
        Err(AuthError::TokenInvalid | AuthError::TokenExpired) if guard.allow_anonymous => {
            return Ok(None);
        }
        Err(AuthError::TokenInvalid | AuthError::TokenExpired) => {
            return Err(reject::custom(ApiErrorCode::InvalidToken));
        }
        Err(AuthError::UserNotFound) => return Err(reject::custom(ApiErrorCode::InvalidToken)),
        Err(AuthError::InsufficientRole) => return Err(reject::custom(ApiErrorCode::Forbidden)),
        Err(e) => return Err(reject::custom(ApiErrorCode::internal(e))),
    };

    if !guard.roles.is_empty() && !guard.roles.iter().any(|role| *role == context.role) {
        return Err(reject::custom(ApiErrorCode::Forbidden));
    }

    Ok(Some(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::recover_error;
    use crate::application_impl::FakeAuthService;

    fn protected(
        guard: RouteGuard,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
        warp::path("whoami")
            .and(with_authorization(Arc::new(FakeAuthService::new()), guard))
            .map(|context: AuthContext| context.user_id.to_string())
            .recover(recover_error)
    }

    fn public(
        guard: RouteGuard,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
        warp::path("profile")
            .and(with_optional_authorization(
                Arc::new(FakeAuthService::new()),
                guard,
            ))
            .map(|context: Option<AuthContext>| {
                context
                    .map(|c| c.user_id.to_string())
                    .unwrap_or_else(|| "anonymous".to_string())
            })
            .recover(recover_error)
    }

    #[tokio::test]
    async fn valid_token_passes_and_yields_identity() {
        let routes = protected(RouteGuard::roles(&["User"]));
        let res = warp::test::request()
            .path("/whoami")
            .header("authorization", "Bearer fake-access-token:5:User")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), "5");
    }

    #[tokio::test]
    async fn missing_or_mangled_token_is_unauthorized() {
        let routes = protected(RouteGuard::roles(&["User"]));

        let res = warp::test::request().path("/whoami").reply(&routes).await;
        assert_eq!(res.status(), 401);

        let res = warp::test::request()
            .path("/whoami")
            .header("authorization", "Bearer garbage")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 401);

        // no Bearer prefix
        let res = warp::test::request()
            .path("/whoami")
            .header("authorization", "fake-access-token:5:User")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn unknown_role_is_forbidden() {
        // FakeAuthService recognizes only the "User" role.
        let routes = protected(RouteGuard::roles(&["User"]));
        let res = warp::test::request()
            .path("/whoami")
            .header("authorization", "Bearer fake-access-token:5:Ghost")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 403);
    }

    #[tokio::test]
    async fn role_outside_required_set_is_forbidden() {
        let routes = protected(RouteGuard::roles(&["Admin"]));
        let res = warp::test::request()
            .path("/whoami")
            .header("authorization", "Bearer fake-access-token:5:User")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 403);
    }

    #[tokio::test]
    async fn deleted_user_is_unauthorized() {
        let routes = protected(RouteGuard::roles(&["User"]));
        let res = warp::test::request()
            .path("/whoami")
            .header("authorization", "Bearer fake-access-token:0:User")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn anonymous_route_accepts_missing_and_bad_tokens() {
        let routes = public(RouteGuard::allow_anonymous(&["User"]));

        let res = warp::test::request().path("/profile").reply(&routes).await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), "anonymous");

        let res = warp::test::request()
            .path("/profile")
            .header("authorization", "Bearer garbage")
            .reply(&routes)
            .await;
        assert_eq!(res.body(), "anonymous");

        let res = warp::test::request()
            .path("/profile")
            .header("authorization", "Bearer fake-access-token:5:User")
            .reply(&routes)
            .await;
        assert_eq!(res.body(), "5");
    }
}
