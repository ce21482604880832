use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;

use haven_core::{PdsError, PdsResult, Store};

use crate::error::XrpcError;
use crate::state::AppState;

/// The boundary this core actually needs from account management: given a
/// bearer token, produce the actor it authenticates as. Issuing tokens is
/// out of scope (see Non-goals) — only verification ships here.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, bearer: &str) -> PdsResult<AuthenticatedActor>;
}

/// The one concrete `Authenticator`: HS256 bearer verification against the
/// host's configured shared secret.
pub struct JwtBearerAuthenticator {
    pub access_secret: String,
}

impl Authenticator for JwtBearerAuthenticator {
    fn authenticate(&self, bearer: &str) -> PdsResult<AuthenticatedActor> {
        let claims = haven_crypto::validate_access_token(bearer, &self.access_secret)
            .map_err(|_| PdsError::Unauthorized("invalid or expired access token".into()))?;
        Ok(AuthenticatedActor { did: claims.sub })
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedActor {
    pub did: String,
}

impl<S> FromRequestParts<AppState<S>> for AuthenticatedActor
where
    S: Store,
{
    type Rejection = XrpcError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                XrpcError::new(
                    StatusCode::UNAUTHORIZED,
                    "AuthenticationRequired",
                    "missing authorization header",
                )
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            XrpcError::new(
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                "expected a Bearer token",
            )
        })?;

        let authenticator = JwtBearerAuthenticator {
            access_secret: state.config.jwt.access_secret.clone(),
        };
        authenticator.authenticate(token).map_err(XrpcError::from)
    }
}
