//! Bearer-token verification for GraphQL requests (§4.18 ambient transport).
//!
//! Tokens are verified, not minted, here — whatever issues them is outside this crate's scope.
//! `verify_token` only recovers the subject as a UUID; resolving that UUID to a `UserRecord` (via
//! `UsersRepository::get_or_create`) happens in the HTTP/WebSocket handlers in `main`, which then
//! inject the resolved record into the GraphQL context.

use async_graphql::{Context, ErrorExtensions, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Verifies `token` against `jwt_secret` and returns the subject, parsed as a UUID.
pub fn verify_token(token: &str, jwt_secret: &str) -> Result<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_aud = false;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(jwt_secret.as_bytes()), &validation).map_err(
        |e| {
            tracing::debug!(error = %e, "bearer token failed verification");
            async_graphql::Error::new(format!("invalid token: {e}"))
                .extend_with(|_, ext| ext.set("code", "UNAUTHORIZED"))
        },
    )?;

    Uuid::parse_str(&data.claims.sub).map_err(|_| {
        async_graphql::Error::new("token subject is not a UUID").extend_with(|_, ext| ext.set("code", "UNAUTHORIZED"))
    })
}

/// The authenticated caller, resolved from a verified JWT subject to its `users` row.
pub type AuthUser = crate::db::users::UserRecord;

/// Extension trait to pull the authenticated user out of a GraphQL context.
pub trait AuthExt {
    fn auth_user(&self) -> Result<&AuthUser>;
    fn try_auth_user(&self) -> Option<&AuthUser>;
}

impl<'a> AuthExt for Context<'a> {
    fn auth_user(&self) -> Result<&AuthUser> {
        self.data_opt::<AuthUser>().ok_or_else(|| {
            async_graphql::Error::new("authentication required").extend_with(|_, e| e.set("code", "UNAUTHORIZED"))
        })
    }

    fn try_auth_user(&self) -> Option<&AuthUser> {
        self.data_opt::<AuthUser>()
    }
}
