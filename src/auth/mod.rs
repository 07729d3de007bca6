//! Bearer-token identity.
//!
//! Tokens are minted by the school's account service and signed with a
//! shared HS256 secret. This module only verifies them and exposes the caller
//! as an extractor; it owns no users, passwords or sessions.

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::{errors::ServiceError, models::Role};

/// JWT claims carried by store tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Verification keys derived from the configured secret
#[derive(Clone)]
pub struct JwtKeys {
    decoding: Arc<DecodingKey>,
    encoding: Arc<EncodingKey>,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                ServiceError::Unauthorized("Invalid or expired token".to_string())
            })?;

        let user_id = data.claims.sub.parse::<i32>().map_err(|_| {
            ServiceError::Unauthorized("Token subject is not a user id".to_string())
        })?;

        Ok(AuthUser {
            user_id,
            role: data.claims.role,
        })
    }

    pub fn issue(&self, user_id: i32, role: Role, ttl: Duration) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::InternalError(format!("Failed to sign token: {}", e)))
    }
}

/// Mints a token for local tooling and tests.
pub fn issue_token(
    secret: &str,
    user_id: i32,
    role: Role,
    ttl: Duration,
) -> Result<String, ServiceError> {
    JwtKeys::new(secret).issue(user_id, role, ttl)
}

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Owner of a resource, or any admin.
    pub fn can_access(&self, owner_id: i32) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
        JwtKeys::from_ref(state).verify(token)
    }
}

/// Caller that must hold the admin role
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ServiceError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    const SECRET: &str = "unit-test-secret-unit-test-secret-0001";

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::new(SECRET);
        let token = keys.issue(42, Role::Customer, Duration::hours(1)).unwrap();
        let user = keys.verify(&token).unwrap();
        assert_eq!(user.user_id, 42);
        assert!(!user.is_admin());
        assert!(user.can_access(42));
        assert!(!user.can_access(7));
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let keys = JwtKeys::new(SECRET);
        let expired = keys.issue(1, Role::Admin, Duration::hours(-2)).unwrap();
        assert_matches!(keys.verify(&expired), Err(ServiceError::Unauthorized(_)));

        let foreign = issue_token("another-secret-another-secret-0002", 1, Role::Admin, Duration::hours(1))
            .unwrap();
        assert_matches!(keys.verify(&foreign), Err(ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn extractors_enforce_token_and_role() {
        let keys = JwtKeys::new(SECRET);
        let customer = keys.issue(5, Role::Customer, Duration::hours(1)).unwrap();
        let admin = keys.issue(1, Role::Admin, Duration::hours(1)).unwrap();

        let mut missing = parts_with(None);
        assert_matches!(
            AuthUser::from_request_parts(&mut missing, &keys).await,
            Err(ServiceError::Unauthorized(_))
        );

        let mut as_customer = parts_with(Some(&format!("Bearer {}", customer)));
        assert_matches!(
            AdminUser::from_request_parts(&mut as_customer, &keys).await,
            Err(ServiceError::Forbidden(_))
        );

        let mut as_admin = parts_with(Some(&format!("Bearer {}", admin)));
        let AdminUser(user) = AdminUser::from_request_parts(&mut as_admin, &keys)
            .await
            .unwrap();
        assert_eq!(user.user_id, 1);
    }
}
