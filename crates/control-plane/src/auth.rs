//! Bearer-token auth (§4.6, §6): login issues a JWT carrying
//! `(user_id, org_id, role)`; every other request verifies it and builds a
//! [`RequestContext`] that every core call is parameterized by.

use crate::error::ApiError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use streamspace_core::{OrgScope, OrganizationId, Role, UserId};

const TOKEN_TTL_SECONDS: i64 = 12 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub org_id: String,
    pub role: Role,
    pub exp: i64,
}

/// The per-request context every core call is parameterized by (§4.6).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: Role,
}

impl RequestContext {
    pub fn scope(&self) -> OrgScope {
        OrgScope::new(self.organization_id.clone())
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut rand_core_compat::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, phc_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn issue_token(
    jwt_secret: &str,
    user_id: &UserId,
    organization_id: &OrganizationId,
    role: Role,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id.to_string(),
        org_id: organization_id.to_string(),
        role,
        exp: (now + chrono::Duration::seconds(TOKEN_TTL_SECONDS)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

pub fn verify_token(jwt_secret: &str, token: &str) -> Result<RequestContext, ApiError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    let user_id =
        UserId::parse(&data.claims.sub).map_err(|_| ApiError::Internal("malformed token subject".into()))?;
    let organization_id = OrganizationId::parse(&data.claims.org_id)
        .map_err(|_| ApiError::Internal("malformed token org".into()))?;

    Ok(RequestContext {
        user_id,
        organization_id,
        role: data.claims.role,
    })
}

/// `argon2`'s `SaltString::generate` wants an `rand_core` `CryptoRngCore`;
/// re-exporting it under one name keeps the `rand_core`/`argon2` version
/// coupling localized to this module.
mod rand_core_compat {
    pub use argon2::password_hash::rand_core::OsRng;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips_through_hash_and_verify() {
        let hash = hash_password("correct horse battery staple").expect("hash");
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn token_round_trips_and_carries_claims() {
        let user_id = UserId::new();
        let org_id = OrganizationId::new();
        let secret = "0123456789abcdef0123456789abcdef";
        let token = issue_token(secret, &user_id, &org_id, Role::Admin, chrono::Utc::now())
            .expect("issue");
        let ctx = verify_token(secret, &token).expect("verify");
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.organization_id, org_id);
        assert!(ctx.role.is_admin());
    }

    #[test]
    fn token_signed_with_a_different_secret_is_rejected() {
        let user_id = UserId::new();
        let org_id = OrganizationId::new();
        let token = issue_token(
            "0123456789abcdef0123456789abcdef",
            &user_id,
            &org_id,
            Role::User,
            chrono::Utc::now(),
        )
        .expect("issue");
        assert!(verify_token("ffffffffffffffffffffffffffffffff", &token).is_err());
    }
}
