pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::repo_types::{CurrentUser, Role, User, UserStatus};
use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Canonical email form, applied at every entry point: signup, login,
/// forgot-password, share, unshare and the by-email lookup.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            session_ttl_minutes,
            reset_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((session_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((reset_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Session => self.session_ttl,
            TokenKind::Reset => self.reset_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_session(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Session)
    }
    pub fn sign_reset(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Reset)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        Ok(claims)
    }

    pub fn verify_reset(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Reset {
            anyhow::bail!("not a reset token");
        }
        Ok(claims)
    }
}

/// Gate decision: unknown and inactive users get the same rejection, so an
/// unauthenticated caller cannot probe account existence or activation.
pub(crate) fn require_active(user: Option<User>) -> Result<User, ApiError> {
    match user {
        Some(u) if u.status == UserStatus::Active => Ok(u),
        _ => Err(ApiError::Unauthenticated("Please authenticate")),
    }
}

/// Coarse role check on an already-authenticated identity.
pub fn require_role(current: &CurrentUser, minimum: Role) -> Result<(), ApiError> {
    if current.role.meets(minimum) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Insufficient permissions"))
    }
}

/// Extracts the bearer token, verifies it as a session token and loads the
/// user. Runs before any handler that requires identity.
pub struct AuthUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated("Please authenticate"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated("Please authenticate"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify_session(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid, expired or wrong-purpose token");
                return Err(ApiError::Unauthenticated("Please authenticate"));
            }
        };

        let user = User::find_by_id(&state.db, claims.sub).await.map_err(|e| {
            error!(error = %e, user_id = %claims.sub, "gate user lookup failed");
            ApiError::Unauthenticated("Please authenticate")
        })?;

        let user = require_active(user)?;
        Ok(AuthUser(user.into()))
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn hashes_are_salted_per_record() {
        let hash_a = hash_password("same-password").unwrap();
        let hash_b = hash_password("same-password").unwrap();
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}

#[cfg(test)]
mod email_tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@x"));
    }

    #[test]
    fn normalization_lowercases_and_trims() {
        assert_eq!(normalize_email("  A@X.CoM "), "a@x.com");
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_session(user_id).expect("sign session");
        let claims = keys.verify_session(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async fn sign_and_verify_reset_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_reset(user_id).expect("sign reset");
        let claims = keys.verify_reset(&token).expect("verify reset");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Reset);
    }

    #[tokio::test]
    async fn verify_reset_rejects_session_token() {
        let keys = make_keys();
        let token = keys.sign_session(Uuid::new_v4()).expect("sign session");
        let err = keys.verify_reset(&token).unwrap_err();
        assert!(err.to_string().contains("not a reset token"));
    }

    #[tokio::test]
    async fn verify_session_rejects_reset_token() {
        let keys = make_keys();
        let token = keys.sign_reset(Uuid::new_v4()).expect("sign reset");
        let err = keys.verify_session(&token).unwrap_err();
        assert!(err.to_string().contains("not a session token"));
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        // Hand-roll claims expired well past the default validation leeway.
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (past - TimeDuration::hours(1)).unix_timestamp() as usize,
            exp: past.unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Session,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_tampered_signature() {
        let keys = make_keys();
        let mut token = keys.sign_session(Uuid::new_v4()).unwrap();
        token.pop();
        token.push('A');
        assert!(keys.verify(&token).is_err());
    }
}

#[cfg(test)]
mod gate_tests {
    use super::*;

    fn user_with_status(status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            role: Role::User,
            status,
            reset_token: None,
            reset_token_expires: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn active_user_passes() {
        let user = user_with_status(UserStatus::Active);
        assert!(require_active(Some(user)).is_ok());
    }

    #[test]
    fn inactive_user_is_rejected_like_unknown() {
        let inactive = require_active(Some(user_with_status(UserStatus::Inactive))).unwrap_err();
        let unknown = require_active(None).unwrap_err();
        assert_eq!(inactive.to_string(), unknown.to_string());
        assert_eq!(inactive.code(), "UNAUTHENTICATED");
        assert_eq!(unknown.code(), "UNAUTHENTICATED");
    }

    #[test]
    fn require_role_follows_the_order() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            email: "admin@x.com".into(),
            role: Role::Admin,
        };
        assert!(require_role(&admin, Role::User).is_ok());
        assert!(require_role(&admin, Role::Admin).is_ok());
        let err = require_role(&admin, Role::SuperAdmin).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }
}
