use crate::{
    error::AppError,
    models::{MemberStatus, Profile, Role},
    store::DynStore,
};
use argon2::Argon2;
use axum::{
    async_trait,
    extract::{FromRequest, RequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::StatusCode,
};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// Tokens expire after one day.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Signing keys, built once from the configured secret and shared with the
/// handlers through an `Extension`.
#[derive(Clone)]
pub struct Keys(Arc<KeyPair>);

impl Keys {
    pub fn from_base64_secret(secret: &str) -> JwtResult<Self> {
        Ok(Self(Arc::new(KeyPair {
            encoding: EncodingKey::from_base64_secret(secret)?,
            decoding: DecodingKey::from_base64_secret(secret)?,
        })))
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self(Arc::new(KeyPair {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }))
    }

    pub fn generate_jwt(&self, user_id: i32, exp: Duration) -> JwtResult<String> {
        jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                sub: user_id,
                exp: jsonwebtoken::get_current_timestamp() + exp.as_secs(),
            },
            &self.0.encoding,
        )
    }

    pub fn validate_jwt(&self, token: &str) -> JwtResult<TokenData<Claims>> {
        jsonwebtoken::decode::<Claims>(token, &self.0.decoding, &Validation::default())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub exp: u64,
}

fn unauthorized() -> AppError {
    AppError::from(StatusCode::UNAUTHORIZED, "missing or invalid token")
}

/// The signed-in user, with the profile as it was when the request arrived.
/// Handlers read the role from here instead of from shared state.
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: Profile,
}

impl Session {
    pub fn user_id(&self) -> i32 {
        self.profile.user_id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn is_operator(&self) -> bool {
        self.role().is_operator()
    }

    /// Passes when the user actively administers the club, or is an operator.
    pub async fn ensure_club_admin(&self, store: &DynStore, club_id: i32) -> Result<(), AppError> {
        if self.is_operator() {
            return Ok(());
        }
        match store.get_member(club_id, self.user_id()).await? {
            Some(m) if m.is_admin && m.status == MemberStatus::Active => Ok(()),
            _ => Err(AppError::from(
                StatusCode::FORBIDDEN,
                "you do not manage this club",
            )),
        }
    }
}

#[async_trait]
impl<B: Send> FromRequest<B> for Session {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| unauthorized())?;

        let keys = req
            .extensions()
            .get::<Keys>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("signing keys are not installed"))?;
        let store = req
            .extensions()
            .get::<DynStore>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("store is not installed"))?;

        let claims = keys
            .validate_jwt(bearer.token())
            .map_err(|_| unauthorized())?
            .claims;
        let profile = store
            .get_profile(claims.sub)
            .await?
            .ok_or_else(unauthorized)?;

        Ok(Session { profile })
    }
}

/// A session whose role is moderator or super admin.
pub struct Operator(pub Session);

#[async_trait]
impl<B: Send> FromRequest<B> for Operator {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let session = Session::from_request(req).await?;
        if !session.is_operator() {
            return Err(AppError::from(StatusCode::FORBIDDEN, "operators only"));
        }
        Ok(Operator(session))
    }
}

pub struct SuperAdmin(pub Session);

#[async_trait]
impl<B: Send> FromRequest<B> for SuperAdmin {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let session = Session::from_request(req).await?;
        if session.role() != Role::SuperAdmin {
            return Err(AppError::from(StatusCode::FORBIDDEN, "super admins only"));
        }
        Ok(SuperAdmin(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn tokens_carry_the_user_id() {
        let keys = Keys::from_secret(b"test secret");
        let token = keys.generate_jwt(42, TOKEN_LIFETIME).unwrap();
        assert_eq!(keys.validate_jwt(&token).unwrap().claims.sub, 42);

        let other = Keys::from_secret(b"another secret");
        assert!(other.validate_jwt(&token).is_err());
    }

    #[test]
    fn secrets_must_be_base64() {
        assert!(Keys::from_base64_secret("c2VjcmV0").is_ok());
        assert!(Keys::from_base64_secret("not base64!").is_err());
    }
}
