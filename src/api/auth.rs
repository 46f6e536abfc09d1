use super::required;
use crate::{
    auth::{self, Keys, Session, TOKEN_LIFETIME},
    error::{AppError, AppResult},
    models::{Profile, Role},
    store::{DynStore, StoreError},
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizedResponse {
    pub token: String,
    pub role: Role,
    pub profile: Profile,
}

impl AuthorizedResponse {
    fn from_profile(keys: &Keys, profile: Profile) -> anyhow::Result<AuthorizedResponse> {
        Ok(AuthorizedResponse {
            token: keys.generate_jwt(profile.user_id, TOKEN_LIFETIME)?,
            role: profile.role,
            profile,
        })
    }
}

const MIN_PASSWORD_LEN: usize = 8;

async fn signup(
    Extension(store): Extension<DynStore>,
    Extension(keys): Extension<Keys>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    let email = required("email", req.email)?.to_lowercase();
    if !email.contains('@') {
        return Err(AppError::bad_request("invalid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    let full_name = req
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let profile = match store
        .create_user(&email, &auth::hash_password(req.password)?, full_name)
        .await
    {
        Ok(profile) => profile,
        Err(StoreError::Conflict(_)) => {
            return Err(AppError::from(
                StatusCode::CONFLICT,
                "an account with this email already exists",
            ))
        }
        Err(e) => return Err(e.into()),
    };
    info!(user = profile.user_id, "signed up");

    Ok(Json(AuthorizedResponse::from_profile(&keys, profile)?))
}

async fn login(
    Extension(store): Extension<DynStore>,
    Extension(keys): Extension<Keys>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    let email = req.email.trim().to_lowercase();

    if let Some(user) = store.find_credentials(&email).await? {
        if auth::verify_password(req.password, &user.password_hash)? {
            if let Some(profile) = store.get_profile(user.id).await? {
                return Ok(Json(AuthorizedResponse::from_profile(&keys, profile)?));
            }
        }
    }
    Err(AppError::from(
        StatusCode::UNAUTHORIZED,
        "invalid email or password",
    ))
}

async fn me(session: Session) -> Json<Profile> {
    Json(session.profile)
}

pub fn app() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/me", get(me))
}
