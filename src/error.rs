use crate::{
    media::MediaError, membership::MembershipError, provision::ProvisionError, store::StoreError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;
use tracing::error;

pub enum AppError {
    InternalServerError(anyhow::Error),
    ResponseStatusError(StatusCode, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            message: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => match err.downcast_ref::<StoreError>() {
                Some(e @ StoreError::NotFound(_)) => {
                    AppError::from(StatusCode::NOT_FOUND, e.to_string()).into_response()
                }
                Some(e @ StoreError::Conflict(_)) => {
                    AppError::from(StatusCode::CONFLICT, e.to_string()).into_response()
                }
                _ => {
                    error!(error = ?err, "request failed");
                    AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                        .into_response()
                }
            },
            AppError::ResponseStatusError(code, s) => (
                code,
                Json(AppErrorResponse {
                    status: code.as_u16(),
                    message: s,
                }),
            )
                .into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    pub fn not_found(what: &str) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, format!("the {what} does not exist"))
    }

    pub fn bad_request(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::BAD_REQUEST, s)
    }

    pub fn provision(e: ProvisionError) -> AppError {
        let code = match e {
            ProvisionError::Store(inner) => return inner.into(),
            ProvisionError::NotFound(_) => StatusCode::NOT_FOUND,
            ProvisionError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ProvisionError::EmptySlug => StatusCode::BAD_REQUEST,
            ProvisionError::RolledBack {
                source: StoreError::Conflict(_),
                ..
            } => StatusCode::CONFLICT,
            ProvisionError::RolledBack { .. } | ProvisionError::Partial { .. } => {
                error!(error = %e, "provisioning failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::from(code, e.to_string())
    }

    pub fn membership(e: MembershipError) -> AppError {
        let code = match e {
            MembershipError::Store(inner) => return inner.into(),
            MembershipError::ClubNotFound | MembershipError::NotFound => StatusCode::NOT_FOUND,
            MembershipError::AlreadyMember | MembershipError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            MembershipError::ClubInactive | MembershipError::NotActive => StatusCode::BAD_REQUEST,
            MembershipError::OwnMembership => StatusCode::FORBIDDEN,
        };
        AppError::from(code, e.to_string())
    }

    pub fn media(e: MediaError) -> AppError {
        match e {
            MediaError::TooLarge => AppError::from(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
            MediaError::Empty | MediaError::NotAnImage => AppError::bad_request(e.to_string()),
            MediaError::Io(_) => AppError::InternalServerError(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::Step;

    fn status(e: AppError) -> StatusCode {
        e.into_response().status()
    }

    #[test]
    fn slug_collision_on_approval_is_a_conflict() {
        let e = ProvisionError::RolledBack {
            step: Step::CreateClub,
            source: StoreError::Conflict("club"),
        };
        assert_eq!(status(AppError::provision(e)), StatusCode::CONFLICT);
    }

    #[test]
    fn backend_failures_during_approval_stay_internal() {
        let rolled_back = ProvisionError::RolledBack {
            step: Step::AssignAdmin,
            source: StoreError::Backend(anyhow::anyhow!("connection reset")),
        };
        assert_eq!(
            status(AppError::provision(rolled_back)),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let partial = ProvisionError::Partial {
            step: Step::CreateClub,
            source: StoreError::Conflict("club"),
        };
        assert_eq!(
            status(AppError::provision(partial)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
