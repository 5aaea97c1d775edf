//! Sessions opening and closing.

use axum::http::StatusCode;
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::account::Account;
use crate::error::Result;
use crate::notification::Level;
use crate::router::{BearerToken, Valid};
use crate::security::{hash_string, is_valid_email};
use crate::{AppState, ServerError};

pub const TOKEN_TYPE: &str = "Bearer";
const FORGOT_PASSWORD_MESSAGE: &str =
    "Please contact the administrator to reset your password.";

fn validate_email(email: &str) -> std::result::Result<(), ValidationError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(custom(
        function = "validate_email",
        message = "Email must be formatted."
    ))]
    email: String,
    #[validate(length(min = 1, max = 255, message = "Password is required."))]
    password: String,
    #[serde(default)]
    remember_me: bool,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub token_type: String,
    pub token: String,
    pub expires_in: u64,
    pub user: Account,
}

/// Handler to open a session.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let Some(account) = state.accounts.authenticate(&body.email, &body.password)
    else {
        tracing::info!(
            email_hash = hash_string(body.email.to_lowercase()),
            "failed login attempt"
        );
        return Err(ServerError::InvalidCredentials);
    };

    let issued = state.sessions.create(account, body.remember_me);
    metrics::gauge!("active_sessions").set(state.sessions.len() as f64);

    Ok(Json(Response {
        token_type: TOKEN_TYPE.to_owned(),
        token: issued.token,
        expires_in: issued.expires_in,
        user: account.clone(),
    }))
}

/// Close the current session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> StatusCode {
    state.sessions.revoke(&token.0);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotBody {
    #[validate(custom(
        function = "validate_email",
        message = "Email must be formatted."
    ))]
    email: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// Password resets are handled by administrators.
pub async fn forgot_password(
    Valid(body): Valid<ForgotBody>,
) -> (StatusCode, Json<Notice>) {
    tracing::info!(
        email_hash = hash_string(body.email.to_lowercase()),
        "password reset requested"
    );

    (
        StatusCode::ACCEPTED,
        Json(Notice {
            level: Level::Info,
            message: FORGOT_PASSWORD_MESSAGE.to_owned(),
        }),
    )
}
