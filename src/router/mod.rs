//! HTTP API.
pub mod assistant;
pub mod classes;
pub mod login;
pub mod status;
pub mod users;

use axum::extract::{FromRequest, Json, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::account::Account;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// JSON body checked with [`validator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Raw bearer token of the current request.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Custom middleware for authentification.
///
/// Inserts the [`Account`] and its [`BearerToken`] in request extensions.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServerError::Unauthorized)?
        .to_owned();

    let session = state.sessions.authenticate(&token)?;
    let account = state
        .accounts
        .get(&session.email)
        .cloned()
        .ok_or(ServerError::Unauthorized)?;

    req.extensions_mut().insert::<Account>(account);
    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}
